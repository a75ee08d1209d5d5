//! Pattern matching for IAM actions, resources and `*Like` conditions
//!
//! Supports wildcards:
//! - `*` - Matches any run of characters (`Glob`), or any run of characters
//!   without a `:` (`ArnSegment`, so a wildcard never crosses an ARN field)
//! - `?` - Matches exactly one character
//!
//! Every other character is matched literally and the whole subject must match.

use super::cache::PatternCache;
use parking_lot::Mutex;
use regex::Regex;

/// How `*` is translated when a pattern is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternMode {
    /// `*` matches anything, including `:`
    Glob,
    /// `*` stops at `:` boundaries
    ArnSegment,
}

impl PatternMode {
    fn wildcard(self) -> &'static str {
        match self {
            PatternMode::Glob => ".*",
            PatternMode::ArnSegment => "[^:]*",
        }
    }
}

/// Wildcard pattern matcher with a shared cache of compiled patterns
pub struct PatternMatcher {
    cache: Option<Mutex<PatternCache>>,
}

impl PatternMatcher {
    /// Create a matcher caching up to `capacity` compiled patterns.
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        PatternMatcher {
            cache: (capacity > 0).then(|| Mutex::new(PatternCache::new(capacity))),
        }
    }

    /// Translate a wildcard pattern into an anchored regular expression
    ///
    /// # Examples
    /// ```
    /// use pbac_rs::iam::{PatternMatcher, PatternMode};
    ///
    /// let re = PatternMatcher::compile("arn:aws:s3:::bucket/*", PatternMode::Glob).unwrap();
    /// assert!(re.is_match("arn:aws:s3:::bucket/key.txt"));
    /// assert!(!re.is_match("arn:aws:s3:::other/key.txt"));
    /// ```
    pub fn compile(pattern: &str, mode: PatternMode) -> Result<Regex, regex::Error> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push('^');

        let mut literal = [0u8; 4];
        for ch in pattern.chars() {
            match ch {
                '*' => source.push_str(mode.wildcard()),
                '?' => source.push('.'),
                _ => source.push_str(&regex::escape(ch.encode_utf8(&mut literal))),
            }
        }

        source.push('$');
        Regex::new(&source)
    }

    /// Check whether `subject` matches `pattern`
    ///
    /// A missing subject is matched as the empty string, so `*` matches it.
    /// Patterns that cannot be compiled never match.
    ///
    /// # Examples
    /// ```
    /// use pbac_rs::iam::{PatternMatcher, PatternMode};
    ///
    /// let matcher = PatternMatcher::default();
    /// assert!(matcher.matches(Some("iam:CreateUser"), "iam:*User", PatternMode::Glob));
    /// assert!(matcher.matches(None, "*", PatternMode::Glob));
    /// assert!(!matcher.matches(Some("fooo"), "foo", PatternMode::Glob));
    /// ```
    pub fn matches(&self, subject: Option<&str>, pattern: &str, mode: PatternMode) -> bool {
        let subject = subject.unwrap_or("");

        // Patterns without wildcards never need a regex
        if !pattern.contains(['*', '?']) {
            return subject == pattern;
        }

        match self.regex_for(pattern, mode) {
            Some(re) => re.is_match(subject),
            None => false,
        }
    }

    fn regex_for(&self, pattern: &str, mode: PatternMode) -> Option<Regex> {
        let Some(cache) = &self.cache else {
            return Self::compile(pattern, mode).ok();
        };

        if let Some(re) = cache.lock().get(pattern, mode) {
            return Some(re);
        }

        let re = Self::compile(pattern, mode).ok()?;
        cache.lock().put(pattern, mode, re.clone());
        Some(re)
    }

    /// Number of compiled patterns currently cached
    pub fn cached_patterns(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.lock().len())
    }

    /// Drop every cached pattern
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("cached_patterns", &self.cached_patterns())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(subject: &str, pattern: &str) -> bool {
        PatternMatcher::default().matches(Some(subject), pattern, PatternMode::Glob)
    }

    fn arn(subject: &str, pattern: &str) -> bool {
        PatternMatcher::default().matches(Some(subject), pattern, PatternMode::ArnSegment)
    }

    #[test]
    fn test_exact_match() {
        assert!(glob("foo", "foo"));
        assert!(!glob("fooo", "foo"));
        assert!(!glob("foo", "baz"));
    }

    #[test]
    fn test_single_char_wildcard() {
        assert!(glob("foo", "fo?"));
        assert!(!glob("foo", "fo?o"));
    }

    #[test]
    fn test_star_wildcard() {
        assert!(glob("foo", "fo*"));
        assert!(glob("fooxyqkhwebar", "fo*bar"));
        assert!(glob("/myapp/users/test", "/myapp/users/*"));
        assert!(glob("", "*"));
    }

    #[test]
    fn test_missing_subject_is_empty() {
        let matcher = PatternMatcher::default();
        assert!(matcher.matches(None, "*", PatternMode::Glob));
        assert!(!matcher.matches(None, "foo", PatternMode::Glob));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(glob("a.b", "a.b"));
        assert!(!glob("axb", "a.b"));
        assert!(glob("(x)[y]{z}+$^|\\", "(x)[y]{z}+$^|\\"));
        assert!(glob("price: $5.00", "price: $*.00"));
        assert!(!glob("price: 5x00", "price: *.00"));
    }

    #[test]
    fn test_arn_segments() {
        assert!(arn("arn:aws:s3:::mybucket", "arn:aws:s3:*:*:mybucket*"));
        assert!(arn(
            "arn:aws:s3:123412341234:eu-west-1:mybucket-test",
            "arn:aws:s3:*:*:mybucket*"
        ));
        assert!(!arn("arn:aws:s3::::mybucket-test", "arn:aws:s3:*:*:mybucket*"));

        // Glob mode lets the wildcard run across colons
        assert!(glob("arn:aws:s3::::mybucket-test", "arn:aws:s3:*:*:mybucket*"));
    }

    #[test]
    fn test_compile_is_anchored() {
        let re = PatternMatcher::compile("abc", PatternMode::Glob).unwrap();
        assert_eq!(re.as_str(), "^abc$");

        let re = PatternMatcher::compile("a*?", PatternMode::ArnSegment).unwrap();
        assert_eq!(re.as_str(), "^a[^:]*.$");
    }

    #[test]
    fn test_cache_is_populated_and_cleared() {
        let matcher = PatternMatcher::new(8);
        assert_eq!(matcher.cached_patterns(), 0);

        assert!(matcher.matches(Some("abcfoo"), "abc*", PatternMode::Glob));
        assert!(matcher.matches(Some("abcbar"), "abc*", PatternMode::Glob));
        assert_eq!(matcher.cached_patterns(), 1);

        // Same text in another mode is a different entry
        assert!(matcher.matches(Some("abcfoo"), "abc*", PatternMode::ArnSegment));
        assert_eq!(matcher.cached_patterns(), 2);

        // Literal patterns bypass the cache entirely
        assert!(matcher.matches(Some("plain"), "plain", PatternMode::Glob));
        assert_eq!(matcher.cached_patterns(), 2);

        matcher.clear_cache();
        assert_eq!(matcher.cached_patterns(), 0);
    }

    #[test]
    fn test_uncached_matcher() {
        let matcher = PatternMatcher::new(0);
        assert!(matcher.matches(Some("abcfoo"), "abc*", PatternMode::Glob));
        assert_eq!(matcher.cached_patterns(), 0);
    }
}
