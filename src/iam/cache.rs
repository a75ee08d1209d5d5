//! LRU cache for compiled IAM wildcard patterns
//!
//! Compiling a pattern to a regex dominates the cost of `*Like` matching, and
//! policies reuse the same handful of patterns on every evaluation.

use super::pattern::PatternMode;
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;

/// Cache key for a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    pattern: String,
    mode: PatternMode,
}

/// LRU cache of compiled patterns
pub struct PatternCache {
    cache: LruCache<CacheKey, Regex>,
}

impl PatternCache {
    /// Create a new pattern cache with given capacity (at least one entry)
    pub fn new(capacity: usize) -> Self {
        PatternCache {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached regex
    pub fn get(&mut self, pattern: &str, mode: PatternMode) -> Option<Regex> {
        let key = CacheKey {
            pattern: pattern.to_string(),
            mode,
        };
        self.cache.get(&key).cloned()
    }

    /// Put a compiled regex in the cache
    pub fn put(&mut self, pattern: &str, mode: PatternMode, regex: Regex) {
        let key = CacheKey {
            pattern: pattern.to_string(),
            mode,
        };
        self.cache.put(key, regex);
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of cached patterns
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(source: &str) -> Regex {
        Regex::new(source).unwrap()
    }

    #[test]
    fn test_cache_basic() {
        let mut cache = PatternCache::new(10);

        assert!(cache.get("abc*", PatternMode::Glob).is_none());

        cache.put("abc*", PatternMode::Glob, regex("^abc.*$"));
        let hit = cache.get("abc*", PatternMode::Glob).unwrap();
        assert!(hit.is_match("abcdef"));
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = PatternCache::new(2);

        cache.put("a*", PatternMode::Glob, regex("^a.*$"));
        cache.put("b*", PatternMode::Glob, regex("^b.*$"));
        cache.put("c*", PatternMode::Glob, regex("^c.*$")); // Should evict a*

        assert!(cache.get("a*", PatternMode::Glob).is_none()); // Evicted
        assert!(cache.get("b*", PatternMode::Glob).is_some());
        assert!(cache.get("c*", PatternMode::Glob).is_some());
    }

    #[test]
    fn test_cache_clear() {
        let mut cache = PatternCache::new(10);

        cache.put("a*", PatternMode::Glob, regex("^a.*$"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_modes_are_distinct() {
        let mut cache = PatternCache::new(10);

        cache.put("arn:*", PatternMode::Glob, regex("^arn:.*$"));
        cache.put("arn:*", PatternMode::ArnSegment, regex("^arn:[^:]*$"));

        assert!(cache.get("arn:*", PatternMode::Glob).unwrap().is_match("arn:a:b"));
        assert!(!cache
            .get("arn:*", PatternMode::ArnSegment)
            .unwrap()
            .is_match("arn:a:b"));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = PatternCache::new(0);
        cache.put("a*", PatternMode::Glob, regex("^a.*$"));
        assert_eq!(cache.len(), 1);
    }
}
