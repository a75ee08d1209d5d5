//! Request context and `${namespace:attribute}` variable resolution

use super::value::ConditionValue;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{(.+?)\}").expect("variable pattern is valid"))
}

/// Outcome of a context lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// The namespace exists and defines the attribute
    Found(&'a ConditionValue),
    /// No such namespace or attribute
    Missing,
}

impl<'a> Resolved<'a> {
    pub fn value(self) -> Option<&'a ConditionValue> {
        match self {
            Resolved::Found(value) => Some(value),
            Resolved::Missing => None,
        }
    }

    /// The found value, or the unresolved key as literal text
    pub fn or_literal(self, key: &str) -> Cow<'a, ConditionValue> {
        match self {
            Resolved::Found(value) => Cow::Borrowed(value),
            Resolved::Missing => Cow::Owned(ConditionValue::String(key.to_string())),
        }
    }
}

/// Request context: namespace -> attribute -> value
///
/// Keys are addressed as `namespace:attribute`, e.g. `aws:username`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(HashMap<String, HashMap<String, ConditionValue>>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    ///
    /// # Examples
    /// ```
    /// use pbac_rs::iam::Context;
    ///
    /// let ctx = Context::new().with("aws", "username", "alice");
    /// assert_eq!(ctx.resolve("aws:username").value().and_then(|v| v.as_str()), Some("alice"));
    /// assert!(ctx.resolve("aws:userid").value().is_none());
    /// ```
    pub fn with(
        mut self,
        namespace: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.insert(namespace, attribute, value);
        self
    }

    pub fn insert(
        &mut self,
        namespace: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) {
        self.0
            .entry(namespace.into())
            .or_default()
            .insert(attribute.into(), value.into());
    }

    /// Two-level lookup of `namespace:attribute`
    ///
    /// Only the first two colon-separated parts of `key` are used; a key
    /// without an attribute part never resolves.
    pub fn resolve(&self, key: &str) -> Resolved<'_> {
        let mut parts = key.split(':');
        let (Some(namespace), Some(attribute)) = (parts.next(), parts.next()) else {
            return Resolved::Missing;
        };

        self.0
            .get(namespace)
            .and_then(|attributes| attributes.get(attribute))
            .map_or(Resolved::Missing, Resolved::Found)
    }

    /// Replace every `${namespace:attribute}` in `template`
    ///
    /// Unresolved variables are replaced by their own key text.
    ///
    /// # Examples
    /// ```
    /// use pbac_rs::iam::Context;
    ///
    /// let ctx = Context::new().with("aws", "username", "alice");
    /// assert_eq!(ctx.interpolate("user/${aws:username}"), "user/alice");
    /// assert_eq!(ctx.interpolate("user/${aws:userid}"), "user/aws:userid");
    /// ```
    pub fn interpolate<'t>(&self, template: &'t str) -> Cow<'t, str> {
        if !template.contains("${") {
            return Cow::Borrowed(template);
        }

        variable_pattern().replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            match self.resolve(key) {
                Resolved::Found(value) => value.to_text().into_owned(),
                Resolved::Missing => key.to_string(),
            }
        })
    }

    /// Interpolate a policy-declared value; only strings carry variables
    pub fn interpolate_value<'v>(&self, value: &'v ConditionValue) -> Cow<'v, ConditionValue> {
        match value {
            ConditionValue::String(s) => match self.interpolate(s) {
                Cow::Borrowed(_) => Cow::Borrowed(value),
                Cow::Owned(text) => Cow::Owned(ConditionValue::String(text)),
            },
            other => Cow::Borrowed(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, HashMap<String, ConditionValue>>> for Context {
    fn from(map: HashMap<String, HashMap<String, ConditionValue>>) -> Self {
        Context(map)
    }
}
