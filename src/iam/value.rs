//! Values compared by condition operators
//!
//! The same type carries request context values and policy-declared
//! comparison values. JSON maps onto it directly; `Binary` only exists on the
//! request side since JSON has no byte strings.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Condition value (request context or policy operand)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<ConditionValue>),
    #[serde(skip)]
    Binary(Vec<u8>),
}

impl ConditionValue {
    /// Raw bytes value, for `Binary*` operators
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        ConditionValue::Binary(bytes.into())
    }

    /// List value from anything convertible
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ConditionValue>,
    {
        ConditionValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConditionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConditionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            ConditionValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// View as a sequence: list items, or the value itself as a single item
    pub fn as_slice(&self) -> &[ConditionValue] {
        match self {
            ConditionValue::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Textual form used when the value is spliced into a `${...}` template
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            ConditionValue::Null => Cow::Borrowed("null"),
            ConditionValue::Bool(b) => Cow::Owned(b.to_string()),
            ConditionValue::Number(n) => Cow::Owned(n.to_string()),
            ConditionValue::String(s) => Cow::Borrowed(s),
            ConditionValue::List(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| item.to_text())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ConditionValue::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::String(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Bool(value)
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Number(value as f64)
    }
}

impl From<i32> for ConditionValue {
    fn from(value: i32) -> Self {
        ConditionValue::Number(f64::from(value))
    }
}

impl From<Vec<ConditionValue>> for ConditionValue {
    fn from(value: Vec<ConditionValue>) -> Self {
        ConditionValue::List(value)
    }
}
