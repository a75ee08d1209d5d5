//! IAM Policy document structure
//!
//! Policies define what actions are allowed or denied on resources, for
//! which principals and under which conditions. The JSON shape follows AWS
//! IAM: PascalCase keys, and most list-valued fields accept either a single
//! item or an array.

use super::value::ConditionValue;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Condition block: operator -> context key -> policy value(s)
///
/// Operators and keys are held in sorted order, not document order. Every
/// entry must hold, so the order does not change a decision.
pub type ConditionBlock = BTreeMap<String, BTreeMap<String, ConditionValue>>;

/// Principal block: principal type (e.g. `AWS`) -> identifiers
pub type Principals = BTreeMap<String, StringList>;

/// Deserialize either a single item or an array of items into a `Vec`
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

/// One or many strings (actions, resources, principal identifiers)
///
/// Deserializes from a string or an array of strings; always serializes as
/// an array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringList(#[serde(deserialize_with = "one_or_many")] pub Vec<String>);

impl StringList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for StringList {
    fn from(value: &str) -> Self {
        StringList(vec![value.to_string()])
    }
}

impl From<String> for StringList {
    fn from(value: String) -> Self {
        StringList(vec![value])
    }
}

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        StringList(values)
    }
}

impl From<Vec<&str>> for StringList {
    fn from(values: Vec<&str>) -> Self {
        values.into_iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for StringList {
    fn from(values: [&str; N]) -> Self {
        values.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for StringList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        StringList(iter.into_iter().map(Into::into).collect())
    }
}

/// Effect of a policy statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action
    Allow,
    /// Deny the action (takes precedence over Allow)
    Deny,
}

/// A single policy statement
///
/// Absent fields place no constraint on the request: a statement with
/// neither `Action` nor `NotAction` applies to every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// Statement ID (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Effect of this statement
    pub effect: Effect,

    /// Principals this statement applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principals>,

    /// Principals this statement does not apply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<Principals>,

    /// Action patterns (`*` and `?` wildcards)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<StringList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<StringList>,

    /// Resource patterns, may contain `${namespace:attribute}` variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<StringList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<StringList>,

    /// Optional conditions for when this statement applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionBlock>,
}

impl Statement {
    /// Create a statement that matches everything, to be narrowed with the
    /// `with_*` methods
    ///
    /// # Examples
    /// ```
    /// use pbac_rs::iam::{Effect, Statement};
    ///
    /// let stmt = Statement::new(Effect::Allow)
    ///     .with_action(["s3:GetObject", "s3:ListBucket"])
    ///     .with_resource("arn:aws:s3:::bucket/*")
    ///     .with_condition("IpAddress", "aws:SourceIp", "10.0.0.0/8");
    /// assert_eq!(stmt.action.unwrap().len(), 2);
    /// ```
    pub fn new(effect: Effect) -> Self {
        Statement {
            sid: None,
            effect,
            principal: None,
            not_principal: None,
            action: None,
            not_action: None,
            resource: None,
            not_resource: None,
            condition: None,
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_action(mut self, actions: impl Into<StringList>) -> Self {
        self.action = Some(actions.into());
        self
    }

    pub fn with_not_action(mut self, actions: impl Into<StringList>) -> Self {
        self.not_action = Some(actions.into());
        self
    }

    pub fn with_resource(mut self, resources: impl Into<StringList>) -> Self {
        self.resource = Some(resources.into());
        self
    }

    pub fn with_not_resource(mut self, resources: impl Into<StringList>) -> Self {
        self.not_resource = Some(resources.into());
        self
    }

    /// Add identifiers of one principal type
    pub fn with_principal(mut self, kind: impl Into<String>, ids: impl Into<StringList>) -> Self {
        self.principal
            .get_or_insert_with(BTreeMap::new)
            .insert(kind.into(), ids.into());
        self
    }

    pub fn with_not_principal(
        mut self,
        kind: impl Into<String>,
        ids: impl Into<StringList>,
    ) -> Self {
        self.not_principal
            .get_or_insert_with(BTreeMap::new)
            .insert(kind.into(), ids.into());
        self
    }

    /// Add one condition entry; a repeated operator/key pair is replaced
    pub fn with_condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.condition
            .get_or_insert_with(BTreeMap::new)
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }
}

/// Complete IAM policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    /// Policy format version
    pub version: String,

    /// List of policy statements
    #[serde(deserialize_with = "one_or_many")]
    pub statement: Vec<Statement>,
}

impl Policy {
    /// Create a new empty policy
    pub fn new() -> Self {
        Policy {
            version: "2012-10-17".to_string(),
            statement: Vec::new(),
        }
    }

    /// Add a statement to this policy
    pub fn add_statement(&mut self, statement: Statement) {
        self.statement.push(statement);
    }

    /// Builder-style `add_statement`
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.add_statement(statement);
        self
    }

    /// Parse policy from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize policy to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}
