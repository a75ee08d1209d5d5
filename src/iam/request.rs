//! Access request descriptor

use super::context::Context;
use super::policy::StringList;
use super::value::ConditionValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request to be decided
///
/// Every field defaults to empty. In JSON, `variables` is accepted in place
/// of `context`.
///
/// # Examples
/// ```
/// use pbac_rs::iam::Request;
///
/// let request = Request::new("s3:GetObject", "arn:aws:s3:::bucket/key")
///     .with_principal("AWS", ["arn:aws:iam::123:user/alice"])
///     .with_context("aws", "SourceIp", "10.0.20.51");
/// assert_eq!(request.action, "s3:GetObject");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub action: String,
    pub resource: String,
    /// Principal type -> identifiers
    pub principal: BTreeMap<String, StringList>,
    #[serde(alias = "variables")]
    pub context: Context,
}

impl Request {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Request {
            action: action.into(),
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn with_principal(mut self, kind: impl Into<String>, ids: impl Into<StringList>) -> Self {
        self.principal.insert(kind.into(), ids.into());
        self
    }

    pub fn with_context(
        mut self,
        namespace: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.context.insert(namespace, attribute, value);
        self
    }

    /// Replace the whole context
    pub fn with_context_map(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}
