//! Structural validation of policy documents
//!
//! Documents are validated as raw JSON before they are parsed into the typed
//! model, so a rejected document reports what is wrong with it rather than a
//! deserializer error. `SchemaValidator` is the default; engines accept any
//! [`PolicyValidator`].

use super::condition::ConditionRegistry;
use crate::error::{PolicyError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Validator invoked by the engine before it accepts a document
pub trait PolicyValidator: Send + Sync {
    /// Check the validator's own configuration, once at engine build time
    fn check_schema(&self) -> Result<()> {
        Ok(())
    }

    /// Validate one policy document, returning the reason on failure
    fn validate(&self, document: &Value) -> std::result::Result<(), String>;
}

const POLICY_KEYS: &[&str] = &["Version", "Id", "Statement"];

const STATEMENT_KEYS: &[&str] = &[
    "Sid",
    "Effect",
    "Principal",
    "NotPrincipal",
    "Action",
    "NotAction",
    "Resource",
    "NotResource",
    "Condition",
];

/// Default validator for the AWS IAM document shape
///
/// Condition operator keys must name operators of the registry the
/// validator was built from.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    operators: BTreeSet<String>,
}

impl SchemaValidator {
    pub fn new(registry: &ConditionRegistry) -> Self {
        SchemaValidator {
            operators: registry.names().map(str::to_string).collect(),
        }
    }

    fn validate_statement(&self, statement: &Value) -> std::result::Result<(), String> {
        let statement = statement
            .as_object()
            .ok_or_else(|| "statement must be an object".to_string())?;

        reject_unknown_keys(statement, STATEMENT_KEYS, "statement")?;

        match statement.get("Effect").and_then(Value::as_str) {
            Some("Allow") | Some("Deny") => {}
            Some(other) => return Err(format!("invalid Effect '{}'", other)),
            None => return Err("Effect must be \"Allow\" or \"Deny\"".to_string()),
        }

        if let Some(sid) = statement.get("Sid") {
            if !sid.is_string() {
                return Err("Sid must be a string".to_string());
            }
        }

        for (key, negated) in [
            ("Action", "NotAction"),
            ("Resource", "NotResource"),
            ("Principal", "NotPrincipal"),
        ] {
            if statement.contains_key(key) && statement.contains_key(negated) {
                return Err(format!("{} and {} are mutually exclusive", key, negated));
            }
        }

        for key in ["Action", "NotAction", "Resource", "NotResource"] {
            if let Some(value) = statement.get(key) {
                check_string_or_array(value).map_err(|reason| format!("{} {}", key, reason))?;
            }
        }

        for key in ["Principal", "NotPrincipal"] {
            if let Some(value) = statement.get(key) {
                let principals = value
                    .as_object()
                    .ok_or_else(|| format!("{} must be an object", key))?;
                for (kind, ids) in principals {
                    check_string_or_array(ids)
                        .map_err(|reason| format!("{}.{} {}", key, kind, reason))?;
                }
            }
        }

        if let Some(condition) = statement.get("Condition") {
            self.validate_condition(condition)?;
        }

        Ok(())
    }

    fn validate_condition(&self, condition: &Value) -> std::result::Result<(), String> {
        let condition = condition
            .as_object()
            .ok_or_else(|| "Condition must be an object".to_string())?;

        for (operator, entries) in condition {
            if !self.operators.contains(operator) {
                return Err(format!("unknown condition operator '{}'", operator));
            }

            let entries = entries
                .as_object()
                .ok_or_else(|| format!("Condition.{} must be an object", operator))?;

            for (key, value) in entries {
                let scalars_only = match value {
                    Value::Array(items) => items.iter().all(is_scalar),
                    other => is_scalar(other),
                };
                if !scalars_only {
                    return Err(format!(
                        "Condition.{}.{} must be a value or an array of values",
                        operator, key
                    ));
                }
            }
        }

        Ok(())
    }
}

impl PolicyValidator for SchemaValidator {
    fn check_schema(&self) -> Result<()> {
        if self.operators.is_empty() {
            return Err(PolicyError::SchemaValidation(
                "no condition operators registered".to_string(),
            ));
        }

        if let Some(name) = self
            .operators
            .iter()
            .find(|name| name.is_empty() || name.chars().any(char::is_whitespace))
        {
            return Err(PolicyError::SchemaValidation(format!(
                "malformed condition operator name '{}'",
                name
            )));
        }

        Ok(())
    }

    fn validate(&self, document: &Value) -> std::result::Result<(), String> {
        let policy = document
            .as_object()
            .ok_or_else(|| "policy must be an object".to_string())?;

        reject_unknown_keys(policy, POLICY_KEYS, "policy")?;

        match policy.get("Version") {
            Some(Value::String(_)) => {}
            Some(_) => return Err("Version must be a string".to_string()),
            None => return Err("missing Version".to_string()),
        }

        if let Some(id) = policy.get("Id") {
            if !id.is_string() {
                return Err("Id must be a string".to_string());
            }
        }

        match policy.get("Statement") {
            Some(Value::Array(statements)) if statements.is_empty() => {
                Err("Statement must not be empty".to_string())
            }
            Some(Value::Array(statements)) => {
                for (i, statement) in statements.iter().enumerate() {
                    self.validate_statement(statement)
                        .map_err(|reason| format!("Statement {}: {}", i, reason))?;
                }
                Ok(())
            }
            Some(statement @ Value::Object(_)) => self.validate_statement(statement),
            Some(_) => Err("Statement must be an object or an array".to_string()),
            None => Err("missing Statement".to_string()),
        }
    }
}

fn reject_unknown_keys(
    object: &Map<String, Value>,
    allowed: &[&str],
    what: &str,
) -> std::result::Result<(), String> {
    match object.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(format!("unknown {} key '{}'", what, key)),
        None => Ok(()),
    }
}

fn check_string_or_array(value: &Value) -> std::result::Result<(), String> {
    match value {
        Value::String(_) => Ok(()),
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
        _ => Err("must be a string or an array of strings".to_string()),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
