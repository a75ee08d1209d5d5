//! Statement matching against a request
//!
//! A statement applies when, in order:
//! 1. `Principal` matches and `NotPrincipal` does not
//! 2. `Resource` matches and `NotResource` does not (patterns are interpolated)
//! 3. `Action` matches and `NotAction` does not
//! 4. every condition entry holds
//!
//! The first failing check short-circuits the rest.

use super::condition::{for_any_value, ConditionRegistry};
use super::context::Context;
use super::pattern::{PatternMatcher, PatternMode};
use super::policy::{ConditionBlock, Principals, Statement, StringList};
use super::request::Request;
use super::value::ConditionValue;
use crate::error::{PolicyError, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::trace;

/// Matching machinery shared by every statement of one evaluation
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    registry: &'a ConditionRegistry,
    matcher: &'a PatternMatcher,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a ConditionRegistry, matcher: &'a PatternMatcher) -> Self {
        Evaluator { registry, matcher }
    }

    /// Some request principal type with a non-empty identifier list shares
    /// an identifier with the same type in `principals`
    pub fn principal_matches(
        &self,
        principals: &Principals,
        request: &BTreeMap<String, StringList>,
    ) -> bool {
        request
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .any(|(kind, ids)| {
                principals.get(kind).is_some_and(|allowed| {
                    for_any_value(allowed.as_slice(), ids.as_slice(), |a, b| a == b)
                })
            })
    }

    /// Some pattern, after `${...}` interpolation, matches the request resource
    pub fn resource_matches(
        &self,
        patterns: &StringList,
        resource: &str,
        context: &Context,
    ) -> bool {
        patterns.iter().any(|pattern| {
            let pattern = context.interpolate(pattern);
            self.matcher.matches(Some(resource), &pattern, PatternMode::Glob)
        })
    }

    /// Some pattern matches the request action
    pub fn action_matches(&self, patterns: &StringList, action: &str) -> bool {
        patterns
            .iter()
            .any(|pattern| self.matcher.matches(Some(action), pattern, PatternMode::Glob))
    }

    /// AND over operators, AND over context keys, then the operator's own
    /// rule over the policy values
    ///
    /// Every operator is looked up before any entry is evaluated, so an
    /// unknown operator fails the block whatever its position.
    pub fn conditions_hold(&self, block: &ConditionBlock, context: &Context) -> Result<bool> {
        let operators = block
            .iter()
            .map(|(name, entries)| {
                self.registry
                    .get(name)
                    .map(|operator| (name, operator, entries))
                    .ok_or_else(|| PolicyError::UnknownOperator(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        for (name, operator, entries) in operators {
            for (key, declared) in entries {
                let resolved = context.resolve(key);
                let subject = if operator.observes_absence() {
                    resolved.value().map(Cow::Borrowed)
                } else {
                    Some(resolved.or_literal(key))
                };

                let values: Vec<Cow<'_, ConditionValue>> = declared
                    .as_slice()
                    .iter()
                    .map(|value| context.interpolate_value(value))
                    .collect();

                let holds = operator.evaluate(self.matcher, subject.as_deref(), &values);
                trace!("Condition {} on '{}': {}", name, key, holds);

                if !holds {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }
}

impl Statement {
    /// Check whether this statement applies to the request
    ///
    /// Fails only when a condition names an operator the registry does not know.
    ///
    /// # Examples
    /// ```
    /// use pbac_rs::iam::{
    ///     ConditionRegistry, Effect, Evaluator, PatternMatcher, Request, Statement,
    /// };
    ///
    /// let registry = ConditionRegistry::default();
    /// let matcher = PatternMatcher::default();
    /// let evaluator = Evaluator::new(&registry, &matcher);
    ///
    /// let stmt = Statement::new(Effect::Allow)
    ///     .with_action("iam:*")
    ///     .with_resource("arn:aws:iam:::user/${aws:username}");
    /// let request = Request::new("iam:GetUser", "arn:aws:iam:::user/alice")
    ///     .with_context("aws", "username", "alice");
    /// assert!(stmt.applies(&request, &evaluator).unwrap());
    /// ```
    pub fn applies(&self, request: &Request, evaluator: &Evaluator<'_>) -> Result<bool> {
        if let Some(principals) = &self.principal {
            if !evaluator.principal_matches(principals, &request.principal) {
                return Ok(false);
            }
        }
        if let Some(principals) = &self.not_principal {
            if evaluator.principal_matches(principals, &request.principal) {
                return Ok(false);
            }
        }

        if let Some(patterns) = &self.resource {
            if !evaluator.resource_matches(patterns, &request.resource, &request.context) {
                return Ok(false);
            }
        }
        if let Some(patterns) = &self.not_resource {
            if evaluator.resource_matches(patterns, &request.resource, &request.context) {
                return Ok(false);
            }
        }

        if let Some(patterns) = &self.action {
            if !evaluator.action_matches(patterns, &request.action) {
                return Ok(false);
            }
        }
        if let Some(patterns) = &self.not_action {
            if evaluator.action_matches(patterns, &request.action) {
                return Ok(false);
            }
        }

        match &self.condition {
            Some(block) => evaluator.conditions_hold(block, &request.context),
            None => Ok(true),
        }
    }
}
