//! Policy evaluation engine with deny precedence
//!
//! Evaluates IAM policies to determine if a request is allowed.
//! Key features:
//! - Explicit deny takes precedence over allow
//! - Implicit deny when no statement applies
//! - Condition-based evaluation with a per-engine operator registry
//! - Cached pattern compilation for resources, actions and `*Like` conditions

use super::condition::ConditionRegistry;
use super::pattern::PatternMatcher;
use super::policy::{Effect, Policy};
use super::request::Request;
use super::schema::{PolicyValidator, SchemaValidator};
use super::statement::Evaluator;
use crate::error::{PolicyError, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

const DEFAULT_PATTERN_CACHE_CAPACITY: usize = 1024;

/// Policy evaluation engine
///
/// `Send + Sync`: evaluate from many threads while other threads `add`.
pub struct PolicyEngine {
    policies: RwLock<Vec<Policy>>,
    registry: ConditionRegistry,
    matcher: PatternMatcher,
    validator: Box<dyn PolicyValidator>,
    validate_policies: bool,
}

impl PolicyEngine {
    /// Create an engine with default options from one document or an array
    /// of documents
    pub fn new(documents: Value) -> Result<Self> {
        Self::builder().policies(documents).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Decide a request
    ///
    /// Any applicable `Deny` statement denies. Otherwise any applicable
    /// `Allow` statement allows. Otherwise the request is implicitly denied.
    ///
    /// # Errors
    ///
    /// `UnknownOperator` when a reached condition names an operator the
    /// engine's registry does not know.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbac_rs::iam::{PolicyEngine, Request};
    /// use serde_json::json;
    ///
    /// let engine = PolicyEngine::new(json!({
    ///     "Version": "2012-10-17",
    ///     "Statement": [
    ///         { "Effect": "Allow", "Action": "iam:*User", "Resource": "abc*" },
    ///         { "Effect": "Deny", "Action": "iam:CreateUser", "Resource": "*" }
    ///     ]
    /// }))
    /// .unwrap();
    ///
    /// assert!(engine.evaluate(&Request::new("iam:UpdateUser", "abcfoo")).unwrap());
    /// assert!(!engine.evaluate(&Request::new("iam:CreateUser", "abcfoo")).unwrap());
    /// assert!(!engine.evaluate(&Request::new("iam:UpdateUser", "foo")).unwrap());
    /// ```
    pub fn evaluate(&self, request: &Request) -> Result<bool> {
        let policies = self.policies.read();
        let evaluator = Evaluator::new(&self.registry, &self.matcher);

        if self.find_applicable(&policies, Effect::Deny, request, &evaluator)? {
            debug!(
                "Denied '{}' on '{}' by explicit deny",
                request.action, request.resource
            );
            return Ok(false);
        }

        if self.find_applicable(&policies, Effect::Allow, request, &evaluator)? {
            debug!("Allowed '{}' on '{}'", request.action, request.resource);
            return Ok(true);
        }

        debug!(
            "Denied '{}' on '{}' by default (no applicable statement)",
            request.action, request.resource
        );
        Ok(false)
    }

    /// Scan statements of one effect in load order, stopping at the first
    /// that applies
    fn find_applicable(
        &self,
        policies: &[Policy],
        effect: Effect,
        request: &Request,
        evaluator: &Evaluator<'_>,
    ) -> Result<bool> {
        let statements = policies
            .iter()
            .flat_map(|policy| policy.statement.iter())
            .filter(|statement| statement.effect == effect);

        for statement in statements {
            if statement.applies(request, evaluator)? {
                trace!(
                    "{:?} statement {} applies",
                    effect,
                    statement.sid.as_deref().unwrap_or("<unnamed>")
                );
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Fail-closed form of [`evaluate`](Self::evaluate): errors deny
    pub fn is_allowed(&self, request: &Request) -> bool {
        match self.evaluate(request) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(
                    "Evaluation of '{}' on '{}' failed, denying: {}",
                    request.action, request.resource, e
                );
                false
            }
        }
    }

    /// Append one document or an array of documents
    ///
    /// All documents are validated (when enabled) and parsed before any is
    /// appended; on error nothing is added.
    pub fn add(&self, documents: Value) -> Result<()> {
        let documents = into_documents(documents);

        if self.validate_policies {
            validate_documents(self.validator.as_ref(), &documents)?;
        }

        let parsed = documents
            .into_iter()
            .map(serde_json::from_value::<Policy>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.extend(parsed);
        Ok(())
    }

    /// Append a typed policy
    pub fn add_policy(&self, policy: Policy) -> Result<()> {
        if self.validate_policies {
            let document = serde_json::to_value(&policy)?;
            validate_documents(self.validator.as_ref(), std::slice::from_ref(&document))?;
        }

        self.extend(vec![policy]);
        Ok(())
    }

    fn extend(&self, parsed: Vec<Policy>) {
        let added = parsed.len();
        let mut policies = self.policies.write();
        policies.extend(parsed);
        info!("Added {} policies ({} total)", added, policies.len());
    }

    /// Validate one document or an array of documents without adding them
    pub fn validate(&self, documents: &Value) -> Result<()> {
        match documents {
            Value::Array(items) => validate_documents(self.validator.as_ref(), items),
            single => validate_documents(self.validator.as_ref(), std::slice::from_ref(single)),
        }
    }

    /// Number of loaded policy documents
    pub fn policy_count(&self) -> usize {
        self.policies.read().len()
    }

    /// Number of statements across all loaded policies
    pub fn statement_count(&self) -> usize {
        self.policies
            .read()
            .iter()
            .map(|policy| policy.statement.len())
            .sum()
    }

    /// Condition operators known to this engine
    pub fn conditions(&self) -> &ConditionRegistry {
        &self.registry
    }

    /// Number of compiled patterns currently cached
    pub fn cached_patterns(&self) -> usize {
        self.matcher.cached_patterns()
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("policies", &self.policy_count())
            .field("registry", &self.registry)
            .field("matcher", &self.matcher)
            .field("validate_policies", &self.validate_policies)
            .finish()
    }
}

fn into_documents(documents: Value) -> Vec<Value> {
    match documents {
        Value::Array(items) => items,
        single => vec![single],
    }
}

fn validate_documents(validator: &dyn PolicyValidator, documents: &[Value]) -> Result<()> {
    for (index, document) in documents.iter().enumerate() {
        validator
            .validate(document)
            .map_err(|reason| PolicyError::PolicyValidation { index, reason })?;
    }
    Ok(())
}

/// Builder for [`PolicyEngine`]
pub struct EngineBuilder {
    registry: Option<ConditionRegistry>,
    validate_schema: bool,
    validate_policies: bool,
    validator: Option<Box<dyn PolicyValidator>>,
    pattern_cache_capacity: usize,
    documents: Vec<Value>,
    typed: Vec<Policy>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder {
            registry: None,
            validate_schema: true,
            validate_policies: true,
            validator: None,
            pattern_cache_capacity: DEFAULT_PATTERN_CACHE_CAPACITY,
            documents: Vec::new(),
            typed: Vec::new(),
        }
    }

    /// Use a registry with custom operators instead of the built-ins only
    pub fn conditions(mut self, registry: ConditionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Check the validator's schema at build time (default: true)
    pub fn validate_schema(mut self, enabled: bool) -> Self {
        self.validate_schema = enabled;
        self
    }

    /// Validate documents before accepting them (default: true)
    pub fn validate_policies(mut self, enabled: bool) -> Self {
        self.validate_policies = enabled;
        self
    }

    /// Replace the default [`SchemaValidator`]
    pub fn validator(mut self, validator: impl PolicyValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Compiled pattern cache size; 0 disables the cache (default: 1024)
    pub fn pattern_cache_capacity(mut self, capacity: usize) -> Self {
        self.pattern_cache_capacity = capacity;
        self
    }

    /// Initial documents: one document or an array of documents
    pub fn policies(mut self, documents: Value) -> Self {
        self.documents.extend(into_documents(documents));
        self
    }

    /// Initial typed policy
    pub fn policy(mut self, policy: Policy) -> Self {
        self.typed.push(policy);
        self
    }

    /// Build the engine
    ///
    /// Typed policies are appended after the JSON documents.
    pub fn build(self) -> Result<PolicyEngine> {
        let registry = self.registry.unwrap_or_default();
        let validator = self
            .validator
            .unwrap_or_else(|| Box::new(SchemaValidator::new(&registry)));

        if self.validate_schema {
            validator.check_schema()?;
        }

        let engine = PolicyEngine {
            policies: RwLock::new(Vec::new()),
            registry,
            matcher: PatternMatcher::new(self.pattern_cache_capacity),
            validator,
            validate_policies: self.validate_policies,
        };

        if !self.documents.is_empty() {
            engine.add(Value::Array(self.documents))?;
        }
        for policy in self.typed {
            engine.add_policy(policy)?;
        }

        info!(
            "Policy engine ready: {} policies, {} statements, {} condition operators",
            engine.policy_count(),
            engine.statement_count(),
            engine.registry.len()
        );

        Ok(engine)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
