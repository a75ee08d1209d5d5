//! # pbac-rs - Policy-Based Access Control
//!
//! `pbac-rs` decides whether a request is permitted by a set of declarative
//! policy documents, following the AWS IAM evaluation model:
//!
//! - **Explicit deny** beats any allow; no applicable statement means deny
//! - **Wildcard patterns** for actions and resources, ARN-aware `Arn*` operators
//! - **Conditions** over request context, with multi-valued quantifiers
//! - **Variables**: `${aws:username}` in resources and condition values
//! - **Custom operators** registered per engine
//!
//! ## Quick Start
//!
//! ```rust
//! use pbac_rs::{PolicyEngine, Request, Result};
//! use serde_json::json;
//!
//! # fn main() -> Result<()> {
//! let engine = PolicyEngine::new(json!({
//!     "Version": "2012-10-17",
//!     "Statement": [{
//!         "Effect": "Allow",
//!         "Action": ["iam:GetUser", "iam:UpdateUser"],
//!         "Resource": "arn:aws:iam:::user/${aws:username}",
//!         "Condition": { "Bool": { "aws:MultiFactorAuthPresent": true } }
//!     }]
//! }))?;
//!
//! let request = Request::new("iam:GetUser", "arn:aws:iam:::user/alice")
//!     .with_context("aws", "username", "alice")
//!     .with_context("aws", "MultiFactorAuthPresent", true);
//!
//! assert!(engine.evaluate(&request)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Operators
//!
//! ```rust
//! use pbac_rs::{ConditionRegistry, ConditionValue, PolicyEngine, Request, Result};
//! use serde_json::json;
//!
//! # fn main() -> Result<()> {
//! let conditions = ConditionRegistry::builder()
//!     .register("LaxEquals", |a, b| a == Some(b))
//!     .build()?;
//!
//! let engine = PolicyEngine::builder()
//!     .conditions(conditions)
//!     .policies(json!({
//!         "Version": "2012-10-17",
//!         "Statement": {
//!             "Effect": "Allow",
//!             "Condition": { "LaxEquals": { "app:field": [null, ""] } }
//!         }
//!     }))
//!     .build()?;
//!
//! let request = Request::default().with_context("app", "field", ConditionValue::Null);
//! assert!(engine.evaluate(&request)?);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod iam;

pub use crate::error::{PolicyError, Result};
pub use crate::iam::{
    ConditionRegistry, ConditionValue, Context, Effect, EngineBuilder, Policy, PolicyEngine,
    PolicyValidator, Request, SchemaValidator, Statement,
};
