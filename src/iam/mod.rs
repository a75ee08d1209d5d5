//! Policy-based access control, modelled on AWS IAM policy evaluation
//!
//! Provides:
//! - JSON policy documents with Allow/Deny statements and explicit deny precedence
//! - Principal, action and resource matching with `*` / `?` wildcards
//! - `${namespace:attribute}` interpolation against request context
//! - Condition operators (String, Numeric, Date, Arn, Binary, IpAddress, Null,
//!   Bool) with `IfExists`, `ForAllValues:` and `ForAnyValue:` variants
//! - Custom condition operators registered per engine
//! - LRU caching of compiled wildcard patterns

mod cache;
mod condition;
mod context;
mod engine;
mod pattern;
mod policy;
mod request;
mod schema;
mod statement;
mod value;

pub use cache::PatternCache;
pub use condition::{
    for_all_values, for_any_value, parse_timestamp, Builtin, ConditionFn, ConditionRegistry,
    ConditionRegistryBuilder, Modifier, Operator,
};
pub use context::{Context, Resolved};
pub use engine::{EngineBuilder, PolicyEngine};
pub use pattern::{PatternMatcher, PatternMode};
pub use policy::{ConditionBlock, Effect, Policy, Principals, Statement, StringList};
pub use request::Request;
pub use schema::{PolicyValidator, SchemaValidator};
pub use statement::Evaluator;
pub use value::ConditionValue;
