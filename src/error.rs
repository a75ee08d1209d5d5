use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Policy validation failed for document {index}: {reason}")]
    PolicyValidation { index: usize, reason: String },

    #[error("Policy parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown condition operator: {0}")]
    UnknownOperator(String),

    /// Empty, containing `:` or whitespace, or ending in `IfExists`
    #[error("Invalid condition operator name: '{0}'")]
    InvalidOperatorName(String),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
