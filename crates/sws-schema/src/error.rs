//! Error types for model loading.

/// Errors raised while building a [`crate::ModelInfo`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The model JSON could not be parsed.
    #[error("model json: {0}")]
    Json(#[from] serde_json::Error),

    /// The model parsed but is inconsistent.
    #[error("invalid model: {0}")]
    Invalid(String),

    /// A default value is malformed for its attribute.
    #[error("bad default for attribute {attr}: {reason}")]
    BadDefault { attr: String, reason: String },
}

/// Convenience alias for schema results.
pub type SchemaResult<T> = Result<T, SchemaError>;
