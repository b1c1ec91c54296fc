//! Error types for botdeck-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Unknown bot mode: {0}")]
    UnknownMode(String),

    #[error("Unknown risk field: {0}")]
    UnknownField(String),

    #[error("Malformed push event: {0}")]
    MalformedEvent(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
