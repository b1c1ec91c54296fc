//! Gateway error types.

use botdeck_risk::FieldErrors;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Non-2xx response from the API.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Rejected locally before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid risk limits: {0}")]
    InvalidRiskLimits(FieldErrors),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl GatewayError {
    /// HTTP status when the server answered with a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the command never left the process.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidRiskLimits(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
