//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Preferences error: {0}")]
    Preferences(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected payload for {resource}: {message}")]
    Payload { resource: String, message: String },

    #[error("Gateway error: {0}")]
    Gateway(#[from] botdeck_gateway::GatewayError),

    #[error("Cache error: {0}")]
    Cache(#[from] botdeck_cache::CacheError),

    #[error("Stream error: {0}")]
    Stream(#[from] botdeck_stream::StreamError),

    #[error("Confirmation error: {0}")]
    Confirm(#[from] botdeck_confirm::ConfirmError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] botdeck_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
