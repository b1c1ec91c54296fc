//! Cache error types.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Load failed for {key} after {attempts} attempt(s): {message}")]
    LoadFailed {
        key: String,
        attempts: u32,
        message: String,
    },

    #[error("Decode error for {key}: {message}")]
    Decode { key: String, message: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
