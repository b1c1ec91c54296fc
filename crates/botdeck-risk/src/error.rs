//! Risk error types.

use crate::validate::FieldErrors;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RiskError {
    #[error("Risk limits rejected: {0}")]
    Invalid(FieldErrors),
}

pub type RiskResult<T> = Result<T, RiskError>;
