//! Confirmation error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    /// A confirmed action is still running.
    #[error("Another action is being confirmed")]
    Busy,

    #[error("No pending confirmation")]
    NoActiveRequest,

    #[error("Typed confirmation phrase does not match")]
    ConfirmationRequired,

    #[error("Action failed: {0}")]
    ActionFailed(String),
}

pub type ConfirmResult<T> = Result<T, ConfirmError>;
