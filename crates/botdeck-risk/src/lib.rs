//! Risk-limit validation for the botdeck console.
//!
//! Pure checks over a candidate `RiskLimits`:
//! - Range checks per field (finite, bounds, integers)
//! - Cross-field ordering: stopLoss < priceThreshold < profitTarget
//!
//! Errors are keyed by field. `TouchedFields` decides which of them are
//! shown while the operator is still editing; saving is gated on
//! `FieldErrors::is_valid` regardless of what is shown.

pub mod error;
pub mod touched;
pub mod validate;

pub use error::{RiskError, RiskResult};
pub use touched::TouchedFields;
pub use validate::{validate, FieldErrors};
