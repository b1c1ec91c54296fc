//! Core domain types for the botdeck operator console.
//!
//! This crate provides the vocabulary shared by every other botdeck crate:
//! - `Resource`, `CacheKey`: identifiers for server-derived views
//! - `BotMode`: bot operating state (drives confirmation strictness)
//! - `PushEvent`, `EventKind`: decoded push-channel events
//! - `RiskLimits`, `RiskLimitsPatch`: risk-limit configuration
//! - `BotStatus`, `Position`, `Order`: read models

pub mod error;
pub mod event;
pub mod mode;
pub mod models;
pub mod resource;
pub mod risk_limits;

pub use error::{CoreError, Result};
pub use event::{EventKind, PushEvent};
pub use mode::BotMode;
pub use models::{total_exposure, BotStatus, Order, Position, Side};
pub use resource::{CacheKey, Resource};
pub use risk_limits::{RiskField, RiskLimits, RiskLimitsPatch};
