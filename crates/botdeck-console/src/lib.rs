//! Headless operator console for the trading bot.
//!
//! Wires the botdeck crates together:
//! - Cache store fed by read-endpoint loaders
//! - Push stream invalidating cached views
//! - Command gateway behind the confirmation workflow
//! - TOML configuration and local preferences

pub mod app;
pub mod config;
pub mod error;
pub mod prefs;

pub use app::Console;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use prefs::{PreferenceStore, Preferences, Theme};
