//! Operator command gateway for botdeck.
//!
//! One network call per command, no retries. Provides:
//! - `Command`: every operator command with its endpoint, body and the
//!   cache families it affects
//! - `CommandGateway`: local validation, dispatch and outcome metrics
//! - `ApiTransport`/`HttpTransport`: request/response transport (reqwest)
//! - `ResourceLoader`: cache loader for read endpoints
//! - `camelize_keys`: snake_case to camelCase boundary mapping

pub mod casing;
pub mod client;
pub mod command;
pub mod credentials;
pub mod error;
pub mod loader;
pub mod transport;

pub use casing::{camelize_keys, to_camel_case};
pub use client::CommandGateway;
pub use command::{Command, ManualOrder};
pub use credentials::{stream_url, ApiKey};
pub use error::{GatewayError, GatewayResult};
pub use loader::ResourceLoader;
pub use transport::{ApiTransport, DynTransport, HttpTransport, MockTransport, RecordedRequest};
