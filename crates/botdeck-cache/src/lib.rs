//! Stale-while-revalidate cache store for botdeck views.
//!
//! Every server-derived view reads through one shared `CacheStore`:
//! - Per-key stale time and background refresh interval
//! - Bounded retries; failed refreshes keep the last good value
//! - Point and family invalidation, serialized loads per key
//! - Change notification for observers via `tokio::sync::watch`

pub mod error;
pub mod loader;
pub mod policy;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use loader::{loader_fn, BoxFuture, FnLoader, Loader};
pub use policy::{CachePolicy, FetchOptions, ResourceTuning};
pub use store::{CacheStore, EntrySnapshot, InvalidationSink, Observation};
