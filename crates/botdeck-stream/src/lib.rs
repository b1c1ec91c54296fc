//! Push event stream for botdeck.
//!
//! Keeps one WebSocket connection to the bot and turns each pushed event
//! into cache invalidations:
//! - Automatic reconnection with exponential backoff and jitter
//! - Line-delimited JSON decoding; malformed events never fail the stream
//! - Fixed dispatch table from event type to invalidated resources
//! - Full invalidation after a reconnect (events may have been missed)

pub mod connection;
pub mod error;
pub mod handle;
pub mod router;

pub use connection::{ConnectionState, StreamConfig, StreamConnection, StreamSignal};
pub use error::{StreamError, StreamResult};
pub use handle::EventStreamHandle;
pub use router::{dispatch_table, EventRouter};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
