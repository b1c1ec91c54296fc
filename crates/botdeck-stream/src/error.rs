//! Stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Event router failed: {0}")]
    RouterFailed(String),

    #[error("Event channel closed")]
    ChannelClosed,

    #[error("No async runtime: {0}")]
    NoRuntime(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;
