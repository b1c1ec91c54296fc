//! WebSocket connection manager.
//!
//! Handles connection lifecycle and automatic reconnection with exponential
//! backoff. Text frames are forwarded unparsed, in arrival order, to one
//! mpsc channel; the router decodes them.

use crate::error::{StreamError, StreamResult};
use botdeck_telemetry::Metrics;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket URL, including the `api_key` query parameter when set.
    #[serde(default)]
    pub url: String,
    /// Maximum consecutive reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Upper bound of the random jitter added to each backoff delay.
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
    /// Keepalive ping interval (0 disables).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Capacity of the channel between connection and router.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_max_ms() -> u64 {
    1000
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// What the connection hands to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// A connection was established. `reconnected` is false only for the
    /// first successful connect.
    Connected { reconnected: bool },
    /// Raw text frame.
    Text(String),
}

/// WebSocket connection manager.
pub struct StreamConnection {
    config: StreamConfig,
    state: Arc<RwLock<ConnectionState>>,
    signal_tx: mpsc::Sender<StreamSignal>,
    /// Successful connects so far.
    connect_count: AtomicU32,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl StreamConnection {
    pub fn new(
        config: StreamConfig,
        signal_tx: mpsc::Sender<StreamSignal>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            signal_tx,
            connect_count: AtomicU32::new(0),
            shutdown_token,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Shared view of the connection state.
    pub fn state_handle(&self) -> Arc<RwLock<ConnectionState>> {
        Arc::clone(&self.state)
    }

    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Connect and keep the connection alive until shutdown.
    pub async fn run(&self) -> StreamResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            let reason = match self.try_connect(&mut attempt).await {
                Ok(()) => {
                    info!("Stream connection closed");
                    "closed"
                }
                Err(StreamError::ChannelClosed) => {
                    info!("Event receiver dropped, stopping stream");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Stream connection error");
                    "error"
                }
            };
            Metrics::stream_disconnected();

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            attempt += 1;
            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                self.set_state(ConnectionState::Disconnected);
                return Err(StreamError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            self.set_state(ConnectionState::Reconnecting);
            Metrics::stream_reconnect(reason);

            let delay = self.backoff_delay(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self, attempt: &mut u32) -> StreamResult<()> {
        info!(url = %redact_query(&self.config.url), "Connecting to push stream");

        let (ws_stream, _response) = tokio::select! {
            result = connect_async_tls_with_config(&self.config.url, None, true, None) => result?,
            () = self.shutdown_token.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        let reconnected = self.connect_count.fetch_add(1, Ordering::SeqCst) > 0;
        *attempt = 0;
        self.set_state(ConnectionState::Connected);
        Metrics::stream_connected();
        info!(reconnected, "Push stream connected");

        self.signal_tx
            .send(StreamSignal::Connected { reconnected })
            .await
            .map_err(|_| StreamError::ChannelClosed)?;

        let ping_every = Duration::from_millis(self.config.ping_interval_ms.max(1));
        let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }

                _ = ping.tick(), if self.config.ping_interval_ms > 0 => {
                    write.send(Message::Ping(Vec::new())).await?;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.signal_tx
                                .send(StreamSignal::Text(text))
                                .await
                                .map_err(|_| StreamError::ChannelClosed)?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Push stream closed by server");
                            return Err(StreamError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(error = %e, "Push stream read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Push stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// base * 2^(attempt-1), capped, plus jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms;
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = base.saturating_mul(1u64 << exponent).min(max);
        Duration::from_millis(delay + rand_jitter(self.config.jitter_max_ms))
    }
}

/// Random jitter in `0..max_ms`.
fn rand_jitter(max_ms: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    if max_ms == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos) % max_ms
}

/// Strip the query string so credentials never reach the logs.
fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
