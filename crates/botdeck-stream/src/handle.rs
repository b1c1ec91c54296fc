//! Owned handle for one running event stream.

use crate::connection::{ConnectionState, StreamConfig, StreamConnection};
use crate::error::{StreamError, StreamResult};
use crate::router::EventRouter;
use botdeck_cache::InvalidationSink;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Running connection plus router.
///
/// Dropping the handle stops both tasks; `close` additionally waits for
/// them. No invalidation happens once `close` has been called or the handle
/// has been dropped.
pub struct EventStreamHandle {
    token: CancellationToken,
    closed: Arc<AtomicBool>,
    state: Arc<RwLock<ConnectionState>>,
    connection_task: Option<JoinHandle<StreamResult<()>>>,
    router_task: Option<JoinHandle<()>>,
}

impl EventStreamHandle {
    /// Open the stream and start routing events into `sink`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn open(config: StreamConfig, sink: Arc<dyn InvalidationSink>) -> StreamResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StreamError::NoRuntime(e.to_string()))?;

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));

        let router = EventRouter::new(sink);
        let closed = router.closed_flag();
        let router_task = runtime.spawn(router.run(rx, token.clone()));

        let connection = StreamConnection::new(config, tx, token.clone());
        let state = connection.state_handle();
        let connection_task = runtime.spawn(async move {
            let result = connection.run().await;
            if let Err(e) = &result {
                warn!(error = %e, "Push stream stopped");
            }
            result
        });

        info!("Event stream opened");
        Ok(Self {
            token,
            closed,
            state,
            connection_task: Some(connection_task),
            router_task: Some(router_task),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop dispatching, close the connection and wait for both tasks.
    ///
    /// Returns `RouterFailed` if the router task died, otherwise the
    /// connection's terminal error, if it stopped on its own with one.
    pub async fn close(&mut self) -> StreamResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.token.cancel();

        let router = match self.router_task.take() {
            Some(task) => task.await.map_err(|e| {
                warn!(error = %e, "Event router task failed");
                StreamError::RouterFailed(e.to_string())
            }),
            None => Ok(()),
        };
        let connection = match self.connection_task.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|e| Err(StreamError::ConnectionFailed(e.to_string()))),
            None => Ok(()),
        };
        info!("Event stream closed");
        router.and(connection)
    }
}

impl Drop for EventStreamHandle {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::tests::RecordingSink;
    use botdeck_core::Resource;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    fn config(addr: std::net::SocketAddr) -> StreamConfig {
        StreamConfig {
            url: format!("ws://{addr}"),
            reconnect_base_delay_ms: 10,
            jitter_max_ms: 0,
            ..Default::default()
        }
    }

    async fn wait_for(sink: &RecordingSink, count: usize) {
        for _ in 0..200 {
            if sink.keys.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} invalidations");
    }

    #[tokio::test]
    async fn test_events_reach_sink_until_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frame_tx, mut frame_rx) = mpsc::channel::<String>(8);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            loop {
                tokio::select! {
                    frame = frame_rx.recv() => match frame {
                        Some(text) => {
                            if ws.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    msg = ws.next() => match msg {
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                        _ => {}
                    },
                }
            }
        });

        let sink = Arc::new(RecordingSink::default());
        let mut handle = EventStreamHandle::open(config(addr), sink.clone()).unwrap();

        frame_tx
            .send(r#"{"type":"fill","orderId":"o-1"}"#.to_string())
            .await
            .unwrap();
        wait_for(&sink, 3).await;
        assert_eq!(
            sink.resources(),
            vec![Resource::Orders, Resource::Metrics, Resource::Activity]
        );
        assert!(handle.is_connected());

        handle.close().await.unwrap();
        assert!(handle.is_closed());
        let _ = frame_tx
            .send(r#"{"type":"position"}"#.to_string())
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.keys.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_drop_stops_dispatch() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = Arc::new(RecordingSink::default());
        let handle = EventStreamHandle::open(config(addr), sink.clone()).unwrap();
        let closed = Arc::clone(&handle.closed);
        drop(handle);
        assert!(closed.load(Ordering::SeqCst));
    }

    struct PanickingSink;

    impl InvalidationSink for PanickingSink {
        fn invalidate(&self, _key: &botdeck_core::CacheKey) -> usize {
            panic!("sink failure");
        }

        fn invalidate_all(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_close_reports_router_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let frame = r#"{"type":"fill","orderId":"o-1"}"#.to_string();
            if ws.send(Message::Text(frame)).await.is_err() {
                return;
            }
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
        });

        let mut handle = EventStreamHandle::open(config(addr), Arc::new(PanickingSink)).unwrap();
        for _ in 0..200 {
            if handle.router_task.as_ref().is_some_and(|t| t.is_finished()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = handle.close().await.unwrap_err();
        assert!(matches!(err, StreamError::RouterFailed(_)), "got {err:?}");
    }

    #[test]
    fn test_open_requires_runtime() {
        let sink = Arc::new(RecordingSink::default());
        let result = EventStreamHandle::open(StreamConfig::new("ws://127.0.0.1:1"), sink);
        assert!(matches!(result, Err(StreamError::NoRuntime(_))));
    }
}
