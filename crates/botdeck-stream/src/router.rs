//! Event router: push events to cache invalidations.

use crate::connection::StreamSignal;
use botdeck_cache::InvalidationSink;
use botdeck_core::{CacheKey, EventKind, PushEvent, Resource};
use botdeck_telemetry::Metrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const PRICE: &[Resource] = &[
    Resource::Activity,
    Resource::MarketDetail,
    Resource::MarketHistory,
];
const ORDER: &[Resource] = &[Resource::Orders, Resource::Metrics, Resource::Activity];
const POSITION: &[Resource] = &[
    Resource::Positions,
    Resource::Performance,
    Resource::Metrics,
    Resource::Risk,
    Resource::Activity,
];
const BOT_STATE: &[Resource] = &[Resource::BotStatus, Resource::Activity];
const DEFAULT: &[Resource] = &[Resource::Activity];

/// Resource families invalidated by one event type.
///
/// Market-scoped families are invalidated as a whole; every cached market
/// key of that family is marked stale.
pub fn dispatch_table(kind: &EventKind) -> &'static [Resource] {
    match kind {
        EventKind::Price | EventKind::Signal => PRICE,
        EventKind::Order | EventKind::Fill => ORDER,
        EventKind::Position => POSITION,
        EventKind::BotState => BOT_STATE,
        EventKind::Alert | EventKind::Metrics | EventKind::Other(_) => DEFAULT,
    }
}

/// Applies the dispatch table to incoming events.
///
/// Events are handled one at a time in arrival order. Once closed, the
/// router never touches the sink again.
pub struct EventRouter {
    sink: Arc<dyn InvalidationSink>,
    closed: Arc<AtomicBool>,
}

impl EventRouter {
    pub fn new(sink: Arc<dyn InvalidationSink>) -> Self {
        Self {
            sink,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag shared with the owning handle.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Handle one line. Returns the invalidated families.
    ///
    /// Undecodable lines are never an error: they are counted and fall
    /// through to the default row.
    pub fn handle_line(&self, line: &str) -> &'static [Resource] {
        if self.is_closed() {
            return &[];
        }

        let resources = match PushEvent::decode(line) {
            Ok(event) => {
                Metrics::stream_event(event.kind.label());
                trace!(event_type = event.kind.as_str(), "Push event");
                dispatch_table(&event.kind)
            }
            Err(e) => {
                Metrics::stream_dropped();
                debug!(error = %e, "Undecodable push event");
                DEFAULT
            }
        };

        for resource in resources {
            self.sink.invalidate(&CacheKey::family(*resource));
        }
        resources
    }

    /// Handle one text frame; each non-empty line is one event.
    pub fn handle_frame(&self, text: &str) -> usize {
        let mut handled = 0;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if self.is_closed() {
                break;
            }
            self.handle_line(line);
            handled += 1;
        }
        handled
    }

    pub fn handle_signal(&self, signal: &StreamSignal) {
        if self.is_closed() {
            return;
        }
        match signal {
            StreamSignal::Connected { reconnected: false } => {}
            StreamSignal::Connected { reconnected: true } => {
                let count = self.sink.invalidate_all();
                info!(entries = count, "Reconnected, invalidated all cached views");
            }
            StreamSignal::Text(text) => {
                self.handle_frame(text);
            }
        }
    }

    /// Process signals until the channel closes or `token` is cancelled.
    pub async fn run(self, mut rx: mpsc::Receiver<StreamSignal>, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => self.handle_signal(&signal),
                    None => break,
                },
            }
        }
        self.close();
        debug!("Event router stopped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records invalidations instead of touching a cache.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) keys: Mutex<Vec<CacheKey>>,
        pub(crate) all: Mutex<usize>,
    }

    impl RecordingSink {
        pub(crate) fn resources(&self) -> Vec<Resource> {
            self.keys.lock().iter().map(CacheKey::resource).collect()
        }
    }

    impl InvalidationSink for RecordingSink {
        fn invalidate(&self, key: &CacheKey) -> usize {
            self.keys.lock().push(key.clone());
            1
        }

        fn invalidate_all(&self) -> usize {
            *self.all.lock() += 1;
            0
        }
    }

    fn router() -> (EventRouter, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (EventRouter::new(sink.clone()), sink)
    }

    #[test]
    fn test_fill_invalidates_orders_metrics_activity() {
        let (router, sink) = router();
        router.handle_line(r#"{"type":"fill","orderId":"o1","size":5}"#);
        assert_eq!(
            sink.resources(),
            vec![Resource::Orders, Resource::Metrics, Resource::Activity]
        );
    }

    #[test]
    fn test_dispatch_rows() {
        assert_eq!(dispatch_table(&EventKind::Signal), PRICE);
        assert_eq!(dispatch_table(&EventKind::Order), ORDER);
        assert_eq!(dispatch_table(&EventKind::Position), POSITION);
        assert_eq!(dispatch_table(&EventKind::BotState), BOT_STATE);
        assert_eq!(dispatch_table(&EventKind::Alert), DEFAULT);
        assert_eq!(dispatch_table(&EventKind::Metrics), DEFAULT);
        assert_eq!(dispatch_table(&EventKind::Other("x".to_string())), DEFAULT);
    }

    #[test]
    fn test_price_invalidates_market_families() {
        let (router, sink) = router();
        router.handle_line(r#"{"type":"price","conditionId":"0xabc","price":0.4}"#);
        let keys = sink.keys.lock().clone();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&CacheKey::family(Resource::MarketDetail)));
        assert!(keys.iter().all(|k| k.params().is_empty()));
    }

    #[test]
    fn test_malformed_events_never_fail() {
        let (router, sink) = router();
        for line in ["not json", "[1,2,3]", "42", r#"{"payload":1}"#, r#"{"type":7}"#] {
            assert_eq!(router.handle_line(line), DEFAULT);
        }
        router.handle_line(r#"{"type":"mystery"}"#);
        assert_eq!(sink.resources(), vec![Resource::Activity; 6]);
    }

    #[test]
    fn test_frame_split_into_lines() {
        let (router, sink) = router();
        let handled = router.handle_frame(
            "{\"type\":\"bot_state\"}\n\n  \n{\"type\":\"order\"}\r\n",
        );
        assert_eq!(handled, 2);
        assert_eq!(
            sink.resources(),
            vec![
                Resource::BotStatus,
                Resource::Activity,
                Resource::Orders,
                Resource::Metrics,
                Resource::Activity
            ]
        );
    }

    #[test]
    fn test_no_dispatch_after_close() {
        let (router, sink) = router();
        router.close();
        assert!(router.handle_line(r#"{"type":"fill"}"#).is_empty());
        router.handle_signal(&StreamSignal::Connected { reconnected: true });
        assert!(sink.keys.lock().is_empty());
        assert_eq!(*sink.all.lock(), 0);
    }

    #[test]
    fn test_reconnect_invalidates_all() {
        let (router, sink) = router();
        router.handle_signal(&StreamSignal::Connected { reconnected: false });
        assert_eq!(*sink.all.lock(), 0);
        router.handle_signal(&StreamSignal::Connected { reconnected: true });
        assert_eq!(*sink.all.lock(), 1);
    }

    #[tokio::test]
    async fn test_run_preserves_arrival_order() {
        let (router, sink) = router();
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let task = tokio::spawn(router.run(rx, token.clone()));

        tx.send(StreamSignal::Text(r#"{"type":"bot_state"}"#.to_string()))
            .await
            .unwrap();
        tx.send(StreamSignal::Text(r#"{"type":"fill"}"#.to_string()))
            .await
            .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(
            sink.resources(),
            vec![
                Resource::BotStatus,
                Resource::Activity,
                Resource::Orders,
                Resource::Metrics,
                Resource::Activity
            ]
        );
    }
}
