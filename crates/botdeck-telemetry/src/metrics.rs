//! Prometheus metrics for botdeck.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means duplicate metric names,
//! which is a programming error that should crash at first use.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

/// Push stream connection state (1 = connected, 0 = disconnected).
pub static STREAM_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "botdeck_stream_connected",
        "Push stream connection state (1=connected)"
    )
    .unwrap()
});

/// Total push stream reconnection attempts.
pub static STREAM_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "botdeck_stream_reconnect_total",
        "Total push stream reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Push events dispatched, by event type.
pub static STREAM_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "botdeck_stream_events_total",
        "Push events dispatched by type",
        &["event_type"]
    )
    .unwrap()
});

/// Malformed push payloads (routed to the default invalidation).
pub static STREAM_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "botdeck_stream_dropped_total",
        "Malformed push payloads"
    )
    .unwrap()
});

/// Cache invalidations, by resource family.
pub static CACHE_INVALIDATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "botdeck_cache_invalidations_total",
        "Cache invalidations by resource",
        &["resource"]
    )
    .unwrap()
});

/// Cache loads, by resource and outcome (ok/error/retry).
pub static CACHE_LOADS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "botdeck_cache_loads_total",
        "Cache loader invocations by resource and outcome",
        &["resource", "outcome"]
    )
    .unwrap()
});

/// Operator commands, by command and outcome.
pub static COMMANDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "botdeck_commands_total",
        "Operator commands by command and outcome",
        &["command", "outcome"]
    )
    .unwrap()
});

/// Metric recording facade.
pub struct Metrics;

impl Metrics {
    pub fn stream_connected() {
        STREAM_CONNECTED.set(1.0);
    }

    pub fn stream_disconnected() {
        STREAM_CONNECTED.set(0.0);
    }

    pub fn stream_reconnect(reason: &str) {
        STREAM_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn stream_event(event_type: &str) {
        STREAM_EVENTS_TOTAL.with_label_values(&[event_type]).inc();
    }

    pub fn stream_dropped() {
        STREAM_DROPPED_TOTAL.inc();
    }

    pub fn cache_invalidated(resource: &str) {
        CACHE_INVALIDATIONS_TOTAL
            .with_label_values(&[resource])
            .inc();
    }

    pub fn cache_load(resource: &str, outcome: &str) {
        CACHE_LOADS_TOTAL
            .with_label_values(&[resource, outcome])
            .inc();
    }

    pub fn command(command: &str, outcome: &str) {
        COMMANDS_TOTAL.with_label_values(&[command, outcome]).inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
