//! Push-channel events.
//!
//! Every event on the push channel is a JSON object `{ "type": ..., ...payload }`.
//! The payload stays opaque: the console only needs the type to decide which
//! views went stale.

use crate::error::{CoreError, Result};
use serde_json::Value;
use std::fmt;

/// Event type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Price,
    Signal,
    Order,
    Fill,
    Position,
    BotState,
    Alert,
    Metrics,
    /// Any tag this console does not know.
    Other(String),
}

impl EventKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "price" => Self::Price,
            "signal" => Self::Signal,
            "order" => Self::Order,
            "fill" => Self::Fill,
            "position" => Self::Position,
            "bot_state" => Self::BotState,
            "alert" => Self::Alert,
            "metrics" => Self::Metrics,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Price => "price",
            Self::Signal => "signal",
            Self::Order => "order",
            Self::Fill => "fill",
            Self::Position => "position",
            Self::BotState => "bot_state",
            Self::Alert => "alert",
            Self::Metrics => "metrics",
            Self::Other(tag) => tag,
        }
    }

    /// Metric label; unknown tags collapse to "unknown" to bound cardinality.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Signal => "signal",
            Self::Order => "order",
            Self::Fill => "fill",
            Self::Position => "position",
            Self::BotState => "bot_state",
            Self::Alert => "alert",
            Self::Metrics => "metrics",
            Self::Other(_) => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub kind: EventKind,
    /// Full event object, including the `type` field.
    pub payload: Value,
}

impl PushEvent {
    /// Decode one line of the push channel.
    ///
    /// Fails for non-JSON input, non-object JSON, and objects without a
    /// string `type`. Unrecognized types decode successfully as
    /// `EventKind::Other`.
    pub fn decode(line: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(line.trim())
            .map_err(|e| CoreError::MalformedEvent(format!("invalid JSON: {e}")))?;

        let kind = match payload.get("type") {
            Some(Value::String(tag)) => EventKind::from_tag(tag),
            Some(_) => {
                return Err(CoreError::MalformedEvent(
                    "type is not a string".to_string(),
                ))
            }
            None if payload.is_object() => {
                return Err(CoreError::MalformedEvent("missing type".to_string()))
            }
            None => return Err(CoreError::MalformedEvent("not an object".to_string())),
        };

        Ok(Self { kind, payload })
    }
}
