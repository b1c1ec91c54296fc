//! Read models for the resources the console renders itself.
//!
//! Shapes follow the normalized (camelCase) API payloads. Fields the server
//! may report as `null` are `Option`s so "unknown" never collapses into zero.

use crate::mode::BotMode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order/position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "BUY")]
    Buy,
    #[serde(alias = "SELL")]
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// `bot-status` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub mode: BotMode,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub paused_reason: Option<String>,
    #[serde(default)]
    pub uptime_seconds: Option<u64>,
    #[serde(default)]
    pub kill_switch_active: Option<bool>,
}

/// One open position from the `positions` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub condition_id: String,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub market_question: Option<String>,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pnl: Option<Decimal>,
}

impl Position {
    /// Dollar exposure at the current price, falling back to entry price
    /// when the current price is unknown.
    pub fn exposure(&self) -> Decimal {
        let price = self.current_price.unwrap_or(self.entry_price);
        (self.size * price).abs()
    }
}

/// Sum of position exposures.
pub fn total_exposure(positions: &[Position]) -> Decimal {
    positions.iter().map(Position::exposure).sum()
}

/// One order from the `orders` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub condition_id: String,
    #[serde(default)]
    pub token_id: Option<String>,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    #[serde(default)]
    pub filled_size: Option<Decimal>,
    pub status: String,
}

impl Order {
    pub fn is_open(&self) -> bool {
        matches!(self.status.as_str(), "open" | "pending" | "partially_filled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn position(size: Decimal, entry: Decimal, current: Option<Decimal>) -> Position {
        Position {
            id: "p1".to_string(),
            condition_id: "0xabc".to_string(),
            token_id: None,
            market_question: None,
            side: Side::Buy,
            size,
            entry_price: entry,
            current_price: current,
            unrealized_pnl: None,
        }
    }

    #[test]
    fn test_exposure_uses_current_price() {
        let p = position(dec!(100), dec!(0.40), Some(dec!(0.55)));
        assert_eq!(p.exposure(), dec!(55.00));
    }

    #[test]
    fn test_exposure_falls_back_to_entry() {
        let p = position(dec!(100), dec!(0.40), None);
        assert_eq!(p.exposure(), dec!(40.00));
    }

    #[test]
    fn test_total_exposure() {
        let positions = vec![
            position(dec!(100), dec!(0.40), Some(dec!(0.50))),
            position(dec!(10), dec!(0.90), None),
        ];
        assert_eq!(total_exposure(&positions), dec!(59.00));
        assert_eq!(total_exposure(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_null_stays_unknown() {
        let p: Position = serde_json::from_value(json!({
            "id": "p1",
            "conditionId": "0xabc",
            "side": "BUY",
            "size": 10,
            "entryPrice": "0.5",
            "currentPrice": null,
            "unrealizedPnl": 0
        }))
        .unwrap();
        assert_eq!(p.current_price, None);
        assert_eq!(p.unrealized_pnl, Some(Decimal::ZERO));
        assert_eq!(p.side, Side::Buy);
    }

    #[test]
    fn test_bot_status() {
        let s: BotStatus = serde_json::from_value(json!({
            "mode": "dry_run",
            "running": true,
            "pausedReason": null
        }))
        .unwrap();
        assert_eq!(s.mode, BotMode::DryRun);
        assert!(s.running);
        assert!(s.paused_reason.is_none());
    }

    #[test]
    fn test_order_is_open() {
        let o: Order = serde_json::from_value(json!({
            "id": "o1",
            "conditionId": "0xabc",
            "side": "sell",
            "price": 0.6,
            "size": 5,
            "status": "open"
        }))
        .unwrap();
        assert!(o.is_open());
    }
}
