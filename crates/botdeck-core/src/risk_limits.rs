//! Risk-limit configuration.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk limits as displayed and edited by the operator.
///
/// All fields are plain numbers because the editor works on raw operator
/// input; validation (finiteness, ranges, cross-field ordering) lives in
/// `botdeck-risk`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLimits {
    /// Maximum size of a single position (USD).
    pub max_position_size: f64,
    /// Maximum total exposure across positions (USD).
    pub max_total_exposure: f64,
    /// Maximum number of concurrent positions.
    pub max_positions: f64,
    /// Balance that must stay untouched (USD).
    pub min_balance_reserve: f64,
    /// Entry price threshold (probability, 0..1).
    pub price_threshold: f64,
    /// Stop-loss price (probability, 0..1).
    pub stop_loss: f64,
    /// Profit-target price (probability, 0..1).
    pub profit_target: f64,
    /// Minimum holding period in days.
    pub min_hold_days: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: 100.0,
            max_total_exposure: 1000.0,
            max_positions: 10.0,
            min_balance_reserve: 50.0,
            price_threshold: 0.5,
            stop_loss: 0.3,
            profit_target: 0.9,
            min_hold_days: 0.0,
        }
    }
}

impl RiskLimits {
    pub fn get(&self, field: RiskField) -> f64 {
        match field {
            RiskField::MaxPositionSize => self.max_position_size,
            RiskField::MaxTotalExposure => self.max_total_exposure,
            RiskField::MaxPositions => self.max_positions,
            RiskField::MinBalanceReserve => self.min_balance_reserve,
            RiskField::PriceThreshold => self.price_threshold,
            RiskField::StopLoss => self.stop_loss,
            RiskField::ProfitTarget => self.profit_target,
            RiskField::MinHoldDays => self.min_hold_days,
        }
    }

    pub fn set(&mut self, field: RiskField, value: f64) {
        match field {
            RiskField::MaxPositionSize => self.max_position_size = value,
            RiskField::MaxTotalExposure => self.max_total_exposure = value,
            RiskField::MaxPositions => self.max_positions = value,
            RiskField::MinBalanceReserve => self.min_balance_reserve = value,
            RiskField::PriceThreshold => self.price_threshold = value,
            RiskField::StopLoss => self.stop_loss = value,
            RiskField::ProfitTarget => self.profit_target = value,
            RiskField::MinHoldDays => self.min_hold_days = value,
        }
    }

    /// Candidate configuration after applying a partial update.
    #[must_use]
    pub fn apply(&self, patch: &RiskLimitsPatch) -> Self {
        let mut next = *self;
        for (field, value) in patch.entries() {
            next.set(field, value);
        }
        next
    }
}

/// Partial risk-limit update, serialized in the API's snake_case shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskLimitsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_position_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_total_exposure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_positions: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_balance_reserve: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_hold_days: Option<f64>,
}

impl RiskLimitsPatch {
    pub fn set(&mut self, field: RiskField, value: f64) {
        let slot = match field {
            RiskField::MaxPositionSize => &mut self.max_position_size,
            RiskField::MaxTotalExposure => &mut self.max_total_exposure,
            RiskField::MaxPositions => &mut self.max_positions,
            RiskField::MinBalanceReserve => &mut self.min_balance_reserve,
            RiskField::PriceThreshold => &mut self.price_threshold,
            RiskField::StopLoss => &mut self.stop_loss,
            RiskField::ProfitTarget => &mut self.profit_target,
            RiskField::MinHoldDays => &mut self.min_hold_days,
        };
        *slot = Some(value);
    }

    #[must_use]
    pub fn with(mut self, field: RiskField, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Fields present in this patch, in canonical order.
    pub fn entries(&self) -> Vec<(RiskField, f64)> {
        let slots = [
            (RiskField::MaxPositionSize, self.max_position_size),
            (RiskField::MaxTotalExposure, self.max_total_exposure),
            (RiskField::MaxPositions, self.max_positions),
            (RiskField::MinBalanceReserve, self.min_balance_reserve),
            (RiskField::PriceThreshold, self.price_threshold),
            (RiskField::StopLoss, self.stop_loss),
            (RiskField::ProfitTarget, self.profit_target),
            (RiskField::MinHoldDays, self.min_hold_days),
        ];
        slots
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Name of one risk-limit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RiskField {
    MaxPositionSize,
    MaxTotalExposure,
    MaxPositions,
    MinBalanceReserve,
    PriceThreshold,
    StopLoss,
    ProfitTarget,
    MinHoldDays,
}

impl RiskField {
    pub const ALL: [RiskField; 8] = [
        RiskField::MaxPositionSize,
        RiskField::MaxTotalExposure,
        RiskField::MaxPositions,
        RiskField::MinBalanceReserve,
        RiskField::PriceThreshold,
        RiskField::StopLoss,
        RiskField::ProfitTarget,
        RiskField::MinHoldDays,
    ];

    /// camelCase name used by the console.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxPositionSize => "maxPositionSize",
            Self::MaxTotalExposure => "maxTotalExposure",
            Self::MaxPositions => "maxPositions",
            Self::MinBalanceReserve => "minBalanceReserve",
            Self::PriceThreshold => "priceThreshold",
            Self::StopLoss => "stopLoss",
            Self::ProfitTarget => "profitTarget",
            Self::MinHoldDays => "minHoldDays",
        }
    }

    /// snake_case name used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::MaxPositionSize => "max_position_size",
            Self::MaxTotalExposure => "max_total_exposure",
            Self::MaxPositions => "max_positions",
            Self::MinBalanceReserve => "min_balance_reserve",
            Self::PriceThreshold => "price_threshold",
            Self::StopLoss => "stop_loss",
            Self::ProfitTarget => "profit_target",
            Self::MinHoldDays => "min_hold_days",
        }
    }
}

impl fmt::Display for RiskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskField {
    type Err = CoreError;

    /// Accepts either the camelCase or the snake_case name.
    fn from_str(s: &str) -> Result<Self> {
        RiskField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s || f.wire_name() == s)
            .ok_or_else(|| CoreError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_patch() {
        let base = RiskLimits::default();
        let patch = RiskLimitsPatch::default()
            .with(RiskField::StopLoss, 0.2)
            .with(RiskField::MaxPositions, 4.0);
        let next = base.apply(&patch);
        assert_eq!(next.stop_loss, 0.2);
        assert_eq!(next.max_positions, 4.0);
        assert_eq!(next.profit_target, base.profit_target);
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = RiskLimitsPatch::default().with(RiskField::PriceThreshold, 0.55);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"price_threshold": 0.55}));
        assert!(!patch.is_empty());
        assert!(RiskLimitsPatch::default().is_empty());
    }

    #[test]
    fn test_limits_deserialize_camel_case() {
        let json = serde_json::json!({
            "maxPositionSize": 50.0,
            "maxTotalExposure": 500.0,
            "maxPositions": 5,
            "minBalanceReserve": 10.0,
            "priceThreshold": 0.4,
            "stopLoss": 0.2,
            "profitTarget": 0.8,
            "minHoldDays": 1
        });
        let limits: RiskLimits = serde_json::from_value(json).unwrap();
        assert_eq!(limits.max_positions, 5.0);
        assert_eq!(limits.get(RiskField::StopLoss), 0.2);
    }

    #[test]
    fn test_field_names() {
        assert_eq!("stopLoss".parse::<RiskField>().unwrap(), RiskField::StopLoss);
        assert_eq!("stop_loss".parse::<RiskField>().unwrap(), RiskField::StopLoss);
        assert!("stop-loss".parse::<RiskField>().is_err());
    }
}
