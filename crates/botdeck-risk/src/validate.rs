//! Risk-limit validation rules.

use crate::error::{RiskError, RiskResult};
use botdeck_core::{RiskField, RiskLimits};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Per-field validation errors. Empty means the configuration may be saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<RiskField, String>);

impl FieldErrors {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: RiskField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: RiskField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RiskField, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }

    /// Keep only the first error reported for a field.
    fn insert(&mut self, field: RiskField, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    /// `Ok(())` when valid, otherwise the errors as a `RiskError`.
    pub fn into_result(self) -> RiskResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RiskError::Invalid(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

fn is_integer(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0
}

fn check_probability(errors: &mut FieldErrors, field: RiskField, v: f64) -> bool {
    if !v.is_finite() {
        errors.insert(field, "must be a number");
        false
    } else if !(0.0..=1.0).contains(&v) {
        errors.insert(field, "must be between 0 and 1");
        false
    } else {
        true
    }
}

/// Validate a candidate risk-limit configuration.
///
/// Range errors take precedence over cross-field ordering errors on the
/// same field.
pub fn validate(limits: &RiskLimits) -> FieldErrors {
    let mut errors = FieldErrors::default();

    let v = limits.max_position_size;
    if !v.is_finite() {
        errors.insert(RiskField::MaxPositionSize, "must be a number");
    } else if v <= 0.0 {
        errors.insert(RiskField::MaxPositionSize, "must be greater than 0");
    }

    let v = limits.max_total_exposure;
    if !v.is_finite() {
        errors.insert(RiskField::MaxTotalExposure, "must be a number");
    } else if v < 0.0 {
        errors.insert(RiskField::MaxTotalExposure, "must be 0 or greater");
    }

    let v = limits.max_positions;
    if !v.is_finite() {
        errors.insert(RiskField::MaxPositions, "must be a number");
    } else if !is_integer(v) {
        errors.insert(RiskField::MaxPositions, "must be a whole number");
    } else if v < 1.0 {
        errors.insert(RiskField::MaxPositions, "must be at least 1");
    }

    let v = limits.min_balance_reserve;
    if !v.is_finite() {
        errors.insert(RiskField::MinBalanceReserve, "must be a number");
    } else if v < 0.0 {
        errors.insert(RiskField::MinBalanceReserve, "must be 0 or greater");
    }

    let threshold_ok =
        check_probability(&mut errors, RiskField::PriceThreshold, limits.price_threshold);

    if check_probability(&mut errors, RiskField::StopLoss, limits.stop_loss)
        && threshold_ok
        && limits.stop_loss >= limits.price_threshold
    {
        errors.insert(RiskField::StopLoss, "must be below the price threshold");
    }

    if check_probability(&mut errors, RiskField::ProfitTarget, limits.profit_target)
        && threshold_ok
        && limits.profit_target <= limits.price_threshold
    {
        errors.insert(RiskField::ProfitTarget, "must be above the price threshold");
    }

    let v = limits.min_hold_days;
    if !v.is_finite() {
        errors.insert(RiskField::MinHoldDays, "must be a number");
    } else if !is_integer(v) {
        errors.insert(RiskField::MinHoldDays, "must be a whole number");
    } else if v < 0.0 {
        errors.insert(RiskField::MinHoldDays, "must be 0 or greater");
    }

    if !errors.is_valid() {
        debug!(errors = %errors, "Risk limits failed validation");
    }
    errors
}
