//! Touched-field display gate.

use crate::validate::FieldErrors;
use botdeck_core::RiskField;
use std::collections::BTreeSet;

/// Fields the operator has interacted with in the risk editor.
///
/// An error is shown only for touched fields, so a half-filled form does
/// not flash errors on fields the operator has not reached yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedFields(BTreeSet<RiskField>);

impl TouchedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, field: RiskField) {
        self.0.insert(field);
    }

    /// Mark every field touched (save attempted).
    pub fn touch_all(&mut self) {
        self.0.extend(RiskField::ALL);
    }

    pub fn is_touched(&self, field: RiskField) -> bool {
        self.0.contains(&field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Errors to display given the current touch state.
    pub fn visible_errors<'a>(&self, errors: &'a FieldErrors) -> Vec<(RiskField, &'a str)> {
        errors.iter().filter(|(f, _)| self.is_touched(*f)).collect()
    }
}
