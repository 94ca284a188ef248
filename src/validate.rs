//! Questionnaire validation.
//!
//! Two pure checks over `(QuestionnaireSpec, DataRecord)`:
//!
//! - [`check_phase`] gates advancing past one phase and yields at most one
//!   message per field.
//! - [`check_document`] gates final submission and classifies findings into
//!   blocking errors, warnings, and suggestions.
//!
//! Neither check mutates the record, and both are order-stable so repeated
//! runs over the same record produce identical output.
use crate::questionnaire::{FieldKind, FieldSpec, PhaseSpec, QuestionnaireSpec};
use crate::record::{format_number, DataRecord, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field id -> first triggered message. Empty means the phase passes.
pub type PhaseErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    pub phase: String,
    pub field: String,
    pub message: String,
}

/// Non-blocking finding (warning or suggestion) attributed to a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportNote {
    pub phase: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ReportError>,
    pub warnings: Vec<ReportNote>,
    pub suggestions: Vec<ReportNote>,
}

impl ValidationReport {
    /// True when nothing blocks submission.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_findings(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty() || !self.suggestions.is_empty()
    }
}

pub const REQUIRED_MESSAGE: &str = "Required";
pub const MISSING_MESSAGE: &str = "Required field missing";

/// Per-field check for one phase.
pub fn check_phase(phase: &PhaseSpec, record: &DataRecord) -> PhaseErrors {
    let mut errors = PhaseErrors::new();
    for field in phase.fields() {
        if let Some(message) = field_error(field, record) {
            errors.insert(field.id.clone(), message);
        }
    }
    errors
}

fn field_error(field: &FieldSpec, record: &DataRecord) -> Option<String> {
    if field.is_required_for(record) && !record.is_filled(&field.id) {
        return Some(REQUIRED_MESSAGE.to_string());
    }
    if let Some((_, min)) = entry_shortfall(field, record) {
        return Some(format!("At least {min} entries required"));
    }
    if field.kind != FieldKind::Number {
        return None;
    }
    let value = record.number(&field.id)?;
    if let Some(min) = field.min {
        if value < min {
            return Some(format!("Min: {}", format_number(min)));
        }
    }
    if let Some(max) = field.max {
        if value > max {
            return Some(format!("Max: {}", format_number(max)));
        }
    }
    None
}

/// `(found, minimum)` when a required field has too few entries.
fn entry_shortfall(field: &FieldSpec, record: &DataRecord) -> Option<(usize, usize)> {
    let min = field.min_entries?;
    if !field.is_required_for(record) {
        return None;
    }
    let found = record.get(&field.id).map_or(0, FieldValue::entry_count);
    (found < min).then_some((found, min))
}

/// Whole-document check run before submission.
pub fn check_document(spec: &QuestionnaireSpec, record: &DataRecord) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (phase, field) in spec.fields() {
        if field.is_required_for(record) && !record.is_filled(&field.id) {
            report.errors.push(ReportError {
                phase: phase.name.clone(),
                field: field.label.clone(),
                message: MISSING_MESSAGE.to_string(),
            });
        } else if let Some((found, min)) = entry_shortfall(field, record) {
            report.errors.push(ReportError {
                phase: phase.name.clone(),
                field: field.label.clone(),
                message: format!("At least {min} entries required, found {found}"),
            });
        }
    }

    if let Some(note) = growth_warning(spec, record) {
        report.warnings.push(note);
    }
    if let Some(note) = highlights_suggestion(spec, record) {
        report.suggestions.push(note);
    }

    report
}

/// Growth percentage from `current` to `projected`, when computable.
///
/// Returns `None` for a zero or negative base.
pub fn growth_pct(current: f64, projected: f64) -> Option<f64> {
    if current <= 0.0 {
        return None;
    }
    Some((projected - current) / current * 100.0)
}

fn growth_warning(spec: &QuestionnaireSpec, record: &DataRecord) -> Option<ReportNote> {
    let rule = spec.rules().growth.as_ref()?;
    let (phase, current_field) = spec.field(&rule.current)?;
    let (_, projected_field) = spec.field(&rule.projected)?;
    let current = record.number(&rule.current)?;
    let projected = record.number(&rule.projected)?;
    if projected <= current {
        return None;
    }
    let growth = growth_pct(current, projected)?;
    if growth <= rule.max_growth_pct {
        return None;
    }
    Some(ReportNote {
        phase: phase.name.clone(),
        message: format!(
            "{} implies {}% growth over {}; please verify this projection manually",
            projected_field.label,
            growth.round() as i64,
            current_field.label
        ),
    })
}

fn highlights_suggestion(spec: &QuestionnaireSpec, record: &DataRecord) -> Option<ReportNote> {
    let rule = spec.rules().highlights.as_ref()?;
    let (phase, field) = spec.field(&rule.field)?;
    let count = match record.get(&rule.field) {
        Some(value @ (FieldValue::Text(_) | FieldValue::List(_))) => value.entry_count(),
        _ => 0,
    };
    if count >= rule.min_lines {
        return None;
    }
    Some(ReportNote {
        phase: phase.name.clone(),
        message: format!(
            "{} has {} point(s); {}-{} are recommended",
            field.label, count, rule.min_lines, rule.max_lines
        ),
    })
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
