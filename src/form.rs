//! In-progress form state and the session that owns it.
//!
//! `FormState` is the only place a `DataRecord` is mutated. Validation is
//! delegated to [`crate::validate`]; this module only decides what to do with
//! the result (record inline errors, move between phases, track progress).
use crate::questionnaire::{PhaseSpec, QuestionnaireSpec};
use crate::record::{DataRecord, FieldValue};
use crate::validate::{check_phase, PhaseErrors};
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Outcome of [`FormState::advance_phase`].
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The phase passed; `to` equals `from` when already on the last phase.
    Moved { from: usize, to: usize },
    /// The phase failed its check; errors are also stored on the form.
    Blocked(PhaseErrors),
}

#[derive(Debug, Clone)]
pub struct FormState {
    spec: Arc<QuestionnaireSpec>,
    record: DataRecord,
    errors: BTreeMap<String, String>,
    current: usize,
    completed: BTreeSet<usize>,
}

impl FormState {
    /// Start a blank form seeded with the questionnaire defaults.
    ///
    /// The questionnaire must pass [`QuestionnaireSpec::validate`], which
    /// guarantees at least one phase.
    pub fn new(spec: Arc<QuestionnaireSpec>) -> Result<Self> {
        Self::resume(spec, DataRecord::default())
    }

    /// Resume from an existing record (e.g. a loaded draft).
    ///
    /// Defaults fill only fields the record leaves unset.
    pub fn resume(spec: Arc<QuestionnaireSpec>, saved: DataRecord) -> Result<Self> {
        spec.validate().context("form needs a valid questionnaire")?;
        let mut record = spec.defaults();
        for (id, value) in saved.iter() {
            record.set(id.clone(), value.clone());
        }
        Ok(Self {
            spec,
            record,
            errors: BTreeMap::new(),
            current: 0,
            completed: BTreeSet::new(),
        })
    }

    pub fn spec(&self) -> &QuestionnaireSpec {
        &self.spec
    }

    pub fn record(&self) -> &DataRecord {
        &self.record
    }

    pub fn error(&self, id: &str) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Construction guarantees a phase at the current index.
    pub fn current_phase(&self) -> &PhaseSpec {
        &self.spec.phases()[self.current]
    }

    pub fn completed_phases(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    pub fn is_last_phase(&self) -> bool {
        self.current + 1 >= self.spec.phases().len()
    }

    /// Store a value and optimistically clear its inline error.
    pub fn set_field(&mut self, id: &str, value: impl Into<FieldValue>) {
        self.record.set(id, value);
        self.errors.remove(id);
    }

    /// Check the current phase and move forward when it passes.
    pub fn advance_phase(&mut self) -> Advance {
        let errors = check_phase(self.current_phase(), &self.record);
        if !errors.is_empty() {
            tracing::debug!(
                phase = %self.current_phase().id,
                errors = errors.len(),
                "phase blocked"
            );
            self.errors.extend(errors.clone());
            return Advance::Blocked(errors);
        }
        let from = self.current;
        self.completed.insert(from);
        if !self.is_last_phase() {
            self.current += 1;
        }
        Advance::Moved {
            from,
            to: self.current,
        }
    }

    /// Revisit any phase. Completed phases stay completed.
    pub fn go_to_phase(&mut self, index: usize) -> Result<()> {
        if index >= self.spec.phases().len() {
            return Err(anyhow!(
                "phase {} out of range (questionnaire has {} phases)",
                index + 1,
                self.spec.phases().len()
            ));
        }
        self.current = index;
        Ok(())
    }

    /// Step back one phase; stays put on the first phase.
    pub fn previous_phase(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// `(completed, total)` for progress display.
    pub fn progress(&self) -> (usize, usize) {
        (self.completed.len(), self.spec.phases().len())
    }
}

/// One user's document edit: project key plus its form.
#[derive(Debug, Clone)]
pub struct Session {
    pub project_id: String,
    pub form: FormState,
}

impl Session {
    pub fn new(project_id: impl Into<String>, spec: Arc<QuestionnaireSpec>) -> Result<Self> {
        Ok(Self {
            project_id: project_id.into(),
            form: FormState::new(spec)?,
        })
    }

    pub fn resume(
        project_id: impl Into<String>,
        spec: Arc<QuestionnaireSpec>,
        record: DataRecord,
    ) -> Result<Self> {
        Ok(Self {
            project_id: project_id.into(),
            form: FormState::resume(spec, record)?,
        })
    }

    pub fn record(&self) -> &DataRecord {
        self.form.record()
    }
}

#[cfg(test)]
#[path = "form_tests.rs"]
mod tests;
