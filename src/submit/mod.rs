//! Submission pipeline.
//!
//! ```text
//! submit(session, kind)
//!   -> reject if a submission of `kind` is already in flight
//!   -> full-document check (blocking errors abort here)
//!   -> health probe (unreachable aborts here)
//!   -> generator call, raced against cancellation and the optional timeout
//!   -> normalize output into structured content or an `unparsed` wrapper
//! ```
//!
//! Nothing before the generator call contacts the generation collaborator,
//! and no step mutates the session's record.
use crate::form::Session;
use crate::generate::{GenerationRequest, Generator, HealthProbe, SubmissionKind, TokenUsage};
use crate::generation_log::{GenerationLog, GenerationLogBuilder, GenerationLogEntry};
use crate::validate::{check_document, ReportNote, ValidationReport};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

mod normalize;

use normalize::{normalize, Normalized};
pub use normalize::UNPARSED_KEY;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("document has {} blocking validation error(s)", .0.errors.len())]
    Invalid(ValidationReport),

    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("a {0} submission is already in progress")]
    InFlight(SubmissionKind),

    #[error("submission cancelled")]
    Cancelled,

    #[error("generation timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),
}

/// Successful submission, ready for display or export.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub kind: SubmissionKind,
    pub project: String,
    /// Structured content, or `{"unparsed": <raw text>}`.
    pub content: Value,
    pub structured: bool,
    pub warnings: Vec<ReportNote>,
    pub suggestions: Vec<ReportNote>,
    pub generator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub duration_ms: u64,
}

type InFlight = Arc<Mutex<BTreeSet<SubmissionKind>>>;

/// Marks one kind as in flight until dropped.
struct InFlightGuard {
    registry: InFlight,
    kind: SubmissionKind,
}

impl InFlightGuard {
    fn acquire(registry: &InFlight, kind: SubmissionKind) -> Option<Self> {
        let mut active = registry.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(kind) {
            return None;
        }
        Some(Self {
            registry: registry.clone(),
            kind,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut active = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        active.remove(&self.kind);
    }
}

pub struct Submitter {
    generator: Arc<dyn Generator>,
    probe: Arc<dyn HealthProbe>,
    in_flight: InFlight,
    timeout: Option<Duration>,
    log: Option<GenerationLog>,
}

impl Submitter {
    pub fn new(generator: Arc<dyn Generator>, probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            generator,
            probe,
            in_flight: Arc::new(Mutex::new(BTreeSet::new())),
            timeout: None,
            log: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_log(mut self, log: GenerationLog) -> Self {
        self.log = Some(log);
        self
    }

    pub async fn submit(
        &self,
        session: &Session,
        kind: SubmissionKind,
        cancel: &CancellationToken,
    ) -> Result<Submission, SubmitError> {
        if cancel.is_cancelled() {
            return Err(SubmitError::Cancelled);
        }
        let _guard =
            InFlightGuard::acquire(&self.in_flight, kind).ok_or(SubmitError::InFlight(kind))?;

        let report = check_document(session.form.spec(), session.record());
        if !report.is_clean() {
            tracing::info!(
                kind = %kind,
                project = %session.project_id,
                errors = report.errors.len(),
                "submission blocked by validation"
            );
            return Err(SubmitError::Invalid(report));
        }

        let probe_start = Instant::now();
        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SubmitError::Cancelled),
            probe = self.probe.probe() => probe,
        };
        tracing::debug!(
            elapsed_ms = probe_start.elapsed().as_millis() as u64,
            healthy = probe.is_ok(),
            "health probe complete"
        );
        if let Err(err) = probe {
            return Err(SubmitError::Unavailable(format!("{err:#}")));
        }

        let request = GenerationRequest {
            kind,
            payload: session.record().clone(),
        };
        let builder =
            GenerationLogBuilder::new(kind, &session.project_id, self.generator.name());
        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SubmitError::Cancelled),
            result = self.generate(&request) => result,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let entry = match &err {
                    SubmitError::Cancelled => builder.cancelled(),
                    SubmitError::TimedOut(_) => builder.timed_out(),
                    other => builder.failed(other.to_string()),
                };
                self.record(&entry);
                tracing::warn!(kind = %kind, duration_ms, error = %err, "generation did not complete");
                return Err(err);
            }
        };

        let Normalized {
            content,
            structured,
        } = normalize(output.raw);
        self.record(&builder.completed(structured, output.model.clone(), output.usage));
        tracing::info!(
            kind = %kind,
            project = %session.project_id,
            structured,
            duration_ms,
            "submission complete"
        );

        Ok(Submission {
            kind,
            project: session.project_id.clone(),
            content,
            structured,
            warnings: report.warnings,
            suggestions: report.suggestions,
            generator: self.generator.name(),
            model: output.model,
            usage: output.usage,
            duration_ms,
        })
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<crate::generate::GenerationOutput, SubmitError> {
        let call = self.generator.generate(request);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SubmitError::TimedOut(limit))?
                .map_err(SubmitError::Generation),
            None => call.await.map_err(SubmitError::Generation),
        }
    }

    fn record(&self, entry: &GenerationLogEntry) {
        let Some(log) = &self.log else {
            return;
        };
        if let Err(err) = log.append(entry) {
            tracing::warn!(error = %format!("{err:#}"), "failed to append generation log");
        }
    }
}

#[cfg(test)]
mod tests;
