//! Generation call log and usage accounting.
//!
//! Every submission that reaches the generator appends one line to
//! `generation_log.jsonl`:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1760000000000,"kind":"content","project":"phoenix","generator":"anthropic:claude-sonnet-4-5","duration_ms":4200,"outcome":"structured",...}
//! ```
//!
//! Only the newest [`MAX_LOG_ENTRIES`] lines are kept. [`summarize`] folds
//! the log into per-model and per-kind totals with an estimated USD cost, and
//! [`render_usage_csv`] exports the same figures plus the most recent calls.
use crate::generate::{SubmissionKind, TokenUsage};
use crate::util::{now_epoch_ms, write_text_atomic};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const GENERATION_LOG_SCHEMA_VERSION: u32 = 1;
pub const MAX_LOG_ENTRIES: usize = 1000;
/// Calls listed in the CSV export.
pub const CSV_RECENT_CALLS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    Structured,
    Unparsed,
    Failed,
    Cancelled,
    TimedOut,
}

impl GenerationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Unparsed => "unparsed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Structured | Self::Unparsed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationLogEntry {
    pub schema_version: u32,
    /// Unix timestamp in milliseconds when the call finished.
    pub ts: u64,
    pub kind: SubmissionKind,
    pub project: String,
    pub generator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub duration_ms: u64,
    pub outcome: GenerationOutcome,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Times one generation call and produces its log entry.
pub struct GenerationLogBuilder {
    start: Instant,
    kind: SubmissionKind,
    project: String,
    generator: String,
}

impl GenerationLogBuilder {
    pub fn new(kind: SubmissionKind, project: &str, generator: String) -> Self {
        Self {
            start: Instant::now(),
            kind,
            project: project.to_string(),
            generator,
        }
    }

    pub fn completed(
        self,
        structured: bool,
        model: Option<String>,
        usage: Option<TokenUsage>,
    ) -> GenerationLogEntry {
        let outcome = if structured {
            GenerationOutcome::Structured
        } else {
            GenerationOutcome::Unparsed
        };
        self.build(outcome, model, usage, None)
    }

    pub fn failed(self, error: impl Into<String>) -> GenerationLogEntry {
        self.build(GenerationOutcome::Failed, None, None, Some(error.into()))
    }

    pub fn cancelled(self) -> GenerationLogEntry {
        self.build(GenerationOutcome::Cancelled, None, None, None)
    }

    pub fn timed_out(self) -> GenerationLogEntry {
        self.build(GenerationOutcome::TimedOut, None, None, None)
    }

    fn build(
        self,
        outcome: GenerationOutcome,
        model: Option<String>,
        usage: Option<TokenUsage>,
        error: Option<String>,
    ) -> GenerationLogEntry {
        let usage = usage.unwrap_or_default();
        GenerationLogEntry {
            schema_version: GENERATION_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            kind: self.kind,
            project: self.project,
            generator: self.generator,
            model,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationLog {
    path: PathBuf,
    max_entries: usize,
}

impl GenerationLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            max_entries: MAX_LOG_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &GenerationLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("create generation log directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open generation log {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("serialize generation log entry")?;
        writeln!(file, "{line}").context("write generation log entry")?;
        drop(file);
        self.enforce_cap()
    }

    /// Rewrite the log with only the newest `max_entries` lines.
    fn enforce_cap(&self) -> Result<()> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read generation log {}", self.path.display()))?;
        let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
        if lines.len() <= self.max_entries {
            return Ok(());
        }
        let dropped = lines.len() - self.max_entries;
        let mut kept = lines[dropped..].join("\n");
        kept.push('\n');
        write_text_atomic(&self.path, &kept)?;
        tracing::debug!(dropped, kept = self.max_entries, "trimmed generation log");
        Ok(())
    }

    /// All readable entries; corrupt lines are skipped with a warning.
    pub fn load(&self) -> Result<Vec<GenerationLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("open generation log {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read line {} of generation log", index + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<GenerationLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(line = index + 1, error = %err, "skip corrupt generation log entry");
                }
            }
        }
        Ok(entries)
    }

    /// Truncate the log. Returns how many entries were discarded.
    pub fn reset(&self) -> Result<usize> {
        let discarded = self.load()?.len();
        if self.path.exists() {
            File::create(&self.path)
                .with_context(|| format!("truncate generation log {}", self.path.display()))?;
        }
        Ok(discarded)
    }
}

/// USD per 1K tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub name: &'static str,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

// Matched by longest model-id prefix so dated snapshots share a row.
const PRICES: &[(&str, ModelPrice)] = &[
    (
        "claude-opus-4-5",
        ModelPrice {
            name: "Claude Opus 4.5",
            input_per_1k: 0.015,
            output_per_1k: 0.075,
        },
    ),
    (
        "claude-sonnet-4-5",
        ModelPrice {
            name: "Claude Sonnet 4.5",
            input_per_1k: 0.003,
            output_per_1k: 0.015,
        },
    ),
    (
        "claude-sonnet-4",
        ModelPrice {
            name: "Claude Sonnet 4",
            input_per_1k: 0.003,
            output_per_1k: 0.015,
        },
    ),
    (
        "claude-haiku-4-5",
        ModelPrice {
            name: "Claude Haiku 4.5",
            input_per_1k: 0.00025,
            output_per_1k: 0.00125,
        },
    ),
    (
        "claude-3-5-sonnet",
        ModelPrice {
            name: "Claude 3.5 Sonnet",
            input_per_1k: 0.003,
            output_per_1k: 0.015,
        },
    ),
    (
        "claude-3-opus",
        ModelPrice {
            name: "Claude 3 Opus",
            input_per_1k: 0.015,
            output_per_1k: 0.075,
        },
    ),
    (
        "claude-3-haiku",
        ModelPrice {
            name: "Claude 3 Haiku",
            input_per_1k: 0.00025,
            output_per_1k: 0.00125,
        },
    ),
];

const FALLBACK_PRICE: ModelPrice = ModelPrice {
    name: "Unknown model (Claude 3 Haiku rates)",
    input_per_1k: 0.00025,
    output_per_1k: 0.00125,
};

pub fn price_for(model: Option<&str>) -> ModelPrice {
    let Some(model) = model else {
        return FALLBACK_PRICE;
    };
    PRICES
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, price)| *price)
        .unwrap_or(FALLBACK_PRICE)
}

pub fn cost_usd(price: &ModelPrice, input_tokens: u64, output_tokens: u64) -> f64 {
    input_tokens as f64 / 1000.0 * price.input_per_1k
        + output_tokens as f64 / 1000.0 * price.output_per_1k
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageBucket {
    pub calls: u64,
    pub failed: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

impl UsageBucket {
    fn add(&mut self, entry: &GenerationLogEntry, cost: f64) {
        self.calls += 1;
        if !entry.outcome.is_success() {
            self.failed += 1;
        }
        self.input_tokens += entry.input_tokens;
        self.output_tokens += entry.output_tokens;
        self.cost_usd += cost;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub total: UsageBucket,
    pub average_cost_per_call: f64,
    pub by_model: BTreeMap<String, UsageBucket>,
    pub by_kind: BTreeMap<String, UsageBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_ts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ts: Option<u64>,
}

pub fn summarize(entries: &[GenerationLogEntry]) -> UsageSummary {
    let mut summary = UsageSummary::default();
    for entry in entries {
        let price = price_for(entry.model.as_deref());
        let cost = cost_usd(&price, entry.input_tokens, entry.output_tokens);
        let model_label = match entry.model.as_deref() {
            Some(_) if price != FALLBACK_PRICE => price.name.to_string(),
            Some(model) => model.to_string(),
            None => entry.generator.clone(),
        };
        summary.total.add(entry, cost);
        summary.by_model.entry(model_label).or_default().add(entry, cost);
        summary
            .by_kind
            .entry(entry.kind.to_string())
            .or_default()
            .add(entry, cost);
        summary.first_ts = Some(summary.first_ts.map_or(entry.ts, |ts| ts.min(entry.ts)));
        summary.last_ts = Some(summary.last_ts.map_or(entry.ts, |ts| ts.max(entry.ts)));
    }
    summary.average_cost_per_call = summary.total.cost_usd / summary.total.calls.max(1) as f64;
    summary
}

/// Newest entries first.
pub fn recent(entries: &[GenerationLogEntry], limit: usize) -> Vec<&GenerationLogEntry> {
    entries.iter().rev().take(limit).collect()
}

pub fn entry_cost(entry: &GenerationLogEntry) -> f64 {
    cost_usd(
        &price_for(entry.model.as_deref()),
        entry.input_tokens,
        entry.output_tokens,
    )
}

/// Quote a CSV field when it holds a separator, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let row: Vec<String> = fields.iter().map(|field| csv_field(field.as_ref())).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn csv_buckets(out: &mut String, title: &str, column: &str, buckets: &BTreeMap<String, UsageBucket>) {
    out.push_str(title);
    out.push('\n');
    csv_row(
        out,
        &[column, "Calls", "Failed", "Input Tokens", "Output Tokens", "Cost (USD)"],
    );
    for (name, bucket) in buckets {
        csv_row(
            out,
            &[
                name.clone(),
                bucket.calls.to_string(),
                bucket.failed.to_string(),
                bucket.input_tokens.to_string(),
                bucket.output_tokens.to_string(),
                format!("{:.6}", bucket.cost_usd),
            ],
        );
    }
    out.push('\n');
}

/// Spreadsheet-friendly export: summary, breakdowns, then recent calls.
pub fn render_usage_csv(entries: &[GenerationLogEntry]) -> String {
    let summary = summarize(entries);
    let mut out = String::new();

    out.push_str("SUMMARY\n");
    csv_row(&mut out, &["Metric", "Value"]);
    for (metric, value) in [
        ("Total Calls", summary.total.calls.to_string()),
        ("Failed Calls", summary.total.failed.to_string()),
        ("Input Tokens", summary.total.input_tokens.to_string()),
        ("Output Tokens", summary.total.output_tokens.to_string()),
        ("Total Tokens", summary.total.total_tokens().to_string()),
        ("Total Cost (USD)", format!("{:.6}", summary.total.cost_usd)),
        (
            "Average Cost per Call (USD)",
            format!("{:.6}", summary.average_cost_per_call),
        ),
    ] {
        csv_row(&mut out, &[metric.to_string(), value]);
    }
    out.push('\n');

    csv_buckets(&mut out, "BREAKDOWN BY KIND", "Kind", &summary.by_kind);
    csv_buckets(&mut out, "BREAKDOWN BY MODEL", "Model", &summary.by_model);

    out.push_str(&format!("RECENT CALLS (Last {CSV_RECENT_CALLS})\n"));
    csv_row(
        &mut out,
        &[
            "Timestamp (ms)",
            "Kind",
            "Project",
            "Generator",
            "Model",
            "Outcome",
            "Duration (ms)",
            "Input Tokens",
            "Output Tokens",
            "Cost (USD)",
            "Error",
        ],
    );
    for entry in recent(entries, CSV_RECENT_CALLS) {
        csv_row(
            &mut out,
            &[
                entry.ts.to_string(),
                entry.kind.to_string(),
                entry.project.clone(),
                entry.generator.clone(),
                entry.model.clone().unwrap_or_default(),
                entry.outcome.as_str().to_string(),
                entry.duration_ms.to_string(),
                entry.input_tokens.to_string(),
                entry.output_tokens.to_string(),
                format!("{:.6}", entry_cost(entry)),
                entry.error.clone().unwrap_or_default(),
            ],
        );
    }
    out
}
