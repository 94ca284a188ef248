//! Generation collaborators.
//!
//! The submission pipeline talks to two narrow traits: a [`Generator`] that
//! turns a validated record into content, and a [`HealthProbe`] that decides
//! whether generation is worth attempting at all. Concrete backends:
//!
//! - [`CommandGenerator`]: a user-configured local command (prompt on stdin,
//!   response on stdout). Works with any CLI that speaks text.
//! - [`AnthropicGenerator`]: the Anthropic Messages API over HTTP.
//! - [`HttpHealthProbe`]: a plain `GET` against a configured health URL.
use crate::record::DataRecord;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

mod anthropic;
mod command;
mod health;
mod prompt;

pub use anthropic::{AnthropicGenerator, AnthropicSettings};
pub use command::CommandGenerator;
pub use health::HttpHealthProbe;
pub use prompt::build_prompt;

/// What the caller wants generated from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    /// Section-by-section memorandum content.
    Content,
    /// Slide-by-slide outline for the presentation.
    Deck,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Content => "content",
            SubmissionKind::Deck => "deck",
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "content" => Ok(SubmissionKind::Content),
            "deck" => Ok(SubmissionKind::Deck),
            other => Err(format!("unknown submission kind {other:?} (expected content or deck)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: SubmissionKind,
    pub payload: DataRecord,
}

/// Raw collaborator output before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Structured(Value),
    Text(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub raw: RawOutput,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl GenerationOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            raw: RawOutput::Text(text.into()),
            model: None,
            usage: None,
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Label used in logs and the generation log.
    fn name(&self) -> String;

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput>;
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<()>;
}
