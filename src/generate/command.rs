//! Local command generator.
//!
//! Delegates generation to a user-configured command line (parsed with
//! shell-words). The prompt is written to stdin and stdout is the response.
//! Claude CLI `--output-format json` envelopes are unwrapped so either plain
//! or enveloped output works.
use super::{
    build_prompt, GenerationOutput, GenerationRequest, Generator, HealthProbe, RawOutput,
    TokenUsage,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    argv: Vec<String>,
}

impl CommandGenerator {
    pub fn new(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self { argv })
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn LM command: {}", self.argv[0]))?;

        // Stdin is fed concurrently with draining stdout.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.context("wait for LM command")?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        fed.context("write prompt to LM stdin")?;
        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }
}

/// Unwrap a Claude CLI JSON envelope, if that is what the command printed.
fn unwrap_envelope(stdout: String) -> GenerationOutput {
    let Ok(Value::Object(envelope)) = serde_json::from_str::<Value>(&stdout) else {
        return GenerationOutput::text(stdout);
    };
    if envelope.get("type").and_then(Value::as_str) != Some("result") {
        return GenerationOutput::text(stdout);
    }
    let usage = envelope.get("usage").map(|usage| TokenUsage {
        input_tokens: usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
    });
    let raw = if let Some(structured) = envelope.get("structured_output") {
        RawOutput::Structured(structured.clone())
    } else if let Some(result) = envelope.get("result").and_then(Value::as_str) {
        RawOutput::Text(result.to_string())
    } else {
        RawOutput::Text(stdout)
    };
    GenerationOutput {
        raw,
        model: None,
        usage,
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    fn name(&self) -> String {
        format!("command:{}", self.argv[0])
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let prompt = build_prompt(request)?;
        let stdout = self.run(&prompt).await?;
        Ok(unwrap_envelope(stdout))
    }
}

#[async_trait]
impl HealthProbe for CommandGenerator {
    async fn probe(&self) -> Result<()> {
        which::which(self.program())
            .map(|_| ())
            .with_context(|| format!("LM command {:?} not found on PATH", self.program()))
    }
}
