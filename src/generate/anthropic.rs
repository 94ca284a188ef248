//! Anthropic Messages API generator.
//!
//! ureq is blocking, so every request runs on the blocking pool and the
//! async caller stays cancellable.
use super::{
    build_prompt, GenerationOutput, GenerationRequest, Generator, HealthProbe, RawOutput,
    TokenUsage,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const ERROR_BODY_LIMIT: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key. Keys never live in config.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone)]
pub struct AnthropicGenerator {
    settings: AnthropicSettings,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl std::fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("settings", &self.settings)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl AnthropicGenerator {
    /// Build a generator, reading the key from `settings.api_key_env`.
    pub fn from_env(settings: AnthropicSettings, timeout: Option<Duration>) -> Self {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::new(settings, api_key, timeout)
    }

    pub fn new(settings: AnthropicSettings, api_key: Option<String>, timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            settings,
            api_key,
            agent,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .ok_or_else(|| anyhow!("{} is not set", self.settings.api_key_env))
    }
}

fn extract_text(response: &MessagesResponse) -> Result<String> {
    let text: Vec<&str> = response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();
    if text.is_empty() {
        return Err(anyhow!("Messages API response has no text content"));
    }
    Ok(text.join(""))
}

fn status_error(status: u16, body: &str) -> anyhow::Error {
    anyhow!(
        "Anthropic API returned HTTP {status}: {}",
        crate::util::truncate_string(body.trim(), ERROR_BODY_LIMIT)
    )
}

#[async_trait]
impl Generator for AnthropicGenerator {
    fn name(&self) -> String {
        format!("anthropic:{}", self.settings.model)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput> {
        let prompt = build_prompt(request)?;
        let api_key = self.api_key()?;
        let agent = self.agent.clone();
        let url = self.endpoint("/v1/messages");
        let body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        let prompt_bytes = prompt.len();
        let start = Instant::now();

        let (status, text) = tokio::task::spawn_blocking(move || -> Result<(u16, String)> {
            let mut response = agent
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .send_json(&body)
                .with_context(|| format!("POST {url}"))?;
            let status = response.status().as_u16();
            let text = response
                .body_mut()
                .read_to_string()
                .context("read Messages API response")?;
            Ok((status, text))
        })
        .await
        .context("join Messages API request")??;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes,
            response_bytes = text.len(),
            status,
            "anthropic request complete"
        );
        if !(200..300).contains(&status) {
            return Err(status_error(status, &text));
        }
        let parsed: MessagesResponse =
            serde_json::from_str(&text).context("parse Messages API response")?;
        Ok(GenerationOutput {
            raw: RawOutput::Text(extract_text(&parsed)?),
            model: parsed.model.or_else(|| Some(self.settings.model.clone())),
            usage: parsed.usage,
        })
    }
}

#[async_trait]
impl HealthProbe for AnthropicGenerator {
    async fn probe(&self) -> Result<()> {
        let api_key = self.api_key()?;
        let agent = self.agent.clone();
        let url = self.endpoint("/v1/models");
        let status = tokio::task::spawn_blocking(move || -> Result<u16> {
            let response = agent
                .get(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .call()
                .with_context(|| format!("GET {url}"))?;
            Ok(response.status().as_u16())
        })
        .await
        .context("join health probe")??;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(anyhow!("Anthropic API health check returned HTTP {status}"))
        }
    }
}
