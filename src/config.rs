//! Workspace configuration.
//!
//! `config.json` is optional; when absent the built-in defaults apply. The
//! loaded config is validated before anything is built from it, and the
//! `IMW_LM_COMMAND` environment variable can swap the generator for a local
//! command without editing the file.
use crate::generate::{
    AnthropicGenerator, AnthropicSettings, CommandGenerator, Generator, HealthProbe,
    HttpHealthProbe,
};
use crate::questionnaire::{self, CustomQuestion, QuestionnaireSpec};
use crate::util::{read_json, write_json_atomic};
use crate::workspace::WorkspacePaths;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const LM_COMMAND_ENV: &str = "IMW_LM_COMMAND";
const DEFAULT_LM_COMMAND: &str = "claude --print --output-format json --no-session-persistence";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WizardConfig {
    pub schema_version: u32,
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Replaces the generator's own health probe when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_questions: Vec<CustomQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratorConfig {
    Command { command: String },
    Anthropic(AnthropicSettings),
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::Command {
            command: DEFAULT_LM_COMMAND.to_string(),
        }
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            generator: GeneratorConfig::default(),
            health_url: None,
            timeout_secs: None,
            custom_questions: Vec::new(),
        }
    }
}

impl WizardConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Frozen questionnaire: the built-in phases plus any custom questions.
    pub fn questionnaire(&self) -> Result<Arc<QuestionnaireSpec>> {
        let mut spec = questionnaire::builtin().clone();
        if !self.custom_questions.is_empty() {
            spec.extend_with_custom(&self.custom_questions)
                .context("apply custom_questions")?;
        }
        Ok(Arc::new(spec))
    }

    /// Generator after applying the `IMW_LM_COMMAND` override.
    pub fn effective_generator(&self, env_command: Option<&str>) -> GeneratorConfig {
        match env_command.map(str::trim).filter(|command| !command.is_empty()) {
            Some(command) => GeneratorConfig::Command {
                command: command.to_string(),
            },
            None => self.generator.clone(),
        }
    }
}

/// Load `config.json`, or defaults when the workspace has none.
pub fn load_config(paths: &WorkspacePaths) -> Result<WizardConfig> {
    let path = paths.config_path();
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(WizardConfig::default());
    }
    let config: WizardConfig = read_json(&path)?;
    validate_config(&config).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

pub fn write_config(paths: &WorkspacePaths, config: &WizardConfig) -> Result<()> {
    write_json_atomic(&paths.config_path(), config)
}

pub fn validate_config(config: &WizardConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
            config.schema_version
        ));
    }
    match &config.generator {
        GeneratorConfig::Command { command } => {
            CommandGenerator::new(command).context("generator.command")?;
        }
        GeneratorConfig::Anthropic(settings) => {
            validate_url(&settings.api_url, "generator.api_url")?;
            if settings.model.trim().is_empty() {
                return Err(anyhow!("generator.model must be non-empty"));
            }
            if settings.api_key_env.trim().is_empty() {
                return Err(anyhow!("generator.api_key_env must be non-empty"));
            }
            if settings.max_tokens == 0 {
                return Err(anyhow!("generator.max_tokens must be greater than zero"));
            }
        }
    }
    if let Some(url) = &config.health_url {
        validate_url(url, "health_url")?;
    }
    if config.timeout_secs == Some(0) {
        return Err(anyhow!("timeout_secs must be greater than zero"));
    }
    config.questionnaire()?;
    Ok(())
}

fn validate_url(url: &str, label: &str) -> Result<()> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| anyhow!("{label} must be an http(s) URL (got {url:?})"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(anyhow!("{label} has no host (got {url:?})"));
    }
    Ok(())
}

/// Generator plus the probe that gates it.
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub probe: Arc<dyn HealthProbe>,
}

pub fn build_collaborators(config: &WizardConfig) -> Result<Collaborators> {
    let env_command = std::env::var(LM_COMMAND_ENV).ok();
    let generator_config = config.effective_generator(env_command.as_deref());
    let (generator, own_probe) = match generator_config {
        GeneratorConfig::Command { command } => {
            let generator = Arc::new(CommandGenerator::new(&command)?);
            let probe: Arc<dyn HealthProbe> = generator.clone();
            (generator as Arc<dyn Generator>, probe)
        }
        GeneratorConfig::Anthropic(settings) => {
            let generator = Arc::new(AnthropicGenerator::from_env(settings, config.timeout()));
            let probe: Arc<dyn HealthProbe> = generator.clone();
            (generator as Arc<dyn Generator>, probe)
        }
    };
    let probe: Arc<dyn HealthProbe> = match &config.health_url {
        Some(url) => {
            let probe = HttpHealthProbe::new(url.clone(), config.timeout());
            tracing::debug!(url = probe.url(), "health probe overridden");
            Arc::new(probe)
        }
        None => own_probe,
    };
    tracing::debug!(generator = %generator.name(), "collaborators ready");
    Ok(Collaborators { generator, probe })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
