use super::HealthProbe;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Healthy when `GET url` answers with a 2xx status.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    url: String,
    agent: ureq::Agent,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> Result<()> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        let status = tokio::task::spawn_blocking(move || -> Result<u16> {
            let response = agent.get(&url).call().with_context(|| format!("GET {url}"))?;
            Ok(response.status().as_u16())
        })
        .await
        .context("join health probe")??;
        tracing::debug!(url = %self.url, status, "health probe");
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(anyhow!("health check {} returned HTTP {status}", self.url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_is_unhealthy() {
        // Port 9 on localhost is the discard service and is almost never bound.
        let probe = HttpHealthProbe::new("http://127.0.0.1:9/health", Some(Duration::from_secs(2)));
        assert!(probe.probe().await.is_err());
        assert_eq!(probe.url(), "http://127.0.0.1:9/health");
    }
}
