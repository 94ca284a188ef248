//! Keyed draft persistence.
//!
//! Saves are last-write-wins per key. A missing key is `Ok(None)`, never an
//! error.
use crate::record::DataRecord;
use crate::util::{now_epoch_ms, write_json_atomic};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub key: String,
    pub record: DataRecord,
    /// Unix timestamp in milliseconds.
    pub saved_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub key: String,
    pub saved_at: u64,
    pub fields: usize,
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Create or overwrite the draft for `key`; returns the key.
    async fn save(&self, key: &str, record: &DataRecord) -> Result<String>;

    async fn load(&self, key: &str) -> Result<Option<DraftRecord>>;

    /// Stored drafts ordered by key.
    async fn list(&self) -> Result<Vec<DraftSummary>>;
}

/// Reject keys that could escape the drafts directory.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(anyhow!("draft key must be non-empty"));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(anyhow!("draft key {key:?} must not contain path separators"));
    }
    if key.starts_with('.') {
        return Err(anyhow!("draft key {key:?} must not start with '.'"));
    }
    Ok(())
}

fn summarize(draft: &DraftRecord) -> DraftSummary {
    DraftSummary {
        key: draft.key.clone(),
        saved_at: draft.saved_at,
        fields: draft.record.len(),
    }
}

/// Shared in-process map.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    drafts: Arc<RwLock<BTreeMap<String, DraftRecord>>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, key: &str, record: &DataRecord) -> Result<String> {
        validate_key(key)?;
        let draft = DraftRecord {
            key: key.to_string(),
            record: record.clone(),
            saved_at: now_epoch_ms(),
        };
        self.drafts.write().await.insert(key.to_string(), draft);
        Ok(key.to_string())
    }

    async fn load(&self, key: &str) -> Result<Option<DraftRecord>> {
        validate_key(key)?;
        Ok(self.drafts.read().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<DraftSummary>> {
        Ok(self.drafts.read().await.values().map(summarize).collect())
    }
}

/// One JSON file per draft under `drafts/`.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn save(&self, key: &str, record: &DataRecord) -> Result<String> {
        let path = self.path_for(key)?;
        let draft = DraftRecord {
            key: key.to_string(),
            record: record.clone(),
            saved_at: now_epoch_ms(),
        };
        let start = Instant::now();
        tokio::task::spawn_blocking(move || write_json_atomic(&path, &draft))
            .await
            .context("join draft save")??;
        tracing::info!(
            key,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "draft saved"
        );
        Ok(key.to_string())
    }

    async fn load(&self, key: &str) -> Result<Option<DraftRecord>> {
        let path = self.path_for(key)?;
        let start = Instant::now();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(key, "draft not found");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read draft {}", path.display()))
            }
        };
        let draft: DraftRecord = serde_json::from_str(&text)
            .with_context(|| format!("parse draft {}", path.display()))?;
        tracing::info!(
            key,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "draft loaded"
        );
        Ok(Some(draft))
    }

    async fn list(&self) -> Result<Vec<DraftSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("list {}", self.dir.display()))
            }
        };
        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("read drafts dir")? {
            let path = entry.path();
            let Some(key) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".json"))
            else {
                continue;
            };
            if validate_key(key).is_err() {
                continue;
            }
            match self.load(key).await {
                Ok(Some(draft)) => summaries.push(summarize(&draft)),
                Ok(None) => {}
                Err(err) => tracing::warn!(key, error = %format!("{err:#}"), "skip unreadable draft"),
            }
        }
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(summaries)
    }
}
