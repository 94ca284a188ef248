//! Typed paths into the wizard workspace.
//!
//! ```text
//! <root>/
//!   config.json
//!   drafts/<project>.json
//!   generation_log.jsonl
//! ```
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "im-wizard";

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Use `root` when given, otherwise the platform data directory.
    pub fn resolve(root: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = root {
            return Ok(Self::new(root));
        }
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("cannot determine a data directory; pass --root"))?;
        Ok(Self::new(base.join(APP_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.root.join("drafts")
    }

    pub fn generation_log_path(&self) -> PathBuf {
        self.root.join("generation_log.jsonl")
    }
}
