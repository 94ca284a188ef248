//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// An isolated workspace driven through the `imw` binary.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.path(name);
        let text = serde_json::to_string_pretty(value).expect("serialize fixture");
        std::fs::write(&path, text).expect("write fixture");
        path
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_imw"));
        command
            .arg("--root")
            .arg(self.root())
            .env_remove("IMW_LM_COMMAND")
            .env("RUST_LOG", "warn");
        command
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run imw")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Answers that pass every built-in check.
pub fn complete_record() -> Value {
    json!({
        "projectCodename": "Project Phoenix",
        "companyName": "Acme Analytics",
        "documentType": "management-presentation",
        "companyDescription": "Data engineering services for banks.",
        "investmentHighlights": "Market leader in BFSI analytics\nRecurring revenue above 70%\nBlue-chip client base\nFounder-led engineering culture\nExpanding margins",
        "founderName": "R. Mehta",
        "serviceLines": "Data platforms|60%|Lakehouse builds",
        "primaryVertical": "bfsi",
        "currency": "INR",
        "revenueFY24": 80.0,
        "revenueFY25": 100.0,
        "revenueFY26P": 140.0,
        "ebitdaMarginFY25": 22.0
    })
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
