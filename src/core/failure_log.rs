//! Append-only log of files that could not be retrieved.
//!
//! Stored as newline-delimited JSON so failed downloads from earlier runs can
//! be reviewed (or grepped) after the fact.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::domain::FailureRecord;

/// One line of the failure log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureLogEntry {
    /// Run that produced the failure
    pub run_id: Uuid,

    #[serde(flatten)]
    pub record: FailureRecord,
}

/// JSONL failure log for one run
pub struct FailureLog {
    path: PathBuf,
    run_id: Uuid,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>, run_id: Uuid) -> Self {
        Self {
            path: path.into(),
            run_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a failure record
    pub async fn append(&self, record: &FailureRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let entry = FailureLogEntry {
            run_id: self.run_id,
            record: record.clone(),
        };
        let json = serde_json::to_string(&entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open failure log: {}", self.path.display()))?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Read every entry, from all runs
    pub async fn read_all(&self) -> Result<Vec<FailureLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read failure log: {}", self.path.display()))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed failure log entry"))
            .collect()
    }
}
