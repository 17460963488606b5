//! Staging directory probe.
//!
//! The browser writes every download into the staging directory first. Between
//! attempts the directory is expected to be empty; during an attempt it holds
//! the transfer's file and, while the transfer runs, an in-progress marker
//! (`<name>.part`).
//!
//! Access is strictly sequential: the browser is the only writer and the
//! orchestrator the only reader, one transfer at a time. Nothing here locks,
//! and no caller may trigger a second transfer while one is pending.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Suffix Firefox gives a file while it is still being written
pub const IN_PROGRESS_MARKER: &str = ".part";

/// Errors that can occur while probing the staging directory
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Staging directory does not exist: {0}")]
    Unavailable(PathBuf),

    #[error("IO error on staging directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Whether a staged file name denotes an unfinished transfer
pub fn is_in_progress(name: &str) -> bool {
    name.ends_with(IN_PROGRESS_MARKER)
}

/// Names of the regular files in staging at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingSnapshot {
    files: BTreeSet<String>,
}

impl StagingSnapshot {
    /// Build a snapshot from file names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: names.into_iter().map(Into::into).collect(),
        }
    }

    /// All file names, sorted
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Number of files, markers included
    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True iff any transfer is still in flight
    pub fn has_in_progress(&self) -> bool {
        self.files.iter().any(|name| is_in_progress(name))
    }

    /// Names still carrying the in-progress marker
    pub fn in_progress(&self) -> Vec<&str> {
        self.files()
            .filter(|name| is_in_progress(name))
            .collect()
    }

    /// The only file, when there is exactly one
    pub fn single(&self) -> Option<&str> {
        if self.files.len() == 1 {
            self.files().next()
        } else {
            None
        }
    }
}

/// Anything that can report the current staging contents
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> Result<StagingSnapshot, StagingError>;
}

/// The browser's download directory
#[derive(Debug, Clone)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full path of a staged file
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// List the regular files currently in staging.
    ///
    /// Sub-directories are ignored. A missing directory is an error here;
    /// only [`StagingDir::clear`] tolerates it.
    pub async fn list(&self) -> Result<StagingSnapshot, StagingError> {
        let mut entries = match fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StagingError::Unavailable(self.path.clone()));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let mut files = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.io_error(e))? {
            let file_type = entry.file_type().await.map_err(|e| self.io_error(e))?;
            if !file_type.is_file() {
                continue;
            }
            files.insert(entry.file_name().to_string_lossy().into_owned());
        }

        Ok(StagingSnapshot { files })
    }

    /// Delete every regular file directly inside staging.
    ///
    /// Directories are left alone and a missing staging directory counts as
    /// already clear. Returns the number of files removed.
    pub async fn clear(&self) -> Result<usize, StagingError> {
        info!("Empty the download directory ({})", self.path.display());

        let mut entries = match fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Download directory does not exist, nothing to clear");
                return Ok(0);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.io_error(e))? {
            let file_type = entry.file_type().await.map_err(|e| self.io_error(e))?;
            if !file_type.is_file() {
                continue;
            }

            info!(
                "  -- deleting {} from {}",
                entry.file_name().to_string_lossy(),
                self.path.display()
            );
            fs::remove_file(entry.path())
                .await
                .map_err(|e| self.io_error(e))?;
            removed += 1;
        }

        info!("Download directory is now empty");
        Ok(removed)
    }

    fn io_error(&self, source: io::Error) -> StagingError {
        StagingError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SnapshotSource for StagingDir {
    async fn snapshot(&self) -> Result<StagingSnapshot, StagingError> {
        self.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_progress_marker() {
        assert!(is_in_progress("clip.mp4.part"));
        assert!(is_in_progress("abc.part"));
        assert!(!is_in_progress("clip.mp4"));
        assert!(!is_in_progress("partition.zip"));
    }

    #[test]
    fn test_snapshot_queries() {
        let snapshot = StagingSnapshot::from_names(["clip.mp4", "clip.mp4.part"]);
        assert_eq!(snapshot.count(), 2);
        assert!(snapshot.has_in_progress());
        assert_eq!(snapshot.in_progress(), vec!["clip.mp4.part"]);
        assert_eq!(snapshot.single(), None);

        let settled = StagingSnapshot::from_names(["clip.mp4"]);
        assert!(!settled.has_in_progress());
        assert_eq!(settled.single(), Some("clip.mp4"));

        assert!(StagingSnapshot::default().is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_directories() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("a.zip"), b"a").await.unwrap();
        tokio::fs::create_dir(temp.path().join("nested")).await.unwrap();

        let staging = StagingDir::new(temp.path());
        let snapshot = staging.list().await.unwrap();

        assert_eq!(snapshot.files().collect::<Vec<_>>(), vec!["a.zip"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let staging = StagingDir::new(temp.path().join("missing"));

        let result = staging.list().await;
        assert!(matches!(result, Err(StagingError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_clear_removes_files_only() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("a.mp4"), b"a").await.unwrap();
        tokio::fs::write(temp.path().join("b.mp4.part"), b"b").await.unwrap();
        tokio::fs::create_dir(temp.path().join("keep")).await.unwrap();

        let staging = StagingDir::new(temp.path());
        let removed = staging.clear().await.unwrap();

        assert_eq!(removed, 2);
        assert!(staging.list().await.unwrap().is_empty());
        assert!(temp.path().join("keep").is_dir());
    }

    #[tokio::test]
    async fn test_clear_missing_directory_is_ok() {
        let temp = TempDir::new().unwrap();
        let staging = StagingDir::new(temp.path().join("missing"));

        assert_eq!(staging.clear().await.unwrap(), 0);
    }
}
