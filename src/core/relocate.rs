//! Relocation engine: moves a settled download into the archive.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::domain::ArchiveTarget;

use super::archive::ArchiveLocator;
use super::staging::{StagingDir, StagingSnapshot};

#[cfg(unix)]
const CROSS_DEVICE_ERROR: i32 = 18; // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_ERROR: i32 = 17; // ERROR_NOT_SAME_DEVICE

/// Errors that can occur while moving a download into the archive
#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("Expected exactly one staged file, found {0}")]
    NotSingle(usize),

    #[error("Failed to create archive directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Extension of a staged file: everything from the first dot, dot included.
///
/// `"report.final.pdf"` gives `".final.pdf"`; a name without a dot gives `""`.
pub fn derive_extension(name: &str) -> &str {
    name.find('.').map(|idx| &name[idx..]).unwrap_or("")
}

/// Moves the single staged file to its canonical archive path
#[derive(Debug, Clone)]
pub struct Relocator {
    staging: StagingDir,
    archive: ArchiveLocator,
}

impl Relocator {
    pub fn new(staging: StagingDir, archive: ArchiveLocator) -> Self {
        Self { staging, archive }
    }

    /// Where the snapshot's only file would be archived for `target`
    pub fn destination(
        &self,
        snapshot: &StagingSnapshot,
        target: &ArchiveTarget,
    ) -> Result<PathBuf, RelocationError> {
        let name = snapshot
            .single()
            .ok_or_else(|| RelocationError::NotSingle(snapshot.count()))?;
        Ok(self.archive.canonical_path(target, derive_extension(name)))
    }

    /// Move the snapshot's only file into the archive and return its new path
    pub async fn relocate(
        &self,
        snapshot: &StagingSnapshot,
        target: &ArchiveTarget,
    ) -> Result<PathBuf, RelocationError> {
        let name = snapshot
            .single()
            .ok_or_else(|| RelocationError::NotSingle(snapshot.count()))?;
        let from = self.staging.file_path(name);
        let to = self.archive.canonical_path(target, derive_extension(name));

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| RelocationError::Prepare {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        info!("      - Moving download to {}", to.display());
        move_file(&from, &to)
            .await
            .map_err(|source| RelocationError::Move {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;

        Ok(to)
    }
}

/// Rename, falling back to copy + remove across filesystems
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERROR) => {
            fs::copy(from, to).await?;
            fs::remove_file(from).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_derive_extension() {
        assert_eq!(derive_extension("report.final.pdf"), ".final.pdf");
        assert_eq!(derive_extension("x.mp4"), ".mp4");
        assert_eq!(derive_extension("README"), "");
        assert_eq!(derive_extension(".hidden"), ".hidden");
    }

    fn setup() -> (TempDir, StagingDir, ArchiveLocator) {
        let temp = TempDir::new().unwrap();
        let staging = StagingDir::new(temp.path().join("staging"));
        let archive = ArchiveLocator::new(temp.path().join("archive"));
        std::fs::create_dir_all(staging.path()).unwrap();
        (temp, staging, archive)
    }

    #[tokio::test]
    async fn test_relocate_single_file() {
        let (_temp, staging, archive) = setup();
        tokio::fs::write(staging.file_path("report.final.pdf"), b"pdf")
            .await
            .unwrap();

        let relocator = Relocator::new(staging.clone(), archive.clone());
        let target = ArchiveTarget::new("site-a", "item-1", "annual");
        let snapshot = staging.list().await.unwrap();

        let path = relocator.relocate(&snapshot, &target).await.unwrap();

        assert_eq!(
            path,
            archive.item_dir("site-a", "item-1").join("annual.final.pdf")
        );
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"pdf");
        assert!(staging.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relocate_refuses_multiple_files() {
        let (_temp, staging, archive) = setup();
        tokio::fs::write(staging.file_path("a.mp4"), b"a").await.unwrap();
        tokio::fs::write(staging.file_path("b.mp4"), b"b").await.unwrap();

        let relocator = Relocator::new(staging.clone(), archive);
        let target = ArchiveTarget::new("site-a", "item-1", "clip");
        let snapshot = staging.list().await.unwrap();

        let result = relocator.relocate(&snapshot, &target).await;

        assert!(matches!(result, Err(RelocationError::NotSingle(2))));
        assert_eq!(staging.list().await.unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_relocate_reports_missing_source() {
        let (_temp, staging, archive) = setup();
        let relocator = Relocator::new(staging, archive);
        let target = ArchiveTarget::new("site-a", "item-1", "clip");
        let snapshot = StagingSnapshot::from_names(["vanished.mp4"]);

        let result = relocator.relocate(&snapshot, &target).await;

        assert!(matches!(result, Err(RelocationError::Move { .. })));
    }

    #[test]
    fn test_destination_uses_staged_extension() {
        let relocator = Relocator::new(StagingDir::new("/dl"), ArchiveLocator::new("/archive"));
        let target = ArchiveTarget::new("site-a", "item-1", "my-file");
        let snapshot = StagingSnapshot::from_names(["x.mp4"]);

        assert_eq!(
            relocator.destination(&snapshot, &target).unwrap(),
            PathBuf::from("/archive/site-a/item-1/my-file.mp4")
        );
    }
}
