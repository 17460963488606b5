//! Archive layout and the dedup gate.
//!
//! Layout: `<root>/<site>/<item>/<base_name><ext>`. The extension is only known
//! once a download has landed, so presence is tested with `<base_name>.*`,
//! plus the bare `<base_name>` for downloads that had no extension at all.
//! Only regular files count. Matching is purely by name; two different files
//! that produce the same descriptive base name are treated as the same file.

use std::io;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use thiserror::Error;
use tokio::fs;

use crate::domain::ArchiveTarget;

/// Errors that can occur while inspecting or preparing the archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid archive lookup pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Archive lookup task failed: {0}")]
    Lookup(#[from] tokio::task::JoinError),

    #[error("IO error on archive directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Maps targets to permanent archive paths
#[derive(Debug, Clone)]
pub struct ArchiveLocator {
    root: PathBuf,
}

impl ArchiveLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every file of one item
    pub fn item_dir(&self, site: &str, item: &str) -> PathBuf {
        self.root.join(site).join(item)
    }

    /// Final path of a target given the extension of its download
    /// (dot included, e.g. `".mp4"`)
    pub fn canonical_path(&self, target: &ArchiveTarget, extension: &str) -> PathBuf {
        self.item_dir(&target.site, &target.item)
            .join(format!("{}{}", target.base_name, extension))
    }

    /// True iff a regular file `<base_name>` or `<base_name>.*` already
    /// exists for this target
    pub async fn exists(&self, target: &ArchiveTarget) -> Result<bool, ArchiveError> {
        let dir = self.item_dir(&target.site, &target.item);
        let base_name = target.base_name.clone();

        tokio::task::spawn_blocking(move || find_archived(&dir, &base_name)).await?
    }

    /// Create the item directory if needed.
    ///
    /// Returns true when the directory already existed and held something,
    /// which callers use to skip whole items that were fetched before.
    pub async fn ensure_item_dir(&self, site: &str, item: &str) -> Result<bool, ArchiveError> {
        let dir = self.item_dir(site, item);
        let io_error = |source| ArchiveError::Io {
            path: dir.clone(),
            source,
        };

        let had_content = match fs::read_dir(&dir).await {
            Ok(mut entries) => entries.next_entry().await.map_err(io_error)?.is_some(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(io_error(e)),
        };

        fs::create_dir_all(&dir).await.map_err(io_error)?;

        Ok(had_content)
    }
}

/// Blocking directory walk behind [`ArchiveLocator::exists`]
fn find_archived(dir: &Path, base_name: &str) -> Result<bool, ArchiveError> {
    if dir.join(base_name).is_file() {
        return Ok(true);
    }

    let pattern = format!(
        "{}/{}.*",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(base_name)
    );
    let found = glob(&pattern)?
        .filter_map(Result::ok)
        .any(|path| path.is_file());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_canonical_path() {
        let archive = ArchiveLocator::new("/archive");
        let target = ArchiveTarget::new("site-a", "item-1", "my-file");

        assert_eq!(
            archive.canonical_path(&target, ".mp4"),
            PathBuf::from("/archive/site-a/item-1/my-file.mp4")
        );
        assert_eq!(
            archive.canonical_path(&target, ".final.pdf"),
            PathBuf::from("/archive/site-a/item-1/my-file.final.pdf")
        );
    }

    #[tokio::test]
    async fn test_exists_matches_any_extension() {
        let temp = TempDir::new().unwrap();
        let archive = ArchiveLocator::new(temp.path());
        let target = ArchiveTarget::new("site-a", "item-1", "my-file");

        assert!(!archive.exists(&target).await.unwrap());

        let dir = archive.item_dir("site-a", "item-1");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("my-file.mov"), b"x").await.unwrap();

        assert!(archive.exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_requires_dot_after_base_name() {
        let temp = TempDir::new().unwrap();
        let archive = ArchiveLocator::new(temp.path());
        let dir = archive.item_dir("site-a", "item-1");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("my-file-4k.mp4"), b"x").await.unwrap();
        tokio::fs::write(dir.join("my-filed"), b"x").await.unwrap();

        let target = ArchiveTarget::new("site-a", "item-1", "my-file");
        assert!(!archive.exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_matches_file_without_extension() {
        let temp = TempDir::new().unwrap();
        let archive = ArchiveLocator::new(temp.path());
        let dir = archive.item_dir("site-a", "item-1");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("my-file"), b"x").await.unwrap();

        let target = ArchiveTarget::new("site-a", "item-1", "my-file");
        assert!(archive.exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_ignores_directories() {
        let temp = TempDir::new().unwrap();
        let archive = ArchiveLocator::new(temp.path());
        let dir = archive.item_dir("site-a", "item-1");
        tokio::fs::create_dir_all(dir.join("my-file.d")).await.unwrap();
        tokio::fs::create_dir_all(dir.join("other")).await.unwrap();

        let target = ArchiveTarget::new("site-a", "item-1", "my-file");
        assert!(!archive.exists(&target).await.unwrap());

        let other = ArchiveTarget::new("site-a", "item-1", "other");
        assert!(!archive.exists(&other).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_escapes_glob_characters() {
        let temp = TempDir::new().unwrap();
        let archive = ArchiveLocator::new(temp.path());
        let dir = archive.item_dir("site-a", "item-1");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("take-1.mp4"), b"x").await.unwrap();

        let wildcard = ArchiveTarget::new("site-a", "item-1", "take-[0-9]");
        assert!(!archive.exists(&wildcard).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_item_dir() {
        let temp = TempDir::new().unwrap();
        let archive = ArchiveLocator::new(temp.path());

        // Absent: created, reported as new
        assert!(!archive.ensure_item_dir("site-a", "item-1").await.unwrap());
        let dir = archive.item_dir("site-a", "item-1");
        assert!(dir.is_dir());

        // Present but empty: still reported as new
        assert!(!archive.ensure_item_dir("site-a", "item-1").await.unwrap());

        // Present with content
        tokio::fs::write(dir.join("a.mp4"), b"x").await.unwrap();
        assert!(archive.ensure_item_dir("site-a", "item-1").await.unwrap());
    }
}
