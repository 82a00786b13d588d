//! The uniform contract every domain collector implements.
//!
//! Concrete collectors (dotfiles, ssh, packages, ...) live under
//! [`crate::collectors`]; this module defines only the trait, the staging
//! handle each collector writes through, and the async-trait plumbing the
//! Orchestrator uses to fan them out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::archive::Archiver;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::{FileInfo, SharedMetadata};
use crate::pathguard;

/// A pre-created, exclusive staging subdirectory handed to one collector.
#[derive(Clone)]
pub struct StagingDir {
    root: PathBuf,
    category: &'static str,
}

impl StagingDir {
    /// Create (if missing) and return the staging handle for `category`
    /// rooted at `staging_root`.
    pub fn new(staging_root: &Path, category: &'static str) -> Result<Self> {
        let dir = staging_root.join(category);
        std::fs::create_dir_all(&dir)?;
        Ok(StagingDir { root: dir, category })
    }

    /// This collector's category tag, also its top-level archive prefix.
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Absolute path to this collector's staging subdirectory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stage a single file at `relative` (relative to this category's
    /// root), routed through [`pathguard`] so a crafted source name can
    /// never escape the staging tree.
    pub fn stage_file(&self, src: &Path, relative: &Path) -> Result<PathBuf> {
        let dest = pathguard::sanitize(&self.root, relative)?;
        Archiver::copy_file(src, &dest)?;
        Ok(dest)
    }

    /// Stage a directory tree at `relative`, applying the given exclusions.
    pub fn stage_dir(&self, src: &Path, relative: &Path, exclusions: &[String]) -> Result<PathBuf> {
        let dest = pathguard::sanitize(&self.root, relative)?;
        Archiver::copy_dir(src, &dest, exclusions)?;
        Ok(dest)
    }

    /// Build the `FileInfo::backup_path` for a file staged at `relative`
    /// under this category.
    pub fn backup_path(&self, relative: &Path) -> PathBuf {
        Path::new(self.category).join(relative)
    }
}

/// Uniform contract all domain collectors implement.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable tag used in task lists, recovery state, and package counts.
    fn name(&self) -> &'static str;

    /// Gather this category's sources into `staging`, appending
    /// [`FileInfo`] records to `meta`.
    ///
    /// When `incr` is `Some`, the collector must query it per candidate
    /// source path and skip files reported unchanged. May return partial
    /// success: per-file errors are swallowed as warnings; the task only
    /// fails outright when a precondition (e.g. a required manager binary
    /// missing) is violated.
    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()>;
}

/// Build one [`FileInfo`] for a staged regular file.
pub fn file_info(original_path: PathBuf, backup_path: PathBuf, size: u64, mode: u32) -> FileInfo {
    FileInfo {
        original_path,
        backup_path,
        size,
        mode,
        is_dir: false,
        checksum: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_file_rejects_traversal_in_relative_name() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(root.path(), "dotfiles").unwrap();

        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("secret.txt");
        std::fs::write(&src, b"x").unwrap();

        let err = staging
            .stage_file(&src, Path::new("../../escape.txt"))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::PathTraversal);
    }

    #[test]
    fn backup_path_is_rooted_at_category() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(root.path(), "ssh").unwrap();
        assert_eq!(staging.backup_path(Path::new("id_ed25519")), PathBuf::from("ssh/id_ed25519"));
    }

    #[test]
    fn stage_file_copies_bytes() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(root.path(), "dotfiles").unwrap();

        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join(".zshrc");
        std::fs::write(&src, b"alias ls='ls -G'").unwrap();

        let dest = staging.stage_file(&src, Path::new(".zshrc")).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"alias ls='ls -G'");
    }
}
