//! Collapsing a restore chain into a single full artifact.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::archive::Archiver;
use crate::encrypt::Encryptor;
use crate::error::{Error, ErrorKind, Result};
use crate::metadata::{BackupType, Metadata, METADATA_FILENAME};
use crate::registry::BackupRegistry;
use crate::restore::{extract_chain, get_restore_chain};
use crate::util::new_backup_name;

/// Outcome of an `optimize` run.
#[derive(Debug, Clone)]
pub enum OptimizeOutcome {
    /// The chain had no incrementals; nothing was done.
    AlreadyOptimal,
    /// A new merged artifact was produced at this path.
    Merged(PathBuf),
}

/// Merge the full chain containing `artifact` into a single full backup.
///
/// Unless `keep_chain` is set, every original artifact in the chain is
/// deleted and its registry entry removed, replaced by a single `full`
/// entry for the merged artifact.
pub fn optimize(
    registry: &BackupRegistry,
    artifact: &Path,
    output_dir: &Path,
    key_path: Option<&Path>,
    keep_chain: bool,
) -> Result<OptimizeOutcome> {
    let chain = get_restore_chain(registry, artifact)?;
    if chain.incrementals.is_empty() {
        return Ok(OptimizeOutcome::AlreadyOptimal);
    }

    for path in chain.ordered() {
        if !path.is_file() {
            return Err(Error::new(ErrorKind::NotFound, format!("chain artifact `{}` missing", path.display()))
                .with_path(path));
        }
    }

    let merge_dir = tempfile::tempdir().map_err(Error::from)?;
    extract_chain(&chain, merge_dir.path(), key_path)?;

    let metadata_path = merge_dir.path().join(METADATA_FILENAME);
    let mut metadata = Metadata::from_json(&std::fs::read(&metadata_path)?)?;
    metadata.backup_type = BackupType::Full;
    metadata.base_backup = String::new();
    metadata.changed_files_only = false;
    metadata.timestamp = Local::now();
    std::fs::write(&metadata_path, metadata.to_json()?)?;

    let name = format!("{}-optimized", new_backup_name());
    std::fs::create_dir_all(output_dir)?;
    let plain_path = output_dir.join(format!("{name}.tar.gz"));
    Archiver::create(merge_dir.path(), &plain_path, &[])?;

    let final_path = if let Some(key_path) = key_path {
        let sealed_path = output_dir.join(format!("{name}.tar.gz.age"));
        Encryptor::new(key_path).encrypt(&plain_path, &sealed_path)?;
        std::fs::remove_file(&plain_path)?;
        sealed_path
    } else {
        plain_path
    };

    if !keep_chain {
        for path in chain.ordered() {
            let _ = std::fs::remove_file(&path);
            if let Some((name, _)) = registry.find_by_path(&path) {
                registry.remove_backup(&name);
            }
        }
    }

    registry.register_backup(&name, &final_path, BackupType::Full, "")?;

    Ok(OptimizeOutcome::Merged(final_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_archive(dir: &Path, name: &str, files: &[(&str, &[u8])], meta: &Metadata) -> PathBuf {
        let staging = tempfile::tempdir().unwrap();
        std::fs::write(staging.path().join(METADATA_FILENAME), meta.to_json().unwrap()).unwrap();
        for (relative, bytes) in files {
            let dest = staging.path().join(relative);
            std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
            std::fs::write(dest, bytes).unwrap();
        }
        let path = dir.join(name);
        Archiver::create(staging.path(), &path, &[]).unwrap();
        path
    }

    #[test]
    fn already_optimal_when_chain_has_no_incrementals() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        let meta = Metadata::new_full("h", "u");
        let full = write_archive(dir.path(), "full-1.tar.gz", &[("dotfiles/.zshrc", b"x")], &meta);
        registry.register_backup("full-1", &full, BackupType::Full, "").unwrap();

        let outcome = optimize(&registry, &full, dir.path(), None, false).unwrap();
        assert!(matches!(outcome, OptimizeOutcome::AlreadyOptimal));
    }

    #[test]
    fn merges_chain_and_updates_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();

        let full_meta = Metadata::new_full("h", "u");
        let full =
            write_archive(dir.path(), "full-1.tar.gz", &[("dotfiles/.zshrc", b"base")], &full_meta);
        registry.register_backup("full-1", &full, BackupType::Full, "").unwrap();

        let incr1_meta = Metadata::new_incremental("h", "u", "full-1");
        let incr1 =
            write_archive(dir.path(), "incr-1.tar.gz", &[("dotfiles/.vimrc", b"v1")], &incr1_meta);
        registry.register_backup("incr-1", &incr1, BackupType::Incremental, "full-1").unwrap();

        let incr2_meta = Metadata::new_incremental("h", "u", "incr-1");
        let incr2 =
            write_archive(dir.path(), "incr-2.tar.gz", &[("dotfiles/.zshrc", b"updated")], &incr2_meta);
        registry.register_backup("incr-2", &incr2, BackupType::Incremental, "incr-1").unwrap();

        let output_dir = tempfile::tempdir().unwrap();
        let outcome = optimize(&registry, &incr2, output_dir.path(), None, false).unwrap();

        let merged_path = match outcome {
            OptimizeOutcome::Merged(path) => path,
            OptimizeOutcome::AlreadyOptimal => panic!("expected a merge"),
        };
        assert!(merged_path.is_file());

        assert!(!full.exists());
        assert!(!incr1.exists());
        assert!(!incr2.exists());

        assert!(registry.get_backup("full-1").is_none());
        assert!(registry.get_backup("incr-1").is_none());
        assert!(registry.get_backup("incr-2").is_none());

        let (_, entry) = registry.find_by_path(&merged_path).unwrap();
        assert_eq!(entry.backup_type, BackupType::Full);
    }

    #[test]
    fn keep_chain_preserves_original_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();

        let full_meta = Metadata::new_full("h", "u");
        let full = write_archive(dir.path(), "full-1.tar.gz", &[("dotfiles/.zshrc", b"base")], &full_meta);
        registry.register_backup("full-1", &full, BackupType::Full, "").unwrap();

        let incr_meta = Metadata::new_incremental("h", "u", "full-1");
        let incr = write_archive(dir.path(), "incr-1.tar.gz", &[("dotfiles/.vimrc", b"v1")], &incr_meta);
        registry.register_backup("incr-1", &incr, BackupType::Incremental, "full-1").unwrap();

        let output_dir = tempfile::tempdir().unwrap();
        optimize(&registry, &incr, output_dir.path(), None, true).unwrap();

        assert!(full.exists());
        assert!(incr.exists());
    }
}
