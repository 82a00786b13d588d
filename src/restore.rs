//! Restoring a backup artifact, possibly at the end of an incremental
//! chain, back onto the filesystem.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::Archiver;
use crate::backuputil::{is_encrypted, read_metadata};
use crate::encrypt::Encryptor;
use crate::error::{Error, ErrorKind, Result};
use crate::metadata::{BackupType, Metadata};
use crate::registry::BackupRegistry;
use crate::util::expand_home;

/// An ordered chain of artifacts: a full backup followed by zero or more
/// incrementals, such that applying them in order reconstructs the latest
/// state.
#[derive(Debug, Clone)]
pub struct RestoreChain {
    /// The base full backup.
    pub full: PathBuf,
    /// Incrementals in application order (oldest first).
    pub incrementals: Vec<PathBuf>,
}

impl RestoreChain {
    /// All artifacts in the order they must be extracted: full first, then
    /// incrementals oldest-to-newest.
    pub fn ordered(&self) -> Vec<PathBuf> {
        let mut out = vec![self.full.clone()];
        out.extend(self.incrementals.iter().cloned());
        out
    }
}

/// Resolve the chain of artifacts required to restore `artifact`, using
/// `registry` as the authoritative source.
///
/// Unregistered encrypted artifacts are treated as full backups (legacy
/// fallback) with a warning; see the corresponding DESIGN.md Open Question
/// decision.
pub fn get_restore_chain(registry: &BackupRegistry, artifact: &Path) -> Result<RestoreChain> {
    let Some((name, entry)) = registry.find_by_path(artifact) else {
        if is_encrypted(artifact) {
            warn!(artifact = %artifact.display(), "artifact not in registry, treating as full backup (legacy fallback)");
            return Ok(RestoreChain { full: artifact.to_path_buf(), incrementals: Vec::new() });
        }
        return Err(Error::new(
            ErrorKind::Config,
            format!("artifact `{}` is not registered and is not encrypted", artifact.display()),
        )
        .with_path(artifact));
    };

    match entry.backup_type {
        BackupType::Full => Ok(RestoreChain { full: entry.path, incrementals: Vec::new() }),
        BackupType::Incremental => {
            let base_entry = registry.get_backup(&entry.base).ok_or_else(|| {
                Error::new(ErrorKind::Config, format!("backup `{name}` references unknown base `{}`", entry.base))
            })?;
            let mut chain = resolve_from(registry, &entry.base, base_entry.path)?;
            chain.incrementals.push(entry.path);
            Ok(chain)
        }
    }
}

fn resolve_from(registry: &BackupRegistry, name: &str, path: PathBuf) -> Result<RestoreChain> {
    let entry = registry
        .get_backup(name)
        .ok_or_else(|| Error::new(ErrorKind::Config, format!("unknown backup `{name}`")))?;
    match entry.backup_type {
        BackupType::Full => Ok(RestoreChain { full: path, incrementals: Vec::new() }),
        BackupType::Incremental => {
            let base_entry = registry.get_backup(&entry.base).ok_or_else(|| {
                Error::new(ErrorKind::Config, format!("backup `{name}` references unknown base `{}`", entry.base))
            })?;
            let mut chain = resolve_from(registry, &entry.base, base_entry.path)?;
            chain.incrementals.push(path);
            Ok(chain)
        }
    }
}

/// Extract every artifact in `chain`, in order, into `dest`; later
/// artifacts overwrite earlier ones (the same last-writer-wins semantics
/// Optimize relies on when merging a chain).
pub fn extract_chain(chain: &RestoreChain, dest: &Path, key_path: Option<&Path>) -> Result<()> {
    for artifact in chain.ordered() {
        if !artifact.is_file() {
            return Err(Error::new(ErrorKind::NotFound, format!("artifact `{}` does not exist", artifact.display()))
                .with_path(&artifact));
        }
        if is_encrypted(&artifact) {
            let key_path = key_path.ok_or_else(|| Error::encryption_key_missing("~/.stash.key"))?;
            let tmp = tempfile::NamedTempFile::new().map_err(Error::from)?;
            Encryptor::new(key_path).decrypt(&artifact, tmp.path())?;
            Archiver::extract(tmp.path(), dest)?;
        } else {
            Archiver::extract(&artifact, dest)?;
        }
    }
    Ok(())
}

/// Outcome of a restore run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestoreReport {
    /// Files written to their original location.
    pub restored: usize,
    /// Files skipped due to an existing, un-confirmed conflict.
    pub skipped: usize,
}

/// Conflict policy for existing destination files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Always overwrite.
    Overwrite,
    /// Never overwrite an existing file.
    Skip,
}

/// Restore `artifact` (resolving its chain via `registry`) onto the
/// filesystem.
pub fn restore(
    registry: &BackupRegistry,
    artifact: &Path,
    key_path: Option<&Path>,
    conflict_policy: ConflictPolicy,
    dry_run: bool,
) -> Result<RestoreReport> {
    let chain = get_restore_chain(registry, artifact)?;
    let extract_dir = tempfile::tempdir().map_err(Error::from)?;
    extract_chain(&chain, extract_dir.path(), key_path)?;

    let metadata_bytes = std::fs::read(extract_dir.path().join(crate::metadata::METADATA_FILENAME))?;
    let metadata = Metadata::from_json(&metadata_bytes)?;

    let mut report = RestoreReport::default();
    for file in &metadata.files {
        let dest = expand_home(&file.original_path);
        let src = extract_dir.path().join(&file.backup_path);
        if !src.exists() {
            warn!(path = %file.backup_path.display(), "staged path missing from extracted chain, skipping");
            continue;
        }

        if dest.exists() && conflict_policy == ConflictPolicy::Skip {
            report.skipped += 1;
            continue;
        }

        if dry_run {
            report.restored += 1;
            continue;
        }

        if file.is_dir {
            Archiver::copy_dir(&src, &dest, &[])?;
        } else {
            Archiver::copy_file(&src, &dest)?;
            set_mode(&dest, file.mode);
        }
        report.restored += 1;
    }

    info!(restored = report.restored, skipped = report.skipped, "restore complete");
    Ok(report)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode));
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}

/// Read an artifact's manifest without performing a full restore, used by
/// `stash list`/diagnostics.
pub fn describe(artifact: &Path, key_path: Option<&Path>) -> Result<Metadata> {
    read_metadata(artifact, key_path)
}
