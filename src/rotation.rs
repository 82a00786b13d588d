//! Pruning old artifacts from a backup directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::registry::BackupRegistry;

/// One artifact found in a backup directory, with its modification time.
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last-modified time.
    pub mtime: DateTime<Local>,
}

/// List every `.tar.gz`/`.tar.gz.age` artifact under `dir`, newest first by
/// mtime.
pub fn list_artifacts(dir: &Path) -> Result<Vec<ArtifactEntry>> {
    let mut entries = Vec::new();
    if !dir.is_dir() {
        return Ok(entries);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.ends_with(".tar.gz") || name.ends_with(".tar.gz.age")) {
            continue;
        }
        let stat = entry.metadata()?;
        let mtime: DateTime<Local> = stat.modified().unwrap_or(SystemTime::UNIX_EPOCH).into();
        entries.push(ArtifactEntry { path: entry.path(), size: stat.len(), mtime });
    }
    entries.sort_by(|a, b| b.mtime.cmp(&a.mtime));
    Ok(entries)
}

/// Registered name for `path`, used to remove the companion registry entry
/// in the same transaction as deleting the artifact.
fn registry_name_for(registry: &BackupRegistry, path: &Path) -> Option<String> {
    registry.find_by_path(path).map(|(name, _)| name)
}

fn delete_artifact(registry: &BackupRegistry, entry: &ArtifactEntry) -> Result<()> {
    std::fs::remove_file(&entry.path)?;
    if let Some(name) = registry_name_for(registry, &entry.path) {
        registry.remove_backup(&name);
    }
    Ok(())
}

/// Keep only the `keep` newest artifacts in `dir`, deleting the rest along
/// with their registry entries. Returns the deleted paths.
pub fn rotate_by_count(dir: &Path, registry: &BackupRegistry, keep: usize) -> Result<Vec<PathBuf>> {
    let entries = list_artifacts(dir)?;
    let mut deleted = Vec::new();
    for entry in entries.into_iter().skip(keep) {
        delete_artifact(registry, &entry)?;
        deleted.push(entry.path);
    }
    Ok(deleted)
}

/// Delete every artifact in `dir` older than `max_age`. Returns the deleted
/// paths.
pub fn rotate_by_age(
    dir: &Path,
    registry: &BackupRegistry,
    max_age: chrono::Duration,
) -> Result<Vec<PathBuf>> {
    let cutoff = Local::now() - max_age;
    let entries = list_artifacts(dir)?;
    let mut deleted = Vec::new();
    for entry in entries {
        if entry.mtime < cutoff {
            delete_artifact(registry, &entry)?;
            deleted.push(entry.path);
        }
    }
    Ok(deleted)
}

/// Iterate newest-first, keeping artifacts until adding the next one would
/// exceed `max_size_bytes`; delete everything after that point.
pub fn rotate_by_size(
    dir: &Path,
    registry: &BackupRegistry,
    max_size_bytes: u64,
) -> Result<Vec<PathBuf>> {
    let entries = list_artifacts(dir)?;
    let mut accumulated = 0u64;
    let mut deleted = Vec::new();
    for entry in entries {
        if accumulated + entry.size > max_size_bytes {
            delete_artifact(registry, &entry)?;
            deleted.push(entry.path);
        } else {
            accumulated += entry.size;
        }
    }
    Ok(deleted)
}
