//! Global catalog mapping backup name to artifact location, used to resolve
//! restore chains.
//!
//! Same persistence discipline as [`crate::incremental::IncrementalIndex`]:
//! a single JSON file, guarded in-memory by a `RwLock` and written back via
//! atomic rename. The registry is append-mostly: entries are removed only
//! by Rotation or Optimize, never rewritten in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::metadata::BackupType;
use crate::util::atomic_write;

/// One registered artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// Absolute path to the sealed artifact on disk.
    pub path: PathBuf,
    /// Full or incremental.
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    /// Parent artifact name; empty for a full backup.
    pub base: String,
    /// When this entry was registered.
    pub timestamp: DateTime<Local>,
}

/// Default filename for the registry, relative to the user's home directory.
pub const REGISTRY_FILENAME: &str = ".stash-registry.json";

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_version")]
    version: String,
    backups: BTreeMap<String, BackupEntry>,
}

fn default_version() -> String {
    "1".to_string()
}

/// Global catalog of every known backup artifact.
pub struct BackupRegistry {
    path: PathBuf,
    inner: RwLock<RegistryFile>,
}

impl BackupRegistry {
    /// Load the registry from `path`, or start empty if it doesn't exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.is_file() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            RegistryFile { version: default_version(), backups: BTreeMap::new() }
        };
        Ok(BackupRegistry { path, inner: RwLock::new(inner) })
    }

    /// Persist the whole registry atomically.
    pub fn save(&self) -> Result<()> {
        let guard = self.inner.read().expect("registry lock poisoned");
        let bytes = serde_json::to_vec_pretty(&*guard)?;
        atomic_write(&self.path, &bytes)
    }

    /// Register a new artifact. A full entry must carry an empty `base`; an
    /// incremental entry's `base` must already be registered. Violating
    /// either is a programmer error in the Orchestrator, surfaced as
    /// [`ErrorKind::Config`].
    pub fn register_backup(
        &self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        backup_type: BackupType,
        base: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        let base = base.into();

        {
            let guard = self.inner.read().expect("registry lock poisoned");
            match backup_type {
                BackupType::Full if !base.is_empty() => {
                    return Err(Error::new(
                        ErrorKind::Config,
                        format!("full backup `{name}` must not reference a base"),
                    ));
                }
                BackupType::Incremental if !guard.backups.contains_key(&base) => {
                    return Err(Error::new(
                        ErrorKind::Config,
                        format!("incremental backup `{name}` references unknown base `{base}`"),
                    ));
                }
                _ => {}
            }
        }

        let mut guard = self.inner.write().expect("registry lock poisoned");
        guard.backups.insert(
            name,
            BackupEntry { path: path.into(), backup_type, base, timestamp: Local::now() },
        );
        Ok(())
    }

    /// Look up a registered backup by name.
    pub fn get_backup(&self, name: &str) -> Option<BackupEntry> {
        self.inner.read().expect("registry lock poisoned").backups.get(name).cloned()
    }

    /// Remove a registered backup, e.g. after Rotation deletes its artifact.
    pub fn remove_backup(&self, name: &str) -> Option<BackupEntry> {
        self.inner.write().expect("registry lock poisoned").backups.remove(name)
    }

    /// All registered names, for diagnostics and `stash list`.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().expect("registry lock poisoned").backups.keys().cloned().collect()
    }

    /// Find the registered name for an artifact path, if any. Used by
    /// Restore's legacy fallback to check whether an artifact is known
    /// before treating it as an untracked full backup.
    pub fn find_by_path(&self, path: &Path) -> Option<(String, BackupEntry)> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .backups
            .iter()
            .find(|(_, entry)| entry.path == path)
            .map(|(name, entry)| (name.clone(), entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        assert!(registry.names().is_empty());
    }

    #[test]
    fn register_and_get_full_backup() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        registry
            .register_backup("backup-1", "/var/backups/backup-1.tar.gz", BackupType::Full, "")
            .unwrap();
        let entry = registry.get_backup("backup-1").unwrap();
        assert_eq!(entry.base, "");
        assert_eq!(entry.backup_type, BackupType::Full);
    }

    #[test]
    fn full_backup_with_nonempty_base_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        let err = registry
            .register_backup("backup-1", "/x", BackupType::Full, "backup-0")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn incremental_backup_requires_known_base() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        let err = registry
            .register_backup("backup-2", "/x", BackupType::Incremental, "backup-1")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn incremental_backup_with_known_base_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        registry.register_backup("backup-1", "/x", BackupType::Full, "").unwrap();
        registry
            .register_backup("backup-2", "/y", BackupType::Incremental, "backup-1")
            .unwrap();
        assert!(registry.get_backup("backup-2").is_some());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        {
            let registry = BackupRegistry::load(&path).unwrap();
            registry.register_backup("backup-1", "/x", BackupType::Full, "").unwrap();
            registry.save().unwrap();
        }
        let reloaded = BackupRegistry::load(&path).unwrap();
        assert_eq!(reloaded.names(), vec!["backup-1".to_string()]);
    }

    #[test]
    fn remove_backup_drops_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        registry.register_backup("backup-1", "/x", BackupType::Full, "").unwrap();
        assert!(registry.remove_backup("backup-1").is_some());
        assert!(registry.get_backup("backup-1").is_none());
    }

    #[test]
    fn find_by_path_locates_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackupRegistry::load(dir.path().join("registry.json")).unwrap();
        registry
            .register_backup("backup-1", "/var/backups/backup-1.tar.gz", BackupType::Full, "")
            .unwrap();
        let (name, _) = registry.find_by_path(Path::new("/var/backups/backup-1.tar.gz")).unwrap();
        assert_eq!(name, "backup-1");
    }
}
