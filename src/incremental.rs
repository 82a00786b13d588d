//! Per-host fingerprint cache deciding full-vs-incremental and which files
//! changed.
//!
//! Persisted as a single JSON file, read once at the start of a run and
//! written back via [`crate::util::atomic_write`] at the end, the same
//! whole-file-replace discipline the sibling `BackupRegistry` and
//! `RecoveryStore` catalogs use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::atomic_write;

/// One cached file observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Size in bytes at the time it was last backed up.
    pub size: u64,
    /// Modification time, nanoseconds since the epoch.
    pub mtime_ns: i128,
    /// Optional content hash, set only when a collector opts into checksums.
    pub content_hash: Option<String>,
    /// Name of the backup artifact that last captured this file.
    pub last_backup_name: String,
}

/// Current on-disk schema version.
pub const INDEX_VERSION: &str = "1";

/// Per-host fingerprint cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalIndex {
    #[serde(default = "default_version")]
    version: String,
    files: BTreeMap<PathBuf, Fingerprint>,
    last_backup: Option<DateTime<Local>>,
    last_full_backup: Option<DateTime<Local>>,
    last_full_backup_name: String,

    #[serde(skip)]
    path: PathBuf,
}

fn default_version() -> String {
    INDEX_VERSION.to_string()
}

impl IncrementalIndex {
    /// Build an empty index bound to `path` (not yet persisted).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IncrementalIndex {
            version: INDEX_VERSION.to_string(),
            files: BTreeMap::new(),
            last_backup: None,
            last_full_backup: None,
            last_full_backup_name: String::new(),
            path: path.into(),
        }
    }

    /// Load the index from `path`, or return a fresh empty one if the file
    /// does not exist yet (first run).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Ok(IncrementalIndex::new(path));
        }
        let bytes = std::fs::read(&path)?;
        let mut index: IncrementalIndex = serde_json::from_slice(&bytes)?;
        index.path = path;
        Ok(index)
    }

    /// Persist the index atomically to its bound path.
    pub fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        atomic_write(&self.path, &bytes)
    }

    /// `true` if a full backup should be taken now: either no full backup
    /// has ever run, or `interval` has elapsed since the last one.
    pub fn should_do_full_backup(&self, interval: chrono::Duration) -> bool {
        match self.last_full_backup {
            None => true,
            Some(last) => Local::now() - last > interval,
        }
    }

    /// `true` if `path`'s current on-disk state differs from its cached
    /// fingerprint (a file is unchanged iff its size and mtime both match
    /// the cached values). Missing-from-index and stat failures are both
    /// treated as changed, the latter conservatively.
    pub fn has_changed(&self, path: &Path) -> bool {
        let Some(fingerprint) = self.files.get(path) else {
            return true;
        };
        let stat = match std::fs::symlink_metadata(path) {
            Ok(stat) => stat,
            Err(_) => return true,
        };
        let mtime_ns = match mtime_ns(&stat) {
            Some(v) => v,
            None => return true,
        };
        !(stat.len() == fingerprint.size && mtime_ns == fingerprint.mtime_ns)
    }

    /// Batched form of [`Self::has_changed`].
    pub fn find_changed<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<&'a Path> {
        paths.into_iter().filter(|p| self.has_changed(p)).collect()
    }

    /// Record (or overwrite) the fingerprint for `path`.
    pub fn add_file(&mut self, path: PathBuf, fingerprint: Fingerprint) {
        self.files.insert(path, fingerprint);
    }

    /// Forget a path entirely, e.g. because a collector no longer reports it.
    pub fn remove_file(&mut self, path: &Path) {
        self.files.remove(path);
    }

    /// Stamp a completed full backup.
    pub fn mark_full_backup(&mut self, now: DateTime<Local>, name: impl Into<String>) {
        self.last_full_backup = Some(now);
        self.last_full_backup_name = name.into();
        self.last_backup = Some(now);
    }

    /// Stamp a completed incremental backup.
    pub fn mark_incremental_backup(&mut self, now: DateTime<Local>) {
        self.last_backup = Some(now);
    }

    /// Drop entries whose source path no longer exists, returning how many
    /// were removed.
    pub fn cleanup_old(&mut self) -> usize {
        let before = self.files.len();
        self.files.retain(|path, _| path.exists());
        before - self.files.len()
    }

    /// Build a fingerprint for `path` as it currently stands on disk,
    /// tagged with the artifact that is about to capture it.
    pub fn fingerprint_now(path: &Path, backup_name: impl Into<String>) -> Result<Fingerprint> {
        let stat = std::fs::symlink_metadata(path)?;
        Ok(Fingerprint {
            size: stat.len(),
            mtime_ns: mtime_ns(&stat).unwrap_or(0),
            content_hash: None,
            last_backup_name: backup_name.into(),
        })
    }

    /// Number of cached paths, used by diagnostics and tests.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// `true` if no path has ever been cached.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Name of the most recent full backup, or empty if none has run yet.
    /// Used to stamp `Metadata::base_backup` for an incremental run.
    pub fn last_full_backup_name(&self) -> &str {
        &self.last_full_backup_name
    }
}

#[cfg(unix)]
fn mtime_ns(stat: &std::fs::Metadata) -> Option<i128> {
    use std::os::unix::fs::MetadataExt;
    Some(stat.mtime() as i128 * 1_000_000_000 + stat.mtime_nsec() as i128)
}

#[cfg(not(unix))]
fn mtime_ns(stat: &std::fs::Metadata) -> Option<i128> {
    let modified = stat.modified().ok()?;
    let dur = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(dur.as_nanos() as i128)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, contents: &[u8]) {
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn load_missing_file_returns_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = IncrementalIndex::load(&path).unwrap();
        assert!(index.is_empty());
        assert!(index.should_do_full_backup(chrono::Duration::days(7)));
    }

    #[test]
    fn save_then_load_roundtrips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut index = IncrementalIndex::new(&path);
        index.add_file(
            PathBuf::from("/home/u/.zshrc"),
            Fingerprint { size: 10, mtime_ns: 123, content_hash: None, last_backup_name: "backup-1".into() },
        );
        index.mark_full_backup(Local::now(), "backup-1");
        index.save().unwrap();

        let reloaded = IncrementalIndex::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.last_full_backup_name, "backup-1");
    }

    #[test]
    fn missing_entry_is_changed() {
        let dir = tempfile::tempdir().unwrap();
        let index = IncrementalIndex::new(dir.path().join("index.json"));
        let f = dir.path().join("a.txt");
        touch(&f, b"x");
        assert!(index.has_changed(&f));
    }

    #[test]
    fn unchanged_size_and_mtime_is_not_changed() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.txt");
        touch(&f, b"hello");
        let stat = std::fs::symlink_metadata(&f).unwrap();

        let mut index = IncrementalIndex::new(dir.path().join("index.json"));
        index.add_file(
            f.clone(),
            Fingerprint {
                size: stat.len(),
                mtime_ns: mtime_ns(&stat).unwrap(),
                content_hash: None,
                last_backup_name: "backup-1".into(),
            },
        );
        assert!(!index.has_changed(&f));
    }

    #[test]
    fn changed_size_is_changed() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.txt");
        touch(&f, b"hello");
        let stat = std::fs::symlink_metadata(&f).unwrap();

        let mut index = IncrementalIndex::new(dir.path().join("index.json"));
        index.add_file(
            f.clone(),
            Fingerprint {
                size: stat.len() + 1,
                mtime_ns: mtime_ns(&stat).unwrap(),
                content_hash: None,
                last_backup_name: "backup-1".into(),
            },
        );
        assert!(index.has_changed(&f));
    }

    #[test]
    fn deleted_source_path_is_changed() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("gone.txt");
        let mut index = IncrementalIndex::new(dir.path().join("index.json"));
        index.add_file(
            f.clone(),
            Fingerprint { size: 1, mtime_ns: 1, content_hash: None, last_backup_name: "backup-1".into() },
        );
        assert!(index.has_changed(&f));
    }

    #[test]
    fn should_do_full_backup_after_interval_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = IncrementalIndex::new(dir.path().join("index.json"));
        index.mark_full_backup(Local::now() - chrono::Duration::days(30), "backup-1");
        assert!(index.should_do_full_backup(chrono::Duration::days(7)));
    }

    #[test]
    fn should_not_do_full_backup_within_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = IncrementalIndex::new(dir.path().join("index.json"));
        index.mark_full_backup(Local::now(), "backup-1");
        assert!(!index.should_do_full_backup(chrono::Duration::days(7)));
    }

    #[test]
    fn cleanup_old_drops_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.txt");
        touch(&present, b"x");
        let gone = dir.path().join("gone.txt");

        let mut index = IncrementalIndex::new(dir.path().join("index.json"));
        index.add_file(
            present.clone(),
            Fingerprint { size: 1, mtime_ns: 1, content_hash: None, last_backup_name: "b".into() },
        );
        index.add_file(
            gone,
            Fingerprint { size: 1, mtime_ns: 1, content_hash: None, last_backup_name: "b".into() },
        );

        let removed = index.cleanup_old();
        assert_eq!(removed, 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn find_changed_filters_batch() {
        let dir = tempfile::tempdir().unwrap();
        let unchanged = dir.path().join("unchanged.txt");
        touch(&unchanged, b"stable");
        let stat = std::fs::symlink_metadata(&unchanged).unwrap();
        let changed = dir.path().join("changed.txt");
        touch(&changed, b"new");

        let mut index = IncrementalIndex::new(dir.path().join("index.json"));
        index.add_file(
            unchanged.clone(),
            Fingerprint {
                size: stat.len(),
                mtime_ns: mtime_ns(&stat).unwrap(),
                content_hash: None,
                last_backup_name: "b".into(),
            },
        );

        let result = index.find_changed([unchanged.as_path(), changed.as_path()]);
        assert_eq!(result, vec![changed.as_path()]);
    }
}
