//! Per-backup manifest.
//!
//! One `Metadata` is built up in memory over the course of a backup run,
//! serialized as `metadata.json` inside the sealed archive, and from then on
//! treated as immutable for the lifetime of the artifact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fixed top-level category prefixes an archive may contain.
pub const CATEGORY_PREFIXES: &[&str] = &[
    "dotfiles",
    "ssh",
    "gpg",
    "aws",
    "config",
    "env-files",
    "pem-files",
    "packages",
    "macos-defaults",
    "shell-history",
    "browser-data",
    "git-repos",
    "fonts",
    "docker",
    "kubernetes",
];

/// One collected path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Absolute or home-relative source path.
    pub original_path: PathBuf,
    /// Path inside the archive, under one of [`CATEGORY_PREFIXES`].
    pub backup_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// POSIX permission bits.
    pub mode: u32,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Optional content hash, used by Diff as a tie-break.
    pub checksum: Option<String>,
}

impl FileInfo {
    /// `true` if `backup_path` is relative, has no `..` segment, and is
    /// rooted at a known category prefix.
    pub fn has_valid_backup_path(&self) -> bool {
        if self.backup_path.is_absolute() {
            return false;
        }
        if self
            .backup_path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return false;
        }
        let Some(std::path::Component::Normal(first)) = self.backup_path.components().next()
        else {
            return false;
        };
        CATEGORY_PREFIXES.iter().any(|p| first == *p)
    }
}

/// Backup type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    /// Contains every collected source, regardless of staleness.
    Full,
    /// Contains only files changed since `base_backup`.
    Incremental,
}

/// Per-run statistics, finalized after packaging/sealing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Sum of staged file sizes before compression.
    pub backup_size: u64,
    /// Size of the `.tar.gz` artifact.
    pub compressed_size: u64,
    /// Size of the `.tar.gz.age` artifact, if sealed.
    pub encrypted_size: u64,
    /// Wall-clock duration of the whole run, in milliseconds.
    pub total_duration_ms: u64,
}

/// One backup's manifest, serialized as `metadata.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    /// Schema version.
    pub version: String,
    /// When the backup started.
    pub timestamp: chrono::DateTime<chrono::Local>,
    /// Host the backup was taken on.
    pub hostname: String,
    /// User the backup was taken as.
    pub username: String,
    /// Every collected path.
    pub files: Vec<FileInfo>,
    /// Per-collector package counts (e.g. `homebrew` -> 103).
    pub package_counts: BTreeMap<String, u64>,
    /// Full or incremental.
    pub backup_type: BackupType,
    /// Name of the parent artifact; empty unless `backup_type` is `Incremental`.
    pub base_backup: String,
    /// True iff `backup_type` is `Incremental`.
    pub changed_files_only: bool,
    /// Post-hoc statistics.
    #[serde(default)]
    pub stats: Stats,
}

/// Current schema version written into every `metadata.json`.
pub const METADATA_VERSION: &str = "1";

/// Name of the manifest file inside an archive.
pub const METADATA_FILENAME: &str = "metadata.json";

/// Name of the human-readable readme inside an archive, ignored on restore.
pub const README_FILENAME: &str = "README.txt";

impl Metadata {
    /// Start a new, empty manifest for a full backup.
    pub fn new_full(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Metadata {
            version: METADATA_VERSION.to_string(),
            timestamp: chrono::Local::now(),
            hostname: hostname.into(),
            username: username.into(),
            files: Vec::new(),
            package_counts: BTreeMap::new(),
            backup_type: BackupType::Full,
            base_backup: String::new(),
            changed_files_only: false,
            stats: Stats::default(),
        }
    }

    /// Start a new, empty manifest for an incremental backup based on `base_backup`.
    pub fn new_incremental(
        hostname: impl Into<String>,
        username: impl Into<String>,
        base_backup: impl Into<String>,
    ) -> Self {
        Metadata {
            backup_type: BackupType::Incremental,
            base_backup: base_backup.into(),
            changed_files_only: true,
            ..Metadata::new_full(hostname, username)
        }
    }

    /// Append one collected file. Collectors call this after staging a path;
    /// concurrent calls are expected, so this takes `&self` behind a lock
    /// rather than `&mut self`, see [`SharedMetadata`].
    pub fn add_file(&mut self, file: FileInfo) {
        self.files.push(file);
    }

    /// Record (or overwrite) a package count for a collector tag. This is
    /// explicitly last-write-wins; collectors must not race on the same
    /// name, which the `SharedMetadata` mutex enforces at the process level
    /// without adding cross-collector synchronization.
    pub fn set_package_count(&mut self, name: impl Into<String>, count: u64) {
        self.package_counts.insert(name.into(), count);
    }

    /// Sum of non-directory file sizes, used to validate the
    /// `sum(size) <= backup_size` invariant.
    pub fn total_file_size(&self) -> u64 {
        self.files.iter().filter(|f| !f.is_dir).map(|f| f.size).sum()
    }

    /// Serialize to pretty JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Render the plaintext `README.txt` companion written alongside
    /// `metadata.json` in every archive.
    pub fn render_readme(&self) -> String {
        format!(
            "stash backup\n\
             =============\n\
             host: {}\n\
             user: {}\n\
             taken: {}\n\
             type: {:?}\n\
             files: {}\n\
             \n\
             This archive was produced by stash. metadata.json in this\n\
             archive's root describes every collected file; this file is\n\
             informational only and is ignored on restore.\n",
            self.hostname,
            self.username,
            self.timestamp,
            self.backup_type,
            self.files.len(),
        )
    }
}

/// Thread-safe handle to a [`Metadata`] shared across concurrently running
/// collectors, serialized by a mutex.
#[derive(Debug)]
pub struct SharedMetadata(Mutex<Metadata>);

impl SharedMetadata {
    /// Wrap a manifest for concurrent access.
    pub fn new(metadata: Metadata) -> Self {
        SharedMetadata(Mutex::new(metadata))
    }

    /// Append a file under lock.
    pub fn add_file(&self, file: FileInfo) {
        self.0.lock().expect("metadata lock poisoned").add_file(file);
    }

    /// Set a package count under lock.
    pub fn set_package_count(&self, name: impl Into<String>, count: u64) {
        self.0
            .lock()
            .expect("metadata lock poisoned")
            .set_package_count(name, count);
    }

    /// Consume the wrapper, returning the inner manifest.
    pub fn into_inner(self) -> Metadata {
        self.0.into_inner().expect("metadata lock poisoned")
    }
}

/// Compute a SHA-256 checksum for a regular file, used as Diff's tie-break
/// and stored as `FileInfo::checksum`. Returns `None` for anything that
/// isn't a readable regular file rather than failing the whole collector.
pub fn checksum_file(path: &Path) -> Option<String> {
    use sha2::{Digest, Sha256};
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}
