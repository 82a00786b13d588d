//! Durable per-run progress record, so a crashed backup leaves enough
//! evidence for diagnosis and potential resume.
//!
//! One state file per in-progress backup, named after a sanitized form of
//! the backup path, living under `<backup_dir>/.recovery/`. Deleted on
//! successful finalization; left on disk after a crash for external
//! inspection or a future resume feature.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metadata::Metadata;
use crate::util::atomic_write;

/// Subdirectory (relative to the backup directory) holding recovery state.
pub const RECOVERY_SUBDIR: &str = ".recovery";

/// Task name substrings that, once reached, make a failure unrecoverable:
/// once sealing or finalization starts, a partial staging tree cannot be
/// safely resumed.
const UNRECOVERABLE_TASK_MARKERS: &[&str] = &["encrypt", "finalize", "save_metadata"];

/// `true` if a failure during `task` can be recovered by re-running the
/// collector phase, rather than requiring a fresh full backup.
pub fn is_recoverable(task: &str) -> bool {
    !UNRECOVERABLE_TASK_MARKERS.iter().any(|marker| task.contains(marker))
}

/// Per-in-progress-backup crash record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryState {
    /// Path to the artifact being produced.
    pub backup_path: PathBuf,
    /// When this record was created.
    pub timestamp: DateTime<Local>,
    /// Collector/task names that finished successfully.
    pub completed_tasks: Vec<String>,
    /// Name of the task that failed, if any.
    pub failed_task: Option<String>,
    /// Human-readable failure description.
    pub error_message: Option<String>,
    /// Partial manifest captured at the time of failure, if available.
    pub partial_metadata: Option<Metadata>,
    /// Whether the run is resumable from this point.
    pub can_resume: bool,
}

impl RecoveryState {
    /// Start a fresh, empty record for a run producing `backup_path`.
    pub fn new(backup_path: impl Into<PathBuf>) -> Self {
        RecoveryState {
            backup_path: backup_path.into(),
            timestamp: Local::now(),
            completed_tasks: Vec::new(),
            failed_task: None,
            error_message: None,
            partial_metadata: None,
            can_resume: true,
        }
    }
}

/// Durable store for [`RecoveryState`] records.
pub struct RecoveryStore {
    root: PathBuf,
}

impl RecoveryStore {
    /// Bind a store to the `.recovery` subdirectory of `backup_dir`.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        RecoveryStore { root: backup_dir.into().join(RECOVERY_SUBDIR) }
    }

    fn state_path(&self, backup_path: &Path) -> PathBuf {
        let sanitized = sanitize_name(backup_path);
        self.root.join(format!("{sanitized}.recovery.json"))
    }

    /// Persist `state` atomically.
    pub fn save_state(&self, state: &RecoveryState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        atomic_write(self.state_path(&state.backup_path), &bytes)
    }

    /// Load the record for `backup_path`, if one exists.
    pub fn load_state(&self, backup_path: &Path) -> Result<Option<RecoveryState>> {
        let path = self.state_path(backup_path);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Delete the record for `backup_path`, e.g. on successful finalization.
    pub fn delete_state(&self, backup_path: &Path) -> Result<()> {
        let path = self.state_path(backup_path);
        if path.is_file() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Append `task` to `completed_tasks`, creating the record if it
    /// doesn't exist yet.
    pub fn mark_task_complete(&self, backup_path: &Path, task: &str) -> Result<()> {
        let mut state = self
            .load_state(backup_path)?
            .unwrap_or_else(|| RecoveryState::new(backup_path));
        if !state.completed_tasks.iter().any(|t| t == task) {
            state.completed_tasks.push(task.to_string());
        }
        self.save_state(&state)
    }

    /// Record a task failure and derive `can_resume` from its name.
    pub fn mark_task_failed(&self, backup_path: &Path, task: &str, error: &str) -> Result<()> {
        let mut state = self
            .load_state(backup_path)?
            .unwrap_or_else(|| RecoveryState::new(backup_path));
        state.failed_task = Some(task.to_string());
        state.error_message = Some(error.to_string());
        state.can_resume = is_recoverable(task);
        self.save_state(&state)
    }

    /// Enumerate every on-disk record with `can_resume = true`.
    pub fn list_recoverable(&self) -> Result<Vec<RecoveryState>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let Ok(state) = serde_json::from_slice::<RecoveryState>(&bytes) else {
                continue;
            };
            if state.can_resume {
                out.push(state);
            }
        }
        Ok(out)
    }

    /// Purge records older than `max_age`.
    pub fn cleanup_old(&self, max_age: chrono::Duration) -> Result<usize> {
        if !self.root.is_dir() {
            return Ok(0);
        }
        let cutoff = Local::now() - max_age;
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = std::fs::read(&path) else { continue };
            let Ok(state) = serde_json::from_slice::<RecoveryState>(&bytes) else {
                continue;
            };
            if state.timestamp < cutoff {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Turn an artifact path into a filesystem-safe stem for its state file.
fn sanitize_name(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
