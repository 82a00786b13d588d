//! The ambient configuration model consumed by collectors and the
//! orchestrator.
//!
//! Loaded from `~/.stash.yaml`, the same `serde_yaml`-over-a-dotfile shape
//! the teacher uses for its own catalog/metadata files. A missing file or
//! missing keys fall back to defaults; this is never a hard error, since
//! `stash backup` should work out of the box on a fresh machine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::{expand_home, parse_interval};

const DEFAULT_CONFIG_FILENAME: &str = ".stash.yaml";
const DEFAULT_KEY_FILENAME: &str = ".stash.key";
const DEFAULT_INDEX_FILENAME: &str = ".stash-index.json";
const DEFAULT_FULL_BACKUP_INTERVAL: &str = "7d";

/// Per-category collector toggles.
///
/// Absent categories default to enabled; only explicit `false` entries
/// disable a collector. `extra_includes` are additional glob patterns a
/// collector may fold into its fixed candidate list; collectors that
/// don't support extras simply ignore them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    /// `category name -> enabled`. Missing entries mean enabled.
    pub enabled: HashMap<String, bool>,
    /// Extra include globs, keyed by category name.
    pub extra_includes: HashMap<String, Vec<String>>,
}

impl CollectorsConfig {
    /// Names of every category explicitly disabled.
    pub fn disabled_names(&self) -> Vec<String> {
        self.enabled
            .iter()
            .filter(|(_, &on)| !on)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// The full ambient configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    /// Humantime-like duration string (`"7d"`, `"12h"`) after which the next
    /// run is forced to a full backup.
    pub full_backup_interval: String,
    /// Whether a run is incremental by default when no full backup is due.
    pub incremental_by_default: bool,
    /// Extra exclusion globs, merged with the Archiver's canonical defaults.
    pub exclusions: Vec<String>,
    /// Per-category collector configuration.
    pub collectors: CollectorsConfig,
    /// Identity file path; `None` falls back to `~/.stash.key`.
    pub key_path: Option<PathBuf>,
    /// Directory backups are written into.
    pub backup_dir: Option<PathBuf>,
    /// `BackupRegistry` path; `None` falls back to `~/.stash-registry.json`.
    pub registry_path: Option<PathBuf>,
    /// `IncrementalIndex` path; `None` falls back to `~/.stash-index.json`.
    pub index_path: Option<PathBuf>,
}

impl Default for StashConfig {
    fn default() -> Self {
        StashConfig {
            full_backup_interval: DEFAULT_FULL_BACKUP_INTERVAL.to_string(),
            incremental_by_default: false,
            exclusions: Vec::new(),
            collectors: CollectorsConfig::default(),
            key_path: None,
            backup_dir: None,
            registry_path: None,
            index_path: None,
        }
    }
}

impl StashConfig {
    /// Default config file location, `~/.stash.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(DEFAULT_CONFIG_FILENAME)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    /// Malformed YAML is still a `Config` error: a present but broken file
    /// is a user mistake worth surfacing, unlike a simply-missing one.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(StashConfig::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: StashConfig = serde_yaml::from_str(&raw).map_err(|e| {
            crate::error::Error::new(crate::error::ErrorKind::Config, format!("malformed config: {e}"))
                .with_path(path)
                .with_suggestion("regenerate ~/.stash.yaml or fix the offending key")
        })?;
        Ok(config)
    }

    /// Load from the default path (`~/.stash.yaml`).
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    /// Parsed `full_backup_interval`, falling back to the default on a bad
    /// string rather than failing the whole config load.
    pub fn full_backup_interval(&self) -> chrono::Duration {
        parse_interval(&self.full_backup_interval)
            .unwrap_or_else(|_| parse_interval(DEFAULT_FULL_BACKUP_INTERVAL).expect("valid default"))
    }

    /// Resolved identity file path.
    pub fn key_path(&self) -> PathBuf {
        self.key_path.clone().unwrap_or_else(|| home_file(DEFAULT_KEY_FILENAME))
    }

    /// Resolved backup directory.
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir.clone().map(|p| expand_home(p)).unwrap_or_else(|| home_file("backups"))
    }

    /// Resolved registry path.
    pub fn registry_path(&self) -> PathBuf {
        self.registry_path.clone().unwrap_or_else(|| home_file(crate::registry::REGISTRY_FILENAME))
    }

    /// Resolved incremental index path.
    pub fn index_path(&self) -> PathBuf {
        self.index_path.clone().unwrap_or_else(|| home_file(DEFAULT_INDEX_FILENAME))
    }
}

fn home_file(name: &str) -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StashConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.full_backup_interval, "7d");
        assert!(!config.incremental_by_default);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stash.yaml");
        std::fs::write(&path, "incremental_by_default: true\n").unwrap();
        let config = StashConfig::load(&path).unwrap();
        assert!(config.incremental_by_default);
        assert_eq!(config.full_backup_interval, "7d");
        assert!(config.exclusions.is_empty());
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stash.yaml");
        std::fs::write(&path, "full_backup_interval: [this, is, a, list]\n").unwrap();
        let err = StashConfig::load(&path).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Config);
    }

    #[test]
    fn disabled_collectors_round_trip() {
        let yaml = "collectors:\n  enabled:\n    docker: false\n    aws: true\n";
        let config: StashConfig = serde_yaml::from_str(yaml).unwrap();
        let disabled = config.collectors.disabled_names();
        assert_eq!(disabled, vec!["docker".to_string()]);
    }

    #[test]
    fn full_backup_interval_parses_humantime() {
        let config = StashConfig { full_backup_interval: "3d".to_string(), ..Default::default() };
        assert_eq!(config.full_backup_interval(), chrono::Duration::days(3));
    }

    #[test]
    fn bad_interval_string_falls_back_to_default() {
        let config = StashConfig { full_backup_interval: "not-a-duration".to_string(), ..Default::default() };
        assert_eq!(config.full_backup_interval(), chrono::Duration::days(7));
    }
}
