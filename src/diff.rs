//! Comparison between two backup artifacts' manifests.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backuputil::read_metadata;
use crate::error::Result;
use crate::metadata::FileInfo;

/// One file present on only one side of a diff, or changed between sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Source path, as recorded in `FileInfo::original_path`.
    pub original_path: PathBuf,
    /// Size on the side this entry represents (or the newer side, for modified entries).
    pub size: u64,
    /// Signed size delta (`new - old`), only meaningful for modified entries.
    pub size_delta: i64,
}

/// A single package manager's count delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageChange {
    /// Collector tag, e.g. `homebrew`.
    pub name: String,
    /// Count on the older side (0 if absent).
    pub old: u64,
    /// Count on the newer side (0 if absent).
    pub new: u64,
    /// Signed delta (`new - old`).
    pub delta: i64,
}

/// Output of comparing two backups' manifests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupDiff {
    /// Present only on the newer side.
    pub added_files: Vec<DiffEntry>,
    /// Present only on the older side.
    pub removed_files: Vec<DiffEntry>,
    /// Present on both sides with a differing size or checksum.
    pub modified_files: Vec<DiffEntry>,
    /// Present on both sides, unchanged.
    pub unchanged_count: usize,
    /// Sum of `added_files` sizes.
    pub added_size: u64,
    /// Sum of `removed_files` sizes.
    pub removed_size: u64,
    /// Sum of absolute `size_delta` across `modified_files`.
    pub modified_size: u64,
    /// Per-package-manager count deltas, for managers present on either side.
    pub package_changes: Vec<PackageChange>,
}

impl BackupDiff {
    /// The `n` largest added files, by size.
    pub fn top_added(&self, n: usize) -> Vec<&DiffEntry> {
        let mut entries: Vec<&DiffEntry> = self.added_files.iter().collect();
        entries.sort_by(|a, b| b.size.cmp(&a.size));
        entries.truncate(n);
        entries
    }

    /// The `n` largest modified files, by absolute size delta.
    pub fn top_modified(&self, n: usize) -> Vec<&DiffEntry> {
        let mut entries: Vec<&DiffEntry> = self.modified_files.iter().collect();
        entries.sort_by(|a, b| b.size_delta.abs().cmp(&a.size_delta.abs()));
        entries.truncate(n);
        entries
    }
}

/// Compare the manifests of two artifacts.
pub fn diff_artifacts(a: &Path, b: &Path, key_path: Option<&Path>) -> Result<BackupDiff> {
    let meta_a = read_metadata(a, key_path)?;
    let meta_b = read_metadata(b, key_path)?;
    Ok(diff_metadata(&meta_a.files, &meta_a.package_counts, &meta_b.files, &meta_b.package_counts))
}

fn diff_metadata(
    files_a: &[FileInfo],
    packages_a: &BTreeMap<String, u64>,
    files_b: &[FileInfo],
    packages_b: &BTreeMap<String, u64>,
) -> BackupDiff {
    let map_a: HashMap<&PathBuf, &FileInfo> =
        files_a.iter().filter(|f| !f.is_dir).map(|f| (&f.original_path, f)).collect();
    let map_b: HashMap<&PathBuf, &FileInfo> =
        files_b.iter().filter(|f| !f.is_dir).map(|f| (&f.original_path, f)).collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    let mut unchanged_count = 0;

    for (path, file_b) in &map_b {
        match map_a.get(path) {
            None => added.push(DiffEntry {
                original_path: (*path).clone(),
                size: file_b.size,
                size_delta: file_b.size as i64,
            }),
            Some(file_a) => {
                let changed = file_a.size != file_b.size || file_a.checksum != file_b.checksum;
                if changed {
                    modified.push(DiffEntry {
                        original_path: (*path).clone(),
                        size: file_b.size,
                        size_delta: file_b.size as i64 - file_a.size as i64,
                    });
                } else {
                    unchanged_count += 1;
                }
            }
        }
    }

    let mut removed = Vec::new();
    for (path, file_a) in &map_a {
        if !map_b.contains_key(path) {
            removed.push(DiffEntry {
                original_path: (*path).clone(),
                size: file_a.size,
                size_delta: -(file_a.size as i64),
            });
        }
    }

    added.sort_by(|x, y| x.original_path.cmp(&y.original_path));
    removed.sort_by(|x, y| x.original_path.cmp(&y.original_path));
    modified.sort_by(|x, y| x.original_path.cmp(&y.original_path));

    let added_size = added.iter().map(|e| e.size).sum();
    let removed_size = removed.iter().map(|e| e.size).sum();
    let modified_size = modified.iter().map(|e| e.size_delta.unsigned_abs()).sum();

    let mut names: Vec<&String> = packages_a.keys().chain(packages_b.keys()).collect();
    names.sort();
    names.dedup();
    let package_changes = names
        .into_iter()
        .filter_map(|name| {
            let old = *packages_a.get(name).unwrap_or(&0);
            let new = *packages_b.get(name).unwrap_or(&0);
            if old == new {
                return None;
            }
            Some(PackageChange { name: name.clone(), old, new, delta: new as i64 - old as i64 })
        })
        .collect();

    BackupDiff {
        added_files: added,
        removed_files: removed,
        modified_files: modified,
        unchanged_count,
        added_size,
        removed_size,
        modified_size,
        package_changes,
    }
}
