//! Shared staging logic used by the simpler, static-candidate-list
//! collectors: a fixed list of candidate source paths, each copied if it
//! exists and has changed, each producing one `FileInfo` per staged path.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::collector::StagingDir;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::{checksum_file, FileInfo, SharedMetadata};

/// Stage every existing, changed candidate (home-relative) under `home`
/// into `staging`, recording one [`FileInfo`] per staged path. Individual
/// I/O failures are logged and skipped rather than aborting the whole
/// collector.
///
/// Returns the number of candidates staged (0 in `dry_run` mode, though
/// eligible candidates are still counted).
pub fn stage_candidates(
    collector_name: &'static str,
    staging: &StagingDir,
    meta: &Arc<SharedMetadata>,
    incr: Option<&IncrementalIndex>,
    home: &Path,
    candidates: &[&str],
    exclusions: &[String],
    dry_run: bool,
) -> Result<usize> {
    let mut staged = 0;

    for candidate in candidates {
        let src = home.join(candidate);
        if !src.exists() {
            continue;
        }
        if let Some(incr) = incr {
            if !incr.has_changed(&src) {
                continue;
            }
        }

        staged += 1;
        if dry_run {
            continue;
        }

        let relative = Path::new(candidate);
        let stat = match std::fs::symlink_metadata(&src) {
            Ok(stat) => stat,
            Err(e) => {
                warn!(collector = collector_name, path = %src.display(), error = %e, "stat failed, skipping");
                continue;
            }
        };
        let is_dir = stat.is_dir();

        let staged_result = if is_dir {
            staging.stage_dir(&src, relative, exclusions)
        } else {
            staging.stage_file(&src, relative)
        };
        if let Err(e) = staged_result {
            warn!(collector = collector_name, path = %src.display(), error = %e.message, "failed to stage, skipping");
            continue;
        }

        let size = if is_dir { dir_size(&src) } else { stat.len() };
        meta.add_file(FileInfo {
            original_path: src.clone(),
            backup_path: staging.backup_path(relative),
            size,
            mode: mode_bits(&stat),
            is_dir,
            checksum: if is_dir { None } else { checksum_file(&src) },
        });
    }

    Ok(staged)
}

/// Write `text` as an opaque staged file, recording one [`FileInfo`]. Used
/// by collectors that capture a command's output rather than a source
/// file (packages enumeration, git-repos listing).
pub fn stage_text(
    staging: &StagingDir,
    meta: &Arc<SharedMetadata>,
    relative_name: &str,
    text: &str,
) -> Result<()> {
    let relative = Path::new(relative_name);
    let dest = crate::pathguard::sanitize(staging.root(), relative)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&dest, text.as_bytes())?;

    meta.add_file(FileInfo {
        original_path: dest.clone(),
        backup_path: staging.backup_path(relative),
        size: text.len() as u64,
        mode: 0o644,
        is_dir: false,
        checksum: None,
    });
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(unix)]
fn mode_bits(stat: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    stat.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(_stat: &std::fs::Metadata) -> u32 {
    0o644
}

/// Run an external command, returning its trimmed stdout on success and
/// `None` on any launch or non-zero-exit failure. Best-effort: failures
/// such as a missing binary or a network error are swallowed, not
/// propagated.
pub fn run_capture(program: &str, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;

    #[test]
    fn stage_candidates_skips_missing_paths() {
        let home = tempfile::tempdir().unwrap();
        let staging_root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(staging_root.path(), "dotfiles").unwrap();
        let meta = Arc::new(SharedMetadata::new(Metadata::new_full("h", "u")));

        let staged = stage_candidates(
            "dotfiles",
            &staging,
            &meta,
            None,
            home.path(),
            &[".zshrc", ".bashrc"],
            &[],
            false,
        )
        .unwrap();
        assert_eq!(staged, 0);
    }

    #[test]
    fn stage_candidates_stages_existing_file() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(".zshrc"), b"alias ll='ls -la'").unwrap();

        let staging_root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(staging_root.path(), "dotfiles").unwrap();
        let meta = Arc::new(SharedMetadata::new(Metadata::new_full("h", "u")));

        let staged = stage_candidates(
            "dotfiles",
            &staging,
            &meta,
            None,
            home.path(),
            &[".zshrc"],
            &[],
            false,
        )
        .unwrap();
        assert_eq!(staged, 1);

        let dest = staging.root().join(".zshrc");
        assert_eq!(std::fs::read(&dest).unwrap(), b"alias ll='ls -la'");
    }

    #[test]
    fn stage_candidates_respects_incremental_skip() {
        let home = tempfile::tempdir().unwrap();
        let file = home.path().join(".zshrc");
        std::fs::write(&file, b"unchanged").unwrap();
        let stat = std::fs::symlink_metadata(&file).unwrap();

        let mut index = crate::incremental::IncrementalIndex::new(home.path().join("index.json"));
        index.add_file(
            file.clone(),
            crate::incremental::Fingerprint {
                size: stat.len(),
                mtime_ns: mode_bits_test_mtime(&stat),
                content_hash: None,
                last_backup_name: "backup-1".into(),
            },
        );

        let staging_root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(staging_root.path(), "dotfiles").unwrap();
        let meta = Arc::new(SharedMetadata::new(Metadata::new_full("h", "u")));

        let staged = stage_candidates(
            "dotfiles",
            &staging,
            &meta,
            Some(&index),
            home.path(),
            &[".zshrc"],
            &[],
            false,
        )
        .unwrap();
        assert_eq!(staged, 0);
    }

    #[cfg(unix)]
    fn mode_bits_test_mtime(stat: &std::fs::Metadata) -> i128 {
        use std::os::unix::fs::MetadataExt;
        stat.mtime() as i128 * 1_000_000_000 + stat.mtime_nsec() as i128
    }

    #[test]
    fn dry_run_counts_without_writing() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(".zshrc"), b"x").unwrap();

        let staging_root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new(staging_root.path(), "dotfiles").unwrap();
        let meta = Arc::new(SharedMetadata::new(Metadata::new_full("h", "u")));

        let staged = stage_candidates(
            "dotfiles",
            &staging,
            &meta,
            None,
            home.path(),
            &[".zshrc"],
            &[],
            true,
        )
        .unwrap();
        assert_eq!(staged, 1);
        assert!(!staging.root().join(".zshrc").exists());
    }
}
