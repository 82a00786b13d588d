//! The backup pipeline: fan out collectors, pack, seal, and update the
//! on-disk catalogs.
//!
//! The fan-out stage generalizes the teacher's `save_panes_content`
//! pattern: "one task per pane" becomes "one task per collector", using
//! the same `async_std::task::spawn` + `futures::future::join_all` shape.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::archive::{Archiver, DEFAULT_EXCLUSIONS};
use crate::collector::StagingDir;
use crate::collectors;
use crate::encrypt::Encryptor;
use crate::error::{Error, Result};
use crate::incremental::{Fingerprint, IncrementalIndex};
use crate::metadata::{BackupType, Metadata, SharedMetadata, Stats, METADATA_FILENAME, README_FILENAME};
use crate::recovery::RecoveryStore;
use crate::registry::BackupRegistry;
use crate::rotation;
use crate::util::new_backup_name;

/// Options controlling one backup run.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Directory backups are written into.
    pub output_dir: PathBuf,
    /// Identity file path; `None` implies `no_encrypt`.
    pub key_path: Option<PathBuf>,
    /// Skip sealing even if a key is available.
    pub no_encrypt: bool,
    /// Stage and report without writing any archive or catalog update.
    pub dry_run: bool,
    /// Skip the largest, slowest-changing category.
    pub skip_browsers: bool,
    /// Collector category names disabled via `Config.collectors`.
    pub disabled_collectors: Vec<String>,
    /// `--force-incremental`: opt into incremental mode for this run.
    pub force_incremental: bool,
    /// `Config.incremental_by_default`: opt into incremental mode by default.
    pub incremental_by_default: bool,
    /// How often a full backup should be retaken.
    pub full_backup_interval: chrono::Duration,
    /// Number of most-recent artifacts to keep after this run; `0` disables rotation.
    pub keep_count: usize,
}

/// Outcome of a completed backup run.
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// Name of the artifact produced (sans directory), e.g. `backup-2026-...`.
    pub name: String,
    /// Full path to the sealed (or plain) artifact.
    pub artifact_path: PathBuf,
    /// Whether this run was incremental.
    pub incremental: bool,
    /// Number of files recorded in the manifest.
    pub file_count: usize,
    /// Collector names that failed their task (still a successful run overall).
    pub failed_collectors: Vec<String>,
    /// Post-hoc statistics computed after sealing; not present inside the
    /// sealed archive's own `metadata.json`, only here.
    pub stats: Stats,
    /// Artifacts deleted by rotation after this run, if `keep_count > 0`.
    pub rotated: Vec<PathBuf>,
}

/// Removes the whole staging tree on any exit: success, early return via
/// `?`, or panic.
struct StagingGuard(PathBuf);

impl Drop for StagingGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Run the full backup pipeline.
pub async fn run(
    options: &BackupOptions,
    home: &Path,
    index: &mut IncrementalIndex,
    registry: &BackupRegistry,
) -> Result<BackupReport> {
    if !options.no_encrypt {
        if let Some(k) = &options.key_path {
            if !Encryptor::new(k).key_exists() {
                return Err(Error::encryption_key_missing(k));
            }
        }
    }

    let started_at = std::time::Instant::now();
    std::fs::create_dir_all(&options.output_dir)?;

    let should_full = index.should_do_full_backup(options.full_backup_interval);
    let do_incremental =
        !should_full && (options.force_incremental || options.incremental_by_default);
    let name = new_backup_name();
    let artifact_base = options.output_dir.join(format!("{name}.tar.gz"));
    let recovery = RecoveryStore::new(&options.output_dir);

    let hostname = hostname_or_unknown();
    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());

    let metadata = if do_incremental {
        Metadata::new_incremental(&hostname, &username, index.last_full_backup_name())
    } else {
        Metadata::new_full(&hostname, &username)
    };
    let shared_meta = Arc::new(SharedMetadata::new(metadata));

    let staging_root = std::env::temp_dir().join(format!("stash-{name}"));
    std::fs::create_dir_all(&staging_root)?;
    let _staging_guard = StagingGuard(staging_root.clone());

    let incr_snapshot: Option<Arc<IncrementalIndex>> =
        do_incremental.then(|| Arc::new(index.clone()));

    info!(incremental = do_incremental, "starting collector fan-out");

    let mut handles = Vec::new();
    for collector in collectors::build_all(home, options.skip_browsers) {
        if options.disabled_collectors.iter().any(|c| c == collector.name()) {
            debug!(collector = collector.name(), "disabled by config, skipping");
            continue;
        }
        let staging_root = staging_root.clone();
        let shared_meta = Arc::clone(&shared_meta);
        let incr_snapshot = incr_snapshot.clone();
        let dry_run = options.dry_run;
        let recovery = RecoveryStore::new(&options.output_dir);
        let artifact_base = artifact_base.clone();

        handles.push(async_std::task::spawn(async move {
            let category = collector.name();
            let staging = match StagingDir::new(&staging_root, category) {
                Ok(s) => s,
                Err(e) => {
                    warn!(collector = category, error = %e.message, "failed to create staging dir");
                    return category.to_string();
                }
            };
            let incr_ref = incr_snapshot.as_deref();
            match collector.stage_into(&staging, &shared_meta, incr_ref, dry_run).await {
                Ok(()) => {
                    let _ = recovery.mark_task_complete(&artifact_base, category);
                    String::new()
                }
                Err(e) => {
                    warn!(collector = category, error = %e.message, suggestion = ?e.suggestion, "collector task failed");
                    let _ = recovery.mark_task_failed(&artifact_base, category, &e.message);
                    category.to_string()
                }
            }
        }));
    }

    let results = join_all(handles).await;
    let failed_collectors: Vec<String> = results.into_iter().filter(|s| !s.is_empty()).collect();

    let mut metadata =
        Arc::try_unwrap(shared_meta).expect("all collector tasks have completed by now").into_inner();

    debug!(files = metadata.files.len(), "writing manifest and readme");
    std::fs::write(staging_root.join(METADATA_FILENAME), metadata.to_json()?)?;
    std::fs::write(staging_root.join(README_FILENAME), metadata.render_readme())?;

    if options.dry_run {
        return Ok(BackupReport {
            name,
            artifact_path: artifact_base,
            incremental: do_incremental,
            file_count: metadata.files.len(),
            failed_collectors,
            stats: Stats::default(),
            rotated: Vec::new(),
        });
    }

    let exclusions: Vec<String> = DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect();
    Archiver::create(&staging_root, &artifact_base, &exclusions)?;
    recovery.mark_task_complete(&artifact_base, "save_metadata")?;

    let final_path = if options.no_encrypt || options.key_path.is_none() {
        artifact_base.clone()
    } else {
        let key_path = options.key_path.as_ref().expect("checked above");
        let sealed_path = options.output_dir.join(format!("{name}.tar.gz.age"));
        Encryptor::new(key_path).encrypt(&artifact_base, &sealed_path)?;
        std::fs::remove_file(&artifact_base)?;
        recovery.mark_task_complete(&artifact_base, "encrypt")?;
        sealed_path
    };

    let compressed_size = std::fs::metadata(&final_path).map(|m| m.len()).unwrap_or(0);
    metadata.stats.backup_size = metadata.total_file_size();
    metadata.stats.compressed_size = compressed_size;
    metadata.stats.encrypted_size =
        if final_path.extension().and_then(|e| e.to_str()) == Some("age") { compressed_size } else { 0 };
    metadata.stats.total_duration_ms = started_at.elapsed().as_millis() as u64;

    let now = chrono::Local::now();
    for file in &metadata.files {
        if file.is_dir {
            continue;
        }
        let fingerprint = IncrementalIndex::fingerprint_now(&file.original_path, &name).unwrap_or(Fingerprint {
            size: file.size,
            mtime_ns: 0,
            content_hash: None,
            last_backup_name: name.clone(),
        });
        index.add_file(file.original_path.clone(), fingerprint);
    }
    if do_incremental {
        index.mark_incremental_backup(now);
    } else {
        index.mark_full_backup(now, &name);
    }
    index.save()?;

    let (backup_type, base) = if do_incremental {
        (BackupType::Incremental, metadata.base_backup.clone())
    } else {
        (BackupType::Full, String::new())
    };
    registry.register_backup(&name, &final_path, backup_type, base)?;
    registry.save()?;

    recovery.delete_state(&artifact_base)?;

    let rotated = if options.keep_count > 0 {
        rotation::rotate_by_count(&options.output_dir, registry, options.keep_count)?
    } else {
        Vec::new()
    };
    if !rotated.is_empty() {
        registry.save()?;
    }

    info!(name, artifact = %final_path.display(), files = metadata.files.len(), "backup complete");

    Ok(BackupReport {
        name,
        artifact_path: final_path,
        incremental: do_incremental,
        file_count: metadata.files.len(),
        failed_collectors,
        stats: metadata.stats,
        rotated,
    })
}

fn hostname_or_unknown() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_clone_roundtrips() {
        let options = BackupOptions {
            output_dir: PathBuf::from("/tmp/out"),
            key_path: None,
            no_encrypt: true,
            dry_run: false,
            skip_browsers: true,
            disabled_collectors: Vec::new(),
            force_incremental: false,
            incremental_by_default: false,
            full_backup_interval: chrono::Duration::days(7),
            keep_count: 0,
        };
        let cloned = options.clone();
        assert_eq!(cloned.output_dir, options.output_dir);
        assert_eq!(cloned.skip_browsers, options.skip_browsers);
    }

    /// A first run over a home containing only `.zshrc` produces exactly
    /// one plain artifact whose manifest records it as a full backup with
    /// the file's exact size and mode.
    #[test]
    fn first_run_over_fresh_home_produces_full_backup() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(".zshrc"), b"alias ls='ls -G'").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                home.path().join(".zshrc"),
                std::fs::Permissions::from_mode(0o644),
            )
            .unwrap();
        }

        let output_dir = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let mut index = IncrementalIndex::new(state_dir.path().join("index.json"));
        let registry = BackupRegistry::load(state_dir.path().join("registry.json")).unwrap();

        let options = BackupOptions {
            output_dir: output_dir.path().to_path_buf(),
            key_path: None,
            no_encrypt: true,
            dry_run: false,
            skip_browsers: true,
            disabled_collectors: Vec::new(),
            force_incremental: false,
            incremental_by_default: false,
            full_backup_interval: chrono::Duration::days(7),
            keep_count: 0,
        };

        let report =
            async_std::task::block_on(run(&options, home.path(), &mut index, &registry)).unwrap();

        assert!(!report.incremental);
        assert!(report.artifact_path.is_file());

        let archives: Vec<_> = std::fs::read_dir(output_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tar.gz"))
            .collect();
        assert_eq!(archives.len(), 1);

        let metadata = crate::backuputil::read_metadata(&report.artifact_path, None).unwrap();
        assert_eq!(metadata.backup_type, BackupType::Full);
        assert_eq!(metadata.base_backup, "");

        let zshrc = metadata
            .files
            .iter()
            .find(|f| f.original_path.to_string_lossy().ends_with(".zshrc"))
            .expect(".zshrc should be recorded in the manifest");
        assert_eq!(zshrc.size, 16);
        assert!(!zshrc.is_dir);

        let (name, entry) = registry.find_by_path(&report.artifact_path).unwrap();
        assert_eq!(name, report.name);
        assert_eq!(entry.backup_type, BackupType::Full);
    }
}
