//! Bidirectional translation between a staging directory and a compressed
//! archive, plus filesystem copy helpers with built-in exclusion.
//!
//! Generalizes the teacher's `tar::Builder` + streaming-compressor pattern
//! (there: `tar` + `zstd` writing a fixed `panes-content/` tree) to an
//! arbitrary directory tree with a configurable exclusion set, and swaps the
//! compressor for `flate2` gzip to produce the `.tar.gz` suffix.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, ErrorKind, Result};
use crate::pathguard;

/// Names excluded from every `create`/`copy_dir` call unless overridden by
/// config.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "node_modules",
    "cache",
    "Cache",
    "tmp",
    "temp",
    "logs",
    "log",
    ".git",
    "venv",
    ".venv",
    "__pycache__",
    "*.pyc",
    ".DS_Store",
    "Trash",
    "downloads",
    "Downloads",
];

/// Return `true` if `name` matches one of `exclusions` (exact match, or a
/// trailing-glob `*suffix` match).
pub fn is_excluded(name: &str, exclusions: &[String]) -> bool {
    exclusions.iter().any(|pattern| {
        if let Some(suffix) = pattern.strip_prefix('*') {
            name.ends_with(suffix)
        } else {
            name == pattern
        }
    })
}

/// Archiver: packs a staging directory into a `.tar.gz`, extracts one back
/// out safely, and offers best-effort filesystem copy helpers.
pub struct Archiver;

impl Archiver {
    /// Walk `source_dir`, skipping entries (and pruning excluded
    /// subtrees) that match `exclusions`, and write the survivors into a
    /// gzip+tar stream at `out_path`. Preserves mode and mtime. Fatal on any
    /// I/O error.
    pub fn create(source_dir: &Path, out_path: &Path, exclusions: &[String]) -> Result<()> {
        let file = fs::File::create(out_path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.mode(tar::HeaderMode::Complete);

        let walker = walkdir::WalkDir::new(source_dir)
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                if entry.depth() == 0 {
                    return true;
                }
                !is_excluded(&name, exclusions)
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::new(ErrorKind::Other, format!("walk error: {e}")).with_path(source_dir)
            })?;
            let path = entry.path();
            if path == source_dir {
                continue;
            }
            let relative = path.strip_prefix(source_dir).expect("walked under source_dir");

            if entry.file_type().is_symlink() {
                continue;
            } else if entry.file_type().is_dir() {
                builder.append_dir(relative, path)?;
            } else if entry.file_type().is_file() {
                let mut f = fs::File::open(path)?;
                builder.append_file(relative, &mut f)?;
            }
        }

        let encoder = builder.into_inner()?;
        let file = encoder.finish()?;
        file.sync_all()?;
        Ok(())
    }

    /// Stream gzip+tar from `archive_path`, routing every entry's
    /// destination through [`pathguard`]. Fatal on any traversal violation
    /// or header error.
    pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<()> {
        fs::create_dir_all(dest_dir)?;
        let file = fs::File::open(archive_path)?;
        let decoder = GzDecoder::new(file);
        let mut tar = tar::Archive::new(decoder);

        for entry in tar.entries()? {
            let mut entry = entry.map_err(|e| {
                Error::new(ErrorKind::ArchiveCorrupt, format!("bad tar header: {e}"))
                    .with_path(archive_path)
            })?;

            let entry_path = entry.path().map_err(|e| {
                Error::new(ErrorKind::ArchiveCorrupt, format!("bad entry path: {e}"))
            })?;
            let dest = pathguard::sanitize(dest_dir, &entry_path)?;

            match entry.header().entry_type() {
                tar::EntryType::Directory => {
                    fs::create_dir_all(&dest)?;
                }
                tar::EntryType::Regular => {
                    if let Some(parent) = dest.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let mode = entry.header().mode().unwrap_or(0o644);
                    entry.unpack(&dest)?;
                    set_mode(&dest, mode)?;
                }
                _ => {
                    // Symlinks and other exotic entry types are ignored.
                    continue;
                }
            }
        }

        Ok(())
    }

    /// Copy a single file, creating `dst`'s parent directory and preserving
    /// the source mode.
    pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
        let mode = fs::metadata(src)?.permissions();
        fs::set_permissions(dst, mode)?;
        Ok(())
    }

    /// Recursively copy `src` into `dst`, applying the same exclusion rule
    /// as [`Archiver::create`]. Symlinks are skipped at any depth.
    /// Individual entry failures are logged and skipped rather than fatal
    /// since large trees like `.config` are commonly half-readable.
    pub fn copy_dir(src: &Path, dst: &Path, exclusions: &[String]) -> Result<()> {
        fs::create_dir_all(dst)?;

        let walker = walkdir::WalkDir::new(src).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() == 0 || !is_excluded(&name, exclusions)
        });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry during copy_dir");
                    continue;
                }
            };
            let path = entry.path();
            if path == src {
                continue;
            }
            let relative = path.strip_prefix(src).expect("walked under src");
            let target = dst.join(relative);

            if entry.file_type().is_symlink() {
                continue;
            } else if entry.file_type().is_dir() {
                if let Err(e) = fs::create_dir_all(&target) {
                    tracing::warn!(path = %path.display(), error = %e, "skipping directory");
                }
            } else if entry.file_type().is_file() {
                if let Err(e) = Self::copy_file(path, &target) {
                    tracing::warn!(path = %path.display(), error = %e, "skipping file");
                }
            }
        }

        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Read a single file's bytes out of a `.tar.gz` archive without extracting
/// the rest, used by [`crate::backuputil`] to pull `metadata.json`.
pub fn read_entry(archive_path: &Path, entry_name: &str) -> Result<Option<Vec<u8>>> {
    let file = fs::File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);

    for entry in tar.entries()? {
        let mut entry = entry.map_err(|e| {
            Error::new(ErrorKind::ArchiveCorrupt, format!("bad tar header: {e}"))
                .with_path(archive_path)
        })?;
        let path = entry.path().map_err(|e| {
            Error::new(ErrorKind::ArchiveCorrupt, format!("bad entry path: {e}"))
        })?;
        if path.to_string_lossy() == entry_name {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}
