//! Small helpers shared across the crate: home-relative path expansion,
//! timestamped artifact names, and the atomic-replace write pattern used by
//! every on-disk catalog.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{Error, ErrorKind, Result};

/// Prefix every `backup-*` artifact name shares.
pub const BACKUP_NAME_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Return a new backup name, e.g. `backup-2026-07-26-143205`.
pub fn new_backup_name() -> String {
    format!("backup-{}", Local::now().format(BACKUP_NAME_FORMAT))
}

/// Expand a leading `~` (or `~/...`) into the user's home directory.
///
/// Paths with no leading `~` are returned unchanged. Falls back to returning
/// the path unchanged if the home directory cannot be resolved.
pub fn expand_home(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let Ok(stripped) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(stripped),
        None => path.to_path_buf(),
    }
}

/// Write `contents` to `path` via a temp file in the same directory followed
/// by a rename, so readers never observe a partially written file.
///
/// This is the single write primitive behind [`crate::incremental::IncrementalIndex`],
/// [`crate::registry::BackupRegistry`] and [`crate::recovery::RecoveryStore`].
pub fn atomic_write(path: impl AsRef<Path>, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(Error::from)?;
    use std::io::Write;
    tmp.write_all(contents).map_err(Error::from)?;
    tmp.flush().map_err(Error::from)?;
    tmp.persist(path).map_err(|e| {
        Error::new(ErrorKind::Other, format!("failed to persist `{}`: {}", path.display(), e.error))
            .with_path(path)
    })?;
    Ok(())
}

/// Parse an interval expressed as `Nd` / `Nh` (or any other `humantime`
/// shorthand) into a [`chrono::Duration`].
pub fn parse_interval(spec: &str) -> Result<chrono::Duration> {
    let std_duration = humantime::parse_duration(spec).map_err(|e| {
        Error::new(ErrorKind::Config, format!("invalid interval `{spec}`: {e}"))
    })?;
    chrono::Duration::from_std(std_duration)
        .map_err(|e| Error::new(ErrorKind::Config, format!("interval `{spec}` out of range: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_replaces_tilde() {
        std::env::set_var("HOME", "/home/tester");
        let expanded = expand_home("~/dotfiles/.zshrc");
        assert_eq!(expanded, PathBuf::from("/home/tester/dotfiles/.zshrc"));
    }

    #[test]
    fn expand_home_leaves_absolute_paths_alone() {
        let expanded = expand_home("/etc/hosts");
        assert_eq!(expanded, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn new_backup_name_matches_pattern() {
        let name = new_backup_name();
        let re = regex::Regex::new(r"^backup-\d{4}-\d{2}-\d{2}-\d{6}$").unwrap();
        assert!(re.is_match(&name), "{name} did not match pattern");
    }

    #[test]
    fn atomic_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("file.json");
        atomic_write(&path, b"{\"a\":1}").unwrap();
        let read = std::fs::read(&path).unwrap();
        assert_eq!(read, b"{\"a\":1}");
    }

    #[test]
    fn parse_interval_days() {
        let d = parse_interval("7d").unwrap();
        assert_eq!(d.num_days(), 7);
    }

    #[test]
    fn parse_interval_hours() {
        let d = parse_interval("12h").unwrap();
        assert_eq!(d.num_hours(), 12);
    }

    #[test]
    fn parse_interval_rejects_garbage() {
        assert!(parse_interval("not-a-duration").is_err());
    }
}
