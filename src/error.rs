//! This crate's error type.
//!
//! Unlike a plain `thiserror` enum, callers of this crate (the CLI, and
//! collectors reporting partial failures) need more than a variant: they
//! need to know whether the failure is locally recoverable, what to suggest
//! to the user, and which file was involved. [`Error`] carries that as
//! structured fields instead, with [`ErrorKind`] playing the role the
//! enum variant would have played.

use std::fmt;
use std::path::PathBuf;

/// Coarse classification of every failure this crate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An archive entry or collector target would escape its base directory.
    PathTraversal,
    /// Sealing was requested but no identity file exists.
    EncryptionKeyMissing,
    /// Wrong identity or corrupted ciphertext.
    DecryptionFailed,
    /// A write failed because the device is full.
    DiskSpace,
    /// A read or write failed due to insufficient permissions.
    Permission,
    /// A source path disappeared mid-run.
    NotFound,
    /// An external command (package manager, git, cloud sync) failed or timed out.
    Network,
    /// The on-disk config is malformed.
    Config,
    /// A gzip or tar header could not be parsed.
    ArchiveCorrupt,
    /// Catch-all for errors with no more specific classification.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::PathTraversal => "path traversal",
            ErrorKind::EncryptionKeyMissing => "encryption key missing",
            ErrorKind::DecryptionFailed => "decryption failed",
            ErrorKind::DiskSpace => "disk space",
            ErrorKind::Permission => "permission",
            ErrorKind::NotFound => "not found",
            ErrorKind::Network => "network",
            ErrorKind::Config => "config",
            ErrorKind::ArchiveCorrupt => "archive corrupt",
            ErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// This crate's error type.
///
/// `kind` drives caller-side decisions (is this recoverable for a
/// collector task? should the whole run abort?); `suggestion` and
/// `alternative` are surfaced verbatim to the user by the CLI.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    /// Coarse classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// What the user should try instead, if anything.
    pub suggestion: Option<String>,
    /// A fallback course of action, if the suggestion doesn't apply.
    pub alternative: Option<String>,
    /// The file involved, if any.
    pub file_path: Option<PathBuf>,
    /// The underlying cause, if this wraps another error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Build a bare error of a given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            suggestion: None,
            alternative: None,
            file_path: None,
            source: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach an alternative course of action.
    pub fn with_alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternative = Some(alternative.into());
        self
    }

    /// Attach the file this error concerns.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Full human-readable rendering, including path and suggestion, for CLI output.
    pub fn detailed(&self) -> String {
        let mut out = self.to_string();
        if let Some(path) = &self.file_path {
            out.push_str(&format!(" ({})", path.display()));
        }
        if let Some(suggestion) = &self.suggestion {
            out.push_str(&format!(", suggestion: {suggestion}"));
        }
        if let Some(alternative) = &self.alternative {
            out.push_str(&format!(", alternative: {alternative}"));
        }
        out
    }

    /// Shorthand for the `PathTraversal` kind.
    pub fn path_traversal(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Error::new(
            ErrorKind::PathTraversal,
            format!("entry `{}` escapes the destination directory", path.display()),
        )
        .with_path(path)
    }

    /// Shorthand for the `EncryptionKeyMissing` kind.
    pub fn encryption_key_missing(key_path: impl Into<PathBuf>) -> Self {
        let key_path = key_path.into();
        Error::new(
            ErrorKind::EncryptionKeyMissing,
            format!("no identity file at `{}`", key_path.display()),
        )
        .with_suggestion("run `stash init` to generate an identity")
        .with_path(key_path)
    }

    /// Shorthand for the `DecryptionFailed` kind.
    pub fn decryption_failed(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Error::new(
            ErrorKind::DecryptionFailed,
            "authentication failed: wrong identity or corrupted ciphertext",
        )
        .with_suggestion("verify the key path points at the identity used to seal this archive")
        .with_path(path)
    }

    /// `true` for kinds that a collector can recover from by skipping the
    /// offending file rather than failing its whole task.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind, ErrorKind::Permission | ErrorKind::NotFound)
    }
}

/// This crate's `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Classify an external command's error text by inspecting it for the
/// keywords associated with each [`ErrorKind`].
///
/// Used to wrap errors from invoked package managers or `git`, which don't
/// give us a structured error to match on.
pub fn classify_external(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("no space") || lower.contains("enospc") || lower.contains("disk full") {
        ErrorKind::DiskSpace
    } else if lower.contains("permission denied") || lower.contains("eacces") {
        ErrorKind::Permission
    } else if lower.contains("no such file") || lower.contains("not found") || lower.contains("enoent")
    {
        ErrorKind::NotFound
    } else if lower.contains("timed out") || lower.contains("timeout") || lower.contains("connection")
    {
        ErrorKind::Network
    } else if lower.contains("traversal") || lower.contains("..") {
        ErrorKind::PathTraversal
    } else {
        ErrorKind::Other
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            _ => classify_external(&e.to_string()),
        };
        Error::new(kind, e.to_string()).with_source(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::new(ErrorKind::Config, format!("json error: {e}")).with_source(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::new(ErrorKind::Config, format!("yaml error: {e}")).with_source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_disk_space() {
        assert_eq!(
            classify_external("write failed: No space left on device"),
            ErrorKind::DiskSpace
        );
    }

    #[test]
    fn classify_detects_permission() {
        assert_eq!(
            classify_external("Permission denied (os error 13)"),
            ErrorKind::Permission
        );
    }

    #[test]
    fn classify_detects_not_found() {
        assert_eq!(classify_external("No such file or directory"), ErrorKind::NotFound);
    }

    #[test]
    fn classify_detects_network() {
        assert_eq!(classify_external("operation timed out"), ErrorKind::Network);
    }

    #[test]
    fn classify_falls_back_to_other() {
        assert_eq!(classify_external("something weird happened"), ErrorKind::Other);
    }

    #[test]
    fn recoverable_kinds() {
        assert!(Error::new(ErrorKind::Permission, "x").is_recoverable());
        assert!(Error::new(ErrorKind::NotFound, "x").is_recoverable());
        assert!(!Error::new(ErrorKind::DiskSpace, "x").is_recoverable());
    }

    #[test]
    fn detailed_includes_path_and_suggestion() {
        let err = Error::encryption_key_missing("/home/u/.stash.key");
        let text = err.detailed();
        assert!(text.contains("encryption key missing"));
        assert!(text.contains(".stash.key"));
        assert!(text.contains("stash init"));
    }
}
