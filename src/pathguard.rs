//! Lexical path-traversal guard.
//!
//! Every Archiver extract/copy and every collector staging write routes its
//! destination through here. Nothing in this module touches the filesystem:
//! it is pure path arithmetic, so it can reject a malicious entry before any
//! I/O happens.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Lexically normalize `path`: resolve `.` and `..` components without
/// touching the filesystem (so this works for paths that don't exist yet,
/// such as archive entries being extracted).
///
/// A leading `..` that would escape the root is left in place; callers
/// compare the result against `base` themselves via [`validate`].
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Validate that `target`, once lexically normalized, lies within `base`.
///
/// `base` is treated as including its trailing separator: `/a/b` does not
/// contain `/a/bc`.
pub fn validate(base: &Path, target: &Path) -> Result<()> {
    let clean_base = clean(base);
    let clean_target = clean(target);

    if clean_target.starts_with(&clean_base) {
        Ok(())
    } else {
        Err(Error::path_traversal(target))
    }
}

/// Join `base` and a (possibly attacker-controlled) `user` relative path,
/// returning the cleaned absolute path if and only if it stays within
/// `base`.
pub fn sanitize(base: &Path, user: &Path) -> Result<PathBuf> {
    // Reject absolute components in `user` outright: joining would ignore
    // `base` entirely and silently point elsewhere.
    if user.is_absolute() {
        return Err(Error::path_traversal(user));
    }

    let candidate = base.join(user);
    validate(base, &candidate)?;
    Ok(clean(&candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_dot_segments() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn clean_preserves_leading_parent_escapes() {
        assert_eq!(clean(Path::new("../../etc/passwd")), PathBuf::from("../../etc/passwd"));
    }

    #[test]
    fn sanitize_accepts_nested_relative_path() {
        let base = Path::new("/base");
        let result = sanitize(base, Path::new("dotfiles/.zshrc")).unwrap();
        assert_eq!(result, PathBuf::from("/base/dotfiles/.zshrc"));
    }

    #[test]
    fn sanitize_rejects_parent_escape() {
        let base = Path::new("/base");
        let err = sanitize(base, Path::new("../escape.txt")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::PathTraversal);
    }

    #[test]
    fn sanitize_rejects_deeply_nested_escape() {
        let base = Path::new("/base");
        assert!(sanitize(base, Path::new("a/b/../../../escape.txt")).is_err());
    }

    #[test]
    fn sanitize_rejects_absolute_user_path() {
        let base = Path::new("/base");
        assert!(sanitize(base, Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn validate_rejects_sibling_with_shared_prefix() {
        // "/a/bc" must not validate against base "/a/b".
        let err = validate(Path::new("/a/b"), Path::new("/a/bc"));
        assert!(err.is_err());
    }

    #[test]
    fn validate_accepts_base_itself() {
        assert!(validate(Path::new("/a/b"), Path::new("/a/b")).is_ok());
    }
}
