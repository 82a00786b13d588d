//! The thin `clap`-derived CLI surface, generalizing the teacher's own
//! `Config`/`Command` split from one tmux subcommand tree onto stash's
//! `backup`/`restore`/`list`/`diff`/`cleanup`/`optimize`/`init` operations.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Back up, restore, and manage encrypted incremental snapshots of a
/// workstation's dotfiles, secrets, and small projects.
#[derive(Debug, Parser)]
#[clap(author, about, version)]
#[clap(propagate_version = true)]
pub struct Cli {
    /// Path to the YAML config file.
    ///
    /// If unspecified, falls back to `~/.stash.yaml`; a missing file is not
    /// an error, defaults apply.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Selection of commands.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level operations.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a backup.
    Backup {
        /// Directory the artifact is written into; overrides `Config.backup_dir`.
        #[arg(short = 'o', long = "output", value_hint = ValueHint::DirPath)]
        output: Option<PathBuf>,

        /// Identity file path; overrides `Config.key_path`.
        #[arg(long, value_hint = ValueHint::FilePath)]
        key_path: Option<PathBuf>,

        /// Write the archive plain, even if an identity is available.
        #[arg(long, action = ArgAction::SetTrue)]
        no_encrypt: bool,

        /// Stage and report without writing any archive or catalog update.
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,

        /// Print debug-level progress to stderr.
        #[arg(short = 'v', long, action = ArgAction::SetTrue)]
        verbose: bool,

        /// Keep only the `n` most recent artifacts after this run; `0` disables rotation.
        #[arg(long, value_name = "N", default_value_t = 0)]
        keep_count: usize,

        /// Skip the browser-data category.
        #[arg(long, action = ArgAction::SetTrue)]
        skip_browsers: bool,

        /// Opt into incremental mode for this run, when a full backup isn't due.
        #[arg(long, action = ArgAction::SetTrue)]
        force_incremental: bool,
    },

    /// Restore an artifact onto the filesystem.
    Restore {
        /// Path to the artifact to restore.
        #[arg(value_parser, value_hint = ValueHint::FilePath)]
        artifact: PathBuf,

        /// Identity file path; overrides `Config.key_path`.
        #[arg(long, value_hint = ValueHint::FilePath)]
        key_path: Option<PathBuf>,

        /// Report what would be restored without writing any file.
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,

        /// Prompt before overwriting an existing file (default: overwrite).
        #[arg(long, action = ArgAction::SetTrue)]
        interactive: bool,

        /// Treat the artifact as already-plain, skipping decryption even if
        /// it carries the `.age` suffix.
        #[arg(long, action = ArgAction::SetTrue)]
        no_decrypt: bool,
    },

    /// List known backups from the registry.
    List,

    /// Compare two artifacts' manifests.
    Diff {
        /// The older artifact.
        #[arg(value_parser, value_hint = ValueHint::FilePath)]
        older: PathBuf,

        /// The newer artifact.
        #[arg(value_parser, value_hint = ValueHint::FilePath)]
        newer: PathBuf,

        /// Identity file path, if either artifact is encrypted.
        #[arg(long, value_hint = ValueHint::FilePath)]
        key_path: Option<PathBuf>,
    },

    /// Prune old artifacts from the backup directory.
    Cleanup {
        /// Keep only the `n` most recent artifacts.
        #[arg(long, value_name = "N")]
        keep: Option<usize>,

        /// Delete artifacts older than this (`Nd`/`Nh`, humantime shorthand).
        #[arg(long, value_name = "DURATION")]
        max_age: Option<String>,

        /// Keep the newest artifacts until the total exceeds this many bytes.
        #[arg(long, value_name = "BYTES")]
        max_size: Option<u64>,

        /// Report what would be deleted without deleting anything.
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },

    /// Collapse a restore chain into a single full artifact.
    Optimize {
        /// Any artifact belonging to the chain to merge.
        #[arg(value_parser, value_hint = ValueHint::FilePath)]
        artifact: PathBuf,

        /// Keep the original chain artifacts instead of deleting them.
        #[arg(long, action = ArgAction::SetTrue)]
        keep_chain: bool,

        /// Directory the merged artifact is written into; defaults to the
        /// chain's own directory.
        #[arg(long, value_hint = ValueHint::DirPath)]
        output: Option<PathBuf>,

        /// Identity file path, if the chain is encrypted.
        #[arg(long, value_hint = ValueHint::FilePath)]
        key_path: Option<PathBuf>,
    },

    /// Generate a fresh identity at `~/.stash.key` (or `Config.key_path`).
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_defaults_parse() {
        let cli = Cli::try_parse_from(["stash", "backup"]).unwrap();
        match cli.command {
            Command::Backup { keep_count, no_encrypt, dry_run, .. } => {
                assert_eq!(keep_count, 0);
                assert!(!no_encrypt);
                assert!(!dry_run);
            }
            _ => panic!("expected Backup"),
        }
    }

    #[test]
    fn backup_with_flags() {
        let cli = Cli::try_parse_from([
            "stash", "backup", "--no-encrypt", "--dry-run", "--keep-count", "5", "--skip-browsers",
        ])
        .unwrap();
        match cli.command {
            Command::Backup { no_encrypt, dry_run, keep_count, skip_browsers, .. } => {
                assert!(no_encrypt);
                assert!(dry_run);
                assert_eq!(keep_count, 5);
                assert!(skip_browsers);
            }
            _ => panic!("expected Backup"),
        }
    }

    #[test]
    fn restore_requires_artifact() {
        let result = Cli::try_parse_from(["stash", "restore"]);
        assert!(result.is_err());
    }

    #[test]
    fn restore_parses_artifact_and_flags() {
        let cli =
            Cli::try_parse_from(["stash", "restore", "/tmp/b.tar.gz.age", "--interactive"]).unwrap();
        match cli.command {
            Command::Restore { artifact, interactive, .. } => {
                assert_eq!(artifact, PathBuf::from("/tmp/b.tar.gz.age"));
                assert!(interactive);
            }
            _ => panic!("expected Restore"),
        }
    }

    #[test]
    fn list_command_parses() {
        let cli = Cli::try_parse_from(["stash", "list"]).unwrap();
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn diff_requires_two_artifacts() {
        let cli = Cli::try_parse_from(["stash", "diff", "a.tar.gz", "b.tar.gz"]).unwrap();
        match cli.command {
            Command::Diff { older, newer, .. } => {
                assert_eq!(older, PathBuf::from("a.tar.gz"));
                assert_eq!(newer, PathBuf::from("b.tar.gz"));
            }
            _ => panic!("expected Diff"),
        }
    }

    #[test]
    fn cleanup_keep_parses() {
        let cli = Cli::try_parse_from(["stash", "cleanup", "--keep", "3"]).unwrap();
        match cli.command {
            Command::Cleanup { keep, max_age, max_size, .. } => {
                assert_eq!(keep, Some(3));
                assert_eq!(max_age, None);
                assert_eq!(max_size, None);
            }
            _ => panic!("expected Cleanup"),
        }
    }

    #[test]
    fn optimize_parses_keep_chain() {
        let cli = Cli::try_parse_from(["stash", "optimize", "b.tar.gz", "--keep-chain"]).unwrap();
        match cli.command {
            Command::Optimize { artifact, keep_chain, .. } => {
                assert_eq!(artifact, PathBuf::from("b.tar.gz"));
                assert!(keep_chain);
            }
            _ => panic!("expected Optimize"),
        }
    }

    #[test]
    fn init_command_parses() {
        let cli = Cli::try_parse_from(["stash", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
    }
}
