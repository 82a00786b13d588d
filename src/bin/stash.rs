//! Dispatcher binary: parse args, load config, call into the library crate,
//! print plain-text results.

use std::path::PathBuf;

use async_std::task;
use clap::Parser;
use itertools::Itertools;
use si_scale::helpers::bytes2;

use stash::cli::{Cli, Command};
use stash::config::StashConfig;
use stash::error::Result;
use stash::incremental::IncrementalIndex;
use stash::orchestrator::{self, BackupOptions};
use stash::registry::BackupRegistry;
use stash::{diff, optimize, restore, rotation};
use stash::encrypt::Encryptor;
use stash::restore::ConflictPolicy;

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(StashConfig::default_path);
    let config = match StashConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => fail(&e.to_string()),
    };

    let result = task::block_on(run(cli.command, config));
    if let Err(e) = result {
        fail(&e.to_string());
    }
}

async fn run(command: Command, config: StashConfig) -> Result<()> {
    match command {
        Command::Backup {
            output,
            key_path,
            no_encrypt,
            dry_run,
            verbose,
            keep_count,
            skip_browsers,
            force_incremental,
        } => {
            if verbose {
                std::env::set_var("RUST_LOG", "debug");
            }
            let _ = tracing_subscriber::fmt::try_init();

            let output_dir = output.unwrap_or_else(|| config.backup_dir());
            let registry = BackupRegistry::load(config.registry_path())?;
            let mut index = IncrementalIndex::load(config.index_path())?;
            let home = dirs::home_dir()
                .ok_or_else(|| stash::error::Error::new(stash::error::ErrorKind::Config, "cannot resolve $HOME"))?;

            let options = BackupOptions {
                output_dir,
                key_path: key_path.or_else(|| Some(config.key_path())),
                no_encrypt,
                dry_run,
                skip_browsers,
                disabled_collectors: config.collectors.disabled_names(),
                force_incremental,
                incremental_by_default: config.incremental_by_default,
                full_backup_interval: config.full_backup_interval(),
                keep_count,
            };

            let report = orchestrator::run(&options, &home, &mut index, &registry).await?;
            println!(
                "backup {} ({}) -> {}",
                report.name,
                if report.incremental { "incremental" } else { "full" },
                report.artifact_path.display()
            );
            println!(
                "{} files, {} compressed, {} ms",
                report.file_count,
                bytes2(report.stats.compressed_size as f64),
                report.stats.total_duration_ms
            );
            if !report.failed_collectors.is_empty() {
                eprintln!("warning: collectors failed: {}", report.failed_collectors.join(", "));
            }
            if !report.rotated.is_empty() {
                println!("rotated away {} older artifact(s)", report.rotated.len());
            }
            Ok(())
        }

        Command::Restore { artifact, key_path, dry_run, interactive, no_decrypt } => {
            let _ = tracing_subscriber::fmt::try_init();
            let registry = BackupRegistry::load(config.registry_path())?;
            let key_path = if no_decrypt { None } else { key_path.or_else(|| Some(config.key_path())) };
            let policy = if interactive { ConflictPolicy::Skip } else { ConflictPolicy::Overwrite };
            let report = restore::restore(&registry, &artifact, key_path.as_deref(), policy, dry_run)?;
            println!("restored {} files, skipped {}", report.restored, report.skipped);
            Ok(())
        }

        Command::List => {
            let registry = BackupRegistry::load(config.registry_path())?;
            let entries: Vec<_> = registry
                .names()
                .into_iter()
                .filter_map(|name| registry.get_backup(&name).map(|entry| (name, entry)))
                .sorted_by_key(|(_, entry)| (entry.base.clone(), entry.timestamp))
                .collect();

            // Group incrementals under the full backup they chain from, so a
            // `list` reads as one block per lineage rather than a flat dump.
            let chains = entries.into_iter().group_by(|(_, entry)| entry.base.clone());
            for (base, chain) in chains.into_iter() {
                let header = if base.is_empty() { "(full backups)".to_string() } else { format!("chain from {base}") };
                println!("{header}");
                for (name, entry) in chain {
                    println!("  {name}\t{:?}\t{}", entry.backup_type, entry.path.display());
                }
            }
            Ok(())
        }

        Command::Diff { older, newer, key_path } => {
            let key_path = key_path.or_else(|| Some(config.key_path()));
            let result = diff::diff_artifacts(&older, &newer, key_path.as_deref())?;
            println!(
                "+{} -{} ~{} files ({} unchanged)",
                result.added_files.len(),
                result.removed_files.len(),
                result.modified_files.len(),
                result.unchanged_count
            );
            for change in &result.package_changes {
                println!("{}: {} -> {} ({:+})", change.name, change.old, change.new, change.delta);
            }
            Ok(())
        }

        Command::Cleanup { keep, max_age, max_size, dry_run } => {
            let backup_dir = config.backup_dir();
            let registry = BackupRegistry::load(config.registry_path())?;
            let deleted = cleanup(&backup_dir, &registry, keep, max_age, max_size, dry_run)?;
            if dry_run {
                println!("would delete {} artifact(s)", deleted.len());
            } else {
                registry.save()?;
                println!("deleted {} artifact(s)", deleted.len());
            }
            for path in &deleted {
                println!("  {}", path.display());
            }
            Ok(())
        }

        Command::Optimize { artifact, keep_chain, output, key_path } => {
            let registry = BackupRegistry::load(config.registry_path())?;
            let output_dir = output.unwrap_or_else(|| config.backup_dir());
            let key_path = key_path.or_else(|| Some(config.key_path()));
            let outcome = optimize::optimize(&registry, &artifact, &output_dir, key_path.as_deref(), keep_chain)?;
            registry.save()?;
            match outcome {
                optimize::OptimizeOutcome::AlreadyOptimal => println!("chain already optimal, nothing to merge"),
                optimize::OptimizeOutcome::Merged(path) => println!("merged chain into {}", path.display()),
            }
            Ok(())
        }

        Command::Init => {
            let key_path = config.key_path();
            let encryptor = Encryptor::new(key_path.clone());
            if encryptor.key_exists() {
                println!("identity already present at {}", key_path.display());
                return Ok(());
            }
            let recipient = encryptor.generate_key()?;
            println!("generated identity at {}", key_path.display());
            println!("recipient: {recipient}");
            Ok(())
        }
    }
}

fn cleanup(
    backup_dir: &std::path::Path,
    registry: &BackupRegistry,
    keep: Option<usize>,
    max_age: Option<String>,
    max_size: Option<u64>,
    dry_run: bool,
) -> Result<Vec<PathBuf>> {
    if dry_run {
        let mut entries = rotation::list_artifacts(backup_dir)?;
        let keep_n = keep.unwrap_or(entries.len());
        entries.sort_by(|a, b| b.mtime.cmp(&a.mtime));
        return Ok(entries.into_iter().skip(keep_n).map(|e| e.path).collect());
    }
    if let Some(n) = keep {
        return rotation::rotate_by_count(backup_dir, registry, n);
    }
    if let Some(spec) = max_age {
        let duration = stash::util::parse_interval(&spec)?;
        return rotation::rotate_by_age(backup_dir, registry, duration);
    }
    if let Some(bytes) = max_size {
        return rotation::rotate_by_size(backup_dir, registry, bytes);
    }
    Ok(Vec::new())
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}
