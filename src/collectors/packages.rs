//! Installed-package enumeration via whatever package managers are present.
//!
//! Each manager is tried independently; a missing binary is not an error
//! (`run_capture` returns `None` and we just skip it). The output is staged
//! as an opaque text listing per manager, and the count of lines is
//! recorded via `set_package_count`; git history, exact versions, and
//! dependency graphs are out of scope.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::{run_capture, stage_text};
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

struct Manager {
    tag: &'static str,
    program: &'static str,
    args: &'static [&'static str],
}

const MANAGERS: &[Manager] = &[
    Manager { tag: "homebrew", program: "brew", args: &["list", "-1"] },
    Manager { tag: "apt", program: "dpkg-query", args: &["-W", "-f=${Package}\n"] },
    Manager { tag: "cargo", program: "cargo", args: &["install", "--list"] },
    Manager { tag: "npm", program: "npm", args: &["list", "-g", "--depth=0", "--parseable"] },
    Manager { tag: "pip", program: "pip3", args: &["list", "--format=freeze"] },
];

/// Enumerates installed packages across every package manager found on the
/// system.
pub struct PackagesCollector;

impl PackagesCollector {
    pub fn new() -> Self {
        PackagesCollector
    }
}

impl Default for PackagesCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for PackagesCollector {
    fn name(&self) -> &'static str {
        "packages"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        _incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        if dry_run {
            return Ok(());
        }
        for manager in MANAGERS {
            let Some(output) = run_capture(manager.program, manager.args) else { continue };
            let count = output.lines().filter(|l| !l.trim().is_empty()).count() as u64;
            stage_text(staging, meta, &format!("{}.txt", manager.tag), &output)?;
            meta.set_package_count(manager.tag, count);
        }
        Ok(())
    }
}
