//! macOS `defaults` domains exported via `defaults export`. A no-op on
//! non-macOS hosts or when `defaults` isn't on `PATH`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::{run_capture, stage_text};
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

/// Domains exported by name; `-g`/`NSGlobalDomain` is exported separately.
const DOMAINS: &[&str] = &[
    "com.apple.dock",
    "com.apple.finder",
    "com.apple.screencapture",
    "com.apple.Terminal",
];

/// Exports select macOS `defaults` domains as plist-format text.
pub struct MacosDefaultsCollector;

impl MacosDefaultsCollector {
    pub fn new() -> Self {
        MacosDefaultsCollector
    }
}

impl Default for MacosDefaultsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for MacosDefaultsCollector {
    fn name(&self) -> &'static str {
        "macos-defaults"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        _incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        if dry_run || !cfg!(target_os = "macos") {
            return Ok(());
        }
        if let Some(global) = run_capture("defaults", &["export", "NSGlobalDomain", "-"]) {
            stage_text(staging, meta, "NSGlobalDomain.plist", &global)?;
        }
        for domain in DOMAINS {
            let Some(plist) = run_capture("defaults", &["export", domain, "-"]) else { continue };
            stage_text(staging, meta, &format!("{domain}.plist"), &plist)?;
        }
        Ok(())
    }
}
