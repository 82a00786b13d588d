//! Loose `.env`-style files discovered by a bounded walk of `$HOME`.
//!
//! Unlike the fixed-candidate collectors, the set of matching files isn't
//! known ahead of time, so this walks `$HOME` directly (to a shallow depth,
//! to avoid wandering into every project's `node_modules`) looking for
//! names starting with `.env`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use walkdir::WalkDir;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

/// How deep under `$HOME` to look for `.env*` files.
const MAX_DEPTH: usize = 4;

/// Collects `.env`/`.env.local`/... files scattered under `$HOME`.
pub struct EnvFilesCollector {
    home: std::path::PathBuf,
}

impl EnvFilesCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        EnvFilesCollector { home: home.into() }
    }

    fn find_env_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.home).max_depth(MAX_DEPTH).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !matches!(name.as_ref(), "node_modules" | ".git" | "target" | ".venv" | "venv")
        });
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name == ".env" || name.starts_with(".env.") {
                let Ok(relative) = entry.path().strip_prefix(&self.home) else { continue };
                out.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        out
    }
}

#[async_trait]
impl Collector for EnvFilesCollector {
    fn name(&self) -> &'static str {
        "env-files"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        let found = self.find_env_files();
        if found.is_empty() {
            return Ok(());
        }
        let candidates: Vec<&str> = found.iter().map(|s| s.as_str()).collect();
        if let Err(e) = stage_candidates(self.name(), staging, meta, incr, &self.home, &candidates, &[], dry_run) {
            warn!(collector = self.name(), error = %e.message, "env-files collector failed");
            return Err(e);
        }
        Ok(())
    }
}
