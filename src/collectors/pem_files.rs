//! Loose certificate/key material (`*.pem`, `*.crt`, `*.key`) scattered
//! under `$HOME`, outside `.ssh`/`.gnupg` which already have dedicated
//! collectors.

use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const MAX_DEPTH: usize = 4;
const EXTENSIONS: &[&str] = &["pem", "crt", "key"];

/// Collects loose PEM-encoded certificate and key files.
pub struct PemFilesCollector {
    home: std::path::PathBuf,
}

impl PemFilesCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        PemFilesCollector { home: home.into() }
    }

    fn find_pem_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.home).max_depth(MAX_DEPTH).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !matches!(name.as_ref(), ".ssh" | ".gnupg" | "node_modules" | ".git" | "target")
        });
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else { continue };
            if !EXTENSIONS.contains(&ext) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.home) else { continue };
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
        out
    }
}

#[async_trait]
impl Collector for PemFilesCollector {
    fn name(&self) -> &'static str {
        "pem-files"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        let found = self.find_pem_files();
        let candidates: Vec<&str> = found.iter().map(|s| s.as_str()).collect();
        stage_candidates(self.name(), staging, meta, incr, &self.home, &candidates, &[], dry_run)?;
        Ok(())
    }
}
