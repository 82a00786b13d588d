//! Local git repository discovery.
//!
//! Records repository root paths only, as an opaque JSON listing; cloning
//! history, remotes, or object databases is explicitly out of scope.

use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_text;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

/// How deep under `$HOME` to search for `.git` directories.
const MAX_DEPTH: usize = 6;

/// Finds local git repositories and records their root paths.
pub struct GitReposCollector {
    home: std::path::PathBuf,
}

impl GitReposCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        GitReposCollector { home: home.into() }
    }

    fn find_repos(&self) -> Vec<String> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.home).max_depth(MAX_DEPTH).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !matches!(name.as_ref(), "node_modules" | "target" | ".cache")
        });
        for entry in walker.filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() && entry.file_name() == ".git" {
                let Some(repo_root) = entry.path().parent() else { continue };
                out.push(repo_root.to_string_lossy().to_string());
            }
        }
        out
    }
}

#[async_trait]
impl Collector for GitReposCollector {
    fn name(&self) -> &'static str {
        "git-repos"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        _incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        let repos = self.find_repos();
        if dry_run || repos.is_empty() {
            return Ok(());
        }
        let listing = serde_json::to_string_pretty(&repos)?;
        stage_text(staging, meta, "repos.json", &listing)?;
        meta.set_package_count("git-repos", repos.len() as u64);
        Ok(())
    }
}
