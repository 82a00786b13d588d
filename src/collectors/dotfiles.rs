//! Shell and editor dotfiles at the top of `$HOME`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::archive::DEFAULT_EXCLUSIONS;
use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[
    ".zshrc",
    ".zshenv",
    ".zprofile",
    ".bashrc",
    ".bash_profile",
    ".profile",
    ".gitconfig",
    ".gitignore_global",
    ".vimrc",
    ".tmux.conf",
    ".editorconfig",
    ".inputrc",
];

/// Collects well-known shell and editor configuration files.
pub struct DotfilesCollector {
    home: std::path::PathBuf,
}

impl DotfilesCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        DotfilesCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for DotfilesCollector {
    fn name(&self) -> &'static str {
        "dotfiles"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        let exclusions: Vec<String> = DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect();
        stage_candidates(self.name(), staging, meta, incr, &self.home, CANDIDATES, &exclusions, dry_run)?;
        Ok(())
    }
}
