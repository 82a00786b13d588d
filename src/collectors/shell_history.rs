//! Shell history files.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[
    ".zsh_history",
    ".bash_history",
    ".local/share/fish/fish_history",
    ".python_history",
];

/// Collects shell and REPL history files.
pub struct ShellHistoryCollector {
    home: std::path::PathBuf,
}

impl ShellHistoryCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        ShellHistoryCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for ShellHistoryCollector {
    fn name(&self) -> &'static str {
        "shell-history"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        stage_candidates(self.name(), staging, meta, incr, &self.home, CANDIDATES, &[], dry_run)?;
        Ok(())
    }
}
