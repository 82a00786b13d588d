//! GnuPG home directory: keyrings, trust database, agent config.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[".gnupg"];

// The agent socket and any `S.*` control sockets live under `.gnupg` too;
// they aren't regular files and `Archiver::copy_dir` already skips anything
// that isn't a file, directory, or symlink-to-follow, so no extra exclusion
// is needed here.
const EXCLUSIONS: &[&str] = &["S.gpg-agent", "S.gpg-agent.*", "*.lock"];

/// Collects `~/.gnupg`.
pub struct GpgCollector {
    home: std::path::PathBuf,
}

impl GpgCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        GpgCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for GpgCollector {
    fn name(&self) -> &'static str {
        "gpg"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        let exclusions: Vec<String> = EXCLUSIONS.iter().map(|s| s.to_string()).collect();
        stage_candidates(self.name(), staging, meta, incr, &self.home, CANDIDATES, &exclusions, dry_run)?;
        Ok(())
    }
}
