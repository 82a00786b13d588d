//! Docker client configuration. Credential helpers referenced from
//! `config.json` are not followed; only the file itself is staged,
//! matching the "opaque listing, not full semantic parsing" approach
//! used by `git-repos` and `packages`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[".docker/config.json", ".docker/contexts"];

/// Collects `~/.docker` client configuration.
pub struct DockerCollector {
    home: std::path::PathBuf,
}

impl DockerCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        DockerCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for DockerCollector {
    fn name(&self) -> &'static str {
        "docker"
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
