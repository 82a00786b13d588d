//! SSH keys and client config.
//!
//! `known_hosts` and `authorized_keys` are intentionally included: they are
//! low-sensitivity relative to the private keys already staged alongside
//! them, and useful for restoring a workstation's trust state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[".ssh"];

/// Collects the entire `~/.ssh` directory.
pub struct SshCollector {
    home: std::path::PathBuf,
}

impl SshCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        SshCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for SshCollector {
    fn name(&self) -> &'static str {
        "ssh"
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
