//! AWS CLI credentials and config.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[".aws/credentials", ".aws/config"];

/// Collects `~/.aws/credentials` and `~/.aws/config`.
pub struct AwsCollector {
    home: std::path::PathBuf,
}

impl AwsCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        AwsCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for AwsCollector {
    fn name(&self) -> &'static str {
        "aws"
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
