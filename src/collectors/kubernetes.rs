//! Kubernetes client configuration.
//!
//! Stages `~/.kube/config` verbatim, including any embedded credentials,
//! the same trust boundary as the rest of this category's sensitive files,
//! sealed by the same encryption step.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[".kube/config", ".kube/config.d"];

/// Collects `~/.kube` client configuration.
pub struct KubernetesCollector {
    home: std::path::PathBuf,
}

impl KubernetesCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        KubernetesCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for KubernetesCollector {
    fn name(&self) -> &'static str {
        "kubernetes"
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
