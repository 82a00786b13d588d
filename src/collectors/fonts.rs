//! User-installed fonts.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[".local/share/fonts", "Library/Fonts"];

/// Collects per-user font directories (Linux XDG path and macOS path).
pub struct FontsCollector {
    home: std::path::PathBuf,
}

impl FontsCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        FontsCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for FontsCollector {
    fn name(&self) -> &'static str {
        "fonts"
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
