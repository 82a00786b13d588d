//! Browser profile data: bookmarks and saved-login databases. Skipped
//! entirely when the Orchestrator's
//! `skip_browsers` option is set, since profile directories are the
//! single largest and most rapidly-churning category.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[
    "Library/Application Support/Google/Chrome/Default/Bookmarks",
    "Library/Application Support/Firefox/Profiles",
    ".config/google-chrome/Default/Bookmarks",
    ".mozilla/firefox",
];

/// Collects bookmark and profile data from common browsers.
pub struct BrowserDataCollector {
    home: std::path::PathBuf,
    skip: bool,
}

impl BrowserDataCollector {
    pub fn new(home: impl Into<std::path::PathBuf>, skip: bool) -> Self {
        BrowserDataCollector { home: home.into(), skip }
    }
}

#[async_trait]
impl Collector for BrowserDataCollector {
    fn name(&self) -> &'static str {
        "browser-data"
    }

    async fn stage_into(
        &self,
        staging: &StagingDir,
        meta: &Arc<SharedMetadata>,
        incr: Option<&IncrementalIndex>,
        dry_run: bool,
    ) -> Result<()> {
        if self.skip {
            return Ok(());
        }
        stage_candidates(self.name(), staging, meta, incr, &self.home, CANDIDATES, &[], dry_run)?;
        Ok(())
    }
}
