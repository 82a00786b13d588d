//! Application configuration under `~/.config` and a handful of
//! well-known top-level app config directories.
//!
//! Named `app_config` at the module level to avoid colliding with the
//! crate's own [`crate::config`]; the staged archive prefix is still
//! `config`, set via [`AppConfigCollector::name`] / the category tag
//! passed to `StagingDir`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::archive::DEFAULT_EXCLUSIONS;
use crate::collector::{Collector, StagingDir};
use crate::collectors::common::stage_candidates;
use crate::error::Result;
use crate::incremental::IncrementalIndex;
use crate::metadata::SharedMetadata;

const CANDIDATES: &[&str] = &[
    ".config/nvim",
    ".config/alacritty",
    ".config/kitty",
    ".config/git",
    ".config/fish",
    ".config/starship.toml",
    ".config/direnv",
    ".vim",
];

/// Collects application configuration directories and files.
pub struct AppConfigCollector {
    home: std::path::PathBuf,
}

impl AppConfigCollector {
    pub fn new(home: impl Into<std::path::PathBuf>) -> Self {
        AppConfigCollector { home: home.into() }
    }
}

#[async_trait]
impl Collector for AppConfigCollector {
    fn name(&self) -> &'static str {
        "config"
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
