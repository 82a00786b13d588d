//! Concrete domain collectors, one module per category.

pub mod app_config;
pub mod aws;
pub mod browser_data;
mod common;
pub mod docker;
pub mod dotfiles;
pub mod env_files;
pub mod fonts;
pub mod git_repos;
pub mod gpg;
pub mod kubernetes;
pub mod macos_defaults;
pub mod packages;
pub mod pem_files;
pub mod shell_history;
pub mod ssh;

use std::path::Path;

use crate::collector::Collector;

/// Build every known collector, bound to `home`, honoring
/// `skip_browsers`.
pub fn build_all(home: &Path, skip_browsers: bool) -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(dotfiles::DotfilesCollector::new(home)),
        Box::new(ssh::SshCollector::new(home)),
        Box::new(gpg::GpgCollector::new(home)),
        Box::new(aws::AwsCollector::new(home)),
        Box::new(app_config::AppConfigCollector::new(home)),
        Box::new(env_files::EnvFilesCollector::new(home)),
        Box::new(pem_files::PemFilesCollector::new(home)),
        Box::new(packages::PackagesCollector::new()),
        Box::new(macos_defaults::MacosDefaultsCollector::new()),
        Box::new(shell_history::ShellHistoryCollector::new(home)),
        Box::new(browser_data::BrowserDataCollector::new(home, skip_browsers)),
        Box::new(git_repos::GitReposCollector::new(home)),
        Box::new(fonts::FontsCollector::new(home)),
        Box::new(docker::DockerCollector::new(home)),
        Box::new(kubernetes::KubernetesCollector::new(home)),
    ]
}
