//! Configuration module
//!
//! Handles the CLI's own settings and loading of the job configuration file.

use anyhow::{Context, Result};
use skiff_core::domain::config::JobConfig;
use std::path::Path;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the build server
    pub target_url: String,
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.target_url.is_empty() {
            anyhow::bail!("target URL cannot be empty");
        }

        if !self.target_url.starts_with("http://") && !self.target_url.starts_with("https://") {
            anyhow::bail!("target URL must start with http:// or https://");
        }

        Ok(())
    }
}

/// Loads the job configuration file
///
/// `args` are appended to the configured run arguments, and every param whose
/// name is a set environment variable takes that variable's value.
pub fn load_job_config(path: &Path, args: &[String]) -> Result<JobConfig> {
    load_job_config_with(path, args, |key| {
        std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
    })
}

/// [`load_job_config`] with an explicit environment lookup
pub fn load_job_config_with<F>(path: &Path, args: &[String], lookup: F) -> Result<JobConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not open config file {}", path.display()))?;

    let mut config: JobConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("could not parse config file {}", path.display()))?;

    config.append_args(args.iter().cloned());
    config.apply_env_overrides(lookup);

    Ok(config)
}
