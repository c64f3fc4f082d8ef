//! Project configuration file.
//!
//! An optional `sizewatch.toml` next to the project supplies defaults for
//! values that rarely change between invocations. It sits at the lowest
//! precedence: command-line options and `SIZEWATCH_*` environment variables
//! always win.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "sizewatch.toml";

/// Defaults loadable from `sizewatch.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Base URL of the tracking API.
    pub api_url: Option<String>,

    /// ID of the bundleset readings are submitted for.
    pub bundleset: Option<String>,

    /// Include pattern applied when a directory is measured.
    pub include: Option<String>,

    /// Exclude pattern applied when a directory is measured.
    pub exclude: Option<String>,
}

impl ProjectConfig {
    /// Load configuration from the given directory, or return defaults when
    /// no config file exists.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: ProjectConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the given directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }
}
