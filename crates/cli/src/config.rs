//! Configuration file for the CLI (`~/.config/kx/config.json`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:8088";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Extension endpoint URL
    pub api_url: Option<String>,
    /// Cluster name used by `kx check nodes` when `--cluster` is omitted
    pub cluster_name: Option<String>,
}

impl Config {
    /// Load the user's configuration; a missing file yields the defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Flag or env value first, then the file, then the default
    pub fn resolve_api_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("kx").join("config.json"))
    }
}
