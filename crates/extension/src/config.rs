//! Extension configuration, read from `KUBE_EXTENSION_*` environment variables

use anyhow::{Context, Result};
use extension_lib::{CacheConfig, DiscoveryConfig};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    /// Name reported as `k8s.cluster-name`
    pub cluster_name: String,

    /// Comma separated label keys never surfaced as attributes
    #[serde(default)]
    pub label_filter: String,

    #[serde(default)]
    pub disable_discovery_excludes: bool,

    /// Port for health, metrics, checks and discovery
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_secs: u64,

    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

fn default_api_port() -> u16 {
    8088
}

fn default_sync_timeout() -> u64 {
    60
}

fn default_event_log_capacity() -> usize {
    extension_lib::cache::DEFAULT_EVENT_LOG_CAPACITY
}

impl ExtensionConfig {
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("KUBE_EXTENSION").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: ExtensionConfig = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
            .context("invalid KUBE_EXTENSION_* configuration (KUBE_EXTENSION_CLUSTER_NAME is required)")?;

        anyhow::ensure!(
            !config.cluster_name.trim().is_empty(),
            "KUBE_EXTENSION_CLUSTER_NAME must not be empty"
        );
        Ok(config)
    }

    pub fn label_filter(&self) -> Vec<String> {
        self.label_filter
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            sync_timeout: Duration::from_secs(self.sync_timeout_secs),
            event_log_capacity: self.event_log_capacity,
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            cluster_name: self.cluster_name.clone(),
            label_filter: self.label_filter(),
            disable_discovery_excludes: self.disable_discovery_excludes,
        }
    }
}
