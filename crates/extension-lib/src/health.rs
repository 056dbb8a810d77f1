//! Component health and readiness for the liveness/readiness probes

use crate::cache::ResourceCache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Operational but serving possibly stale data
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub mod components {
    pub const RESOURCE_CACHE: &str = "resource_cache";
    pub const CHECK_ENGINE: &str = "check_engine";
    pub const DISCOVERY: &str = "discovery";
}

/// Tracks component health. Readiness flips once the caches have synced.
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(BTreeMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Derive the `resource_cache` component from the cache's sync state.
    /// A stopped cache keeps serving its last-known state, so it degrades
    /// rather than failing.
    pub async fn observe_cache(&self, cache: &ResourceCache) {
        let pending = cache.unsynced_kinds();
        let health = if !pending.is_empty() {
            let kinds: Vec<&str> = pending.iter().map(|kind| kind.as_str()).collect();
            ComponentHealth::unhealthy(format!("waiting for initial sync: {}", kinds.join(", ")))
        } else if cache.is_stopped() {
            ComponentHealth::degraded("watch streams stopped, serving last-known state")
        } else {
            ComponentHealth::healthy()
        };
        self.update(components::RESOURCE_CACHE, health).await;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let reason = if !ready {
            Some("Resource cache not yet synced".to_string())
        } else if !health.status.is_operational() {
            let failing: Vec<&str> = health
                .components
                .iter()
                .filter(|(_, h)| !h.status.is_operational())
                .map(|(name, _)| name.as_str())
                .collect();
            Some(format!("Unhealthy components: {}", failing.join(", ")))
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, StopSignal};
    use crate::models::Distribution;

    #[tokio::test]
    async fn test_initial_state_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Resource cache not yet synced"));
    }

    #[tokio::test]
    async fn test_degraded_component_keeps_readiness() {
        let registry = HealthRegistry::new();
        registry.register(components::CHECK_ENGINE).await;
        registry.register(components::DISCOVERY).await;
        registry.set_ready(true).await;
        registry
            .set_degraded(components::DISCOVERY, "slow cycle")
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_unhealthy_component_blocks_readiness() {
        let registry = HealthRegistry::new();
        registry.register(components::CHECK_ENGINE).await;
        registry.set_ready(true).await;
        registry
            .set_unhealthy(components::RESOURCE_CACHE, "sync lost")
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Unhealthy components: resource_cache")
        );
    }

    #[tokio::test]
    async fn test_observe_unsynced_cache() {
        let registry = HealthRegistry::new();
        let cache = ResourceCache::new(
            Distribution::Kubernetes,
            &CacheConfig::default(),
            StopSignal::new(),
        );

        registry.observe_cache(&cache).await;

        let health = registry.health().await;
        let component = &health.components[components::RESOURCE_CACHE];
        assert_eq!(component.status, ComponentStatus::Unhealthy);
        assert!(component
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("deployment"));
    }
}
