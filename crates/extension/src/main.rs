//! Kube Extension - cluster mirror serving checks and discovery
//!
//! Runs as a single Deployment per cluster. Watches workload, networking
//! and node state, then answers pod-count/node-count checks and container
//! and deployment discovery requests over HTTP.

use anyhow::{Context, Result};
use extension_lib::{
    health::{components, HealthRegistry},
    CheckEngine, ClusterQuery, DiscoveryEngine, ResourceCache, StopSignal, StructuredLogger,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const EXTENSION_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting kube-extension");

    let config = config::ExtensionConfig::load()?;
    info!(cluster_name = %config.cluster_name, "Extension configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CHECK_ENGINE).await;
    health_registry.register(components::DISCOVERY).await;

    let logger = StructuredLogger::new(&config.cluster_name);
    let stop = StopSignal::new();

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    // Raise the stop signal on Ctrl-C, also while the caches are still syncing
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal_stop.raise();
    });

    let cache = ResourceCache::start(client, &config.cache_config(), stop.clone())
        .await
        .context("resource cache failed to sync")?;
    health_registry.observe_cache(&cache).await;
    health_registry.set_ready(true).await;

    logger.log_startup(EXTENSION_VERSION, cache.distribution().as_str());
    logger.log_cache_synced(cache.object_count());

    let query = ClusterQuery::new(Arc::clone(&cache));
    let checks = CheckEngine::new(query.clone(), logger.clone());
    let discovery = DiscoveryEngine::new(query, config.discovery_config(), logger.clone());
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        Arc::clone(&cache),
        checks,
        discovery,
    ));

    let server_stop = stop.clone();
    let server = api::serve(config.api_port, app_state, async move {
        server_stop.raised().await;
    });
    if let Err(e) = server.await {
        error!(error = %e, "API server failed");
        stop.raise();
    }

    logger.log_shutdown("stop signal raised");
    health_registry.set_ready(false).await;
    cache.shutdown().await;

    Ok(())
}
