//! Kubernetes distribution detection

use crate::models::Distribution;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

/// Body of `GET /` on the API server
#[derive(Debug, Deserialize)]
struct RootPaths {
    #[serde(default)]
    paths: Vec<String>,
}

/// Source of the API server's advertised root paths
#[async_trait]
pub trait RootPathProbe: Send + Sync {
    async fn root_paths(&self) -> Result<Vec<String>, kube::Error>;
}

#[async_trait]
impl RootPathProbe for kube::Client {
    async fn root_paths(&self) -> Result<Vec<String>, kube::Error> {
        let request = http::Request::get("/")
            .body(Vec::new())
            .map_err(kube::Error::HttpError)?;
        let root: RootPaths = self.request(request).await?;
        Ok(root.paths)
    }
}

/// Probe the API root once and classify the cluster
pub async fn detect_distribution(probe: &dyn RootPathProbe) -> Result<Distribution, kube::Error> {
    let paths = probe.root_paths().await?;
    let distribution = Distribution::from_root_paths(&paths);
    info!(distribution = %distribution, "Detected cluster distribution");
    Ok(distribution)
}
