//! API client for the kube-extension HTTP surface

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// GET that fails on any non-success status
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// GET that returns the body for any status. Health endpoints answer
    /// 503 with a JSON body.
    pub async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl EnrichmentRecord {
    /// Attribute values joined for display
    pub fn attribute(&self, key: &str) -> String {
        self.attributes
            .get(key)
            .map(|values| values.join(","))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentDataResponse {
    pub enrichment_data: Vec<EnrichmentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: String,
    pub involved_object: InvolvedObject,
    pub reason: Option<String>,
    pub event_type: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    pub duration: u64,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckTarget {
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl CheckTarget {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.attributes
            .insert(key.to_string(), vec![value.to_string()]);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub config: CheckConfig,
    pub target: CheckTarget,
}

/// Check state handed back verbatim on every poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub state: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckError {
    pub title: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResult {
    pub completed: bool,
    pub failing: bool,
    #[serde(default)]
    pub error: Option<CheckError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default)]
    pub reason: Option<String>,
}
