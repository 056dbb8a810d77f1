//! HTTP API: health, metrics, checks, discovery and events

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use extension_lib::{
    check::PrepareError,
    health::{ComponentStatus, HealthRegistry},
    CheckConfig, CheckEngine, CheckState, CheckTarget, ClusterQuery, DiscoveryEngine,
    EnrichmentRecord, EventRecord, PollResult, ResourceCache,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub cache: Arc<ResourceCache>,
    pub query: ClusterQuery,
    pub checks: CheckEngine,
    pub discovery: DiscoveryEngine,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        cache: Arc<ResourceCache>,
        checks: CheckEngine,
        discovery: DiscoveryEngine,
    ) -> Self {
        Self {
            health_registry,
            query: ClusterQuery::new(Arc::clone(&cache)),
            cache,
            checks,
            discovery,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request failures mapped to HTTP statuses
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<PrepareError> for ApiError {
    fn from(e: PrepareError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            ApiError::Internal(error) => (StatusCode::INTERNAL_SERVER_ERROR, error),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PrepareRequest {
    pub config: CheckConfig,
    #[serde(default)]
    pub target: CheckTarget,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub state: CheckState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentDataResponse {
    pub enrichment_data: Vec<EnrichmentRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
}

/// 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.health_registry.observe_cache(&state.cache).await;
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {e}")))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

async fn prepare_pod_count(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PrepareRequest>,
) -> Result<Json<StateEnvelope>, ApiError> {
    let check_state = state
        .checks
        .prepare_pod_count(&request.config, &request.target)
        .map_err(|e| {
            warn!(error = %e, "Rejected pod-count check");
            ApiError::from(e)
        })?;
    Ok(Json(StateEnvelope { state: check_state }))
}

async fn prepare_node_count(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PrepareRequest>,
) -> Result<Json<StateEnvelope>, ApiError> {
    let check_state = state
        .checks
        .prepare_node_count(&request.config, &request.target)
        .map_err(|e| {
            warn!(error = %e, "Rejected node-count check");
            ApiError::from(e)
        })?;
    Ok(Json(StateEnvelope { state: check_state }))
}

async fn check_status(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<StateEnvelope>,
) -> Json<PollResult> {
    Json(state.checks.status(&envelope.state))
}

async fn container_enrichment_data(State(state): State<Arc<AppState>>) -> Json<EnrichmentDataResponse> {
    Json(EnrichmentDataResponse {
        enrichment_data: state.discovery.container_records(),
    })
}

async fn deployment_enrichment_data(State(state): State<Arc<AppState>>) -> Json<EnrichmentDataResponse> {
    Json(EnrichmentDataResponse {
        enrichment_data: state.discovery.deployment_records(),
    })
}

/// Events newer than `since`; everything retained when omitted
async fn events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let since = params.since.unwrap_or(DateTime::<Utc>::MIN_UTC);
    Json(EventsResponse {
        events: state.query.events_since(since),
    })
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/checks/pod-count/prepare", post(prepare_pod_count))
        .route("/checks/node-count/prepare", post(prepare_node_count))
        .route("/checks/status", post(check_status))
        .route("/discovery/container/enrichment-data", get(container_enrichment_data))
        .route("/discovery/deployment/enrichment-data", get(deployment_enrichment_data))
        .route("/events", get(events))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
