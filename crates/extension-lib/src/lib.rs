//! Core library for the Kubernetes extension
//!
//! This crate provides the core functionality for:
//! - A watch-synchronized mirror of cluster workload and networking state
//! - Read-only queries over that mirror
//! - Pod-count and node-count checks polled until a deadline
//! - Container and deployment discovery for telemetry enrichment
//! - Health checks and observability

pub mod cache;
pub mod check;
pub mod discovery;
pub mod health;
pub mod models;
pub mod observability;
pub mod query;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cache::{CacheConfig, CacheError, ResourceCache, StopSignal};
pub use check::{
    CheckConfig, CheckEngine, CheckError, CheckMode, CheckState, CheckStatus, CheckTarget, PollResult,
    PrepareError,
};
pub use discovery::{DiscoveryConfig, DiscoveryEngine};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExtensionMetrics, StructuredLogger};
pub use query::ClusterQuery;
