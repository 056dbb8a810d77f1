//! Observability infrastructure for the extension
//!
//! Provides:
//! - Prometheus metrics (cached objects per kind, watch errors, sync time,
//!   discovery latency, check outcomes)
//! - Structured JSON lifecycle logging with tracing

use crate::models::ResourceKind;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Histogram, HistogramVec, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Cache sync can take a while on large clusters
const SYNC_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0];

static GLOBAL_METRICS: OnceLock<MetricsInner> = OnceLock::new();

struct MetricsInner {
    cached_objects: IntGaugeVec,
    watch_errors: IntCounterVec,
    cache_sync_seconds: Histogram,
    discovery_latency_seconds: HistogramVec,
    enrichment_records: IntCounterVec,
    checks_completed: IntCounterVec,
}

impl MetricsInner {
    fn new() -> Self {
        Self {
            cached_objects: register_int_gauge_vec!(
                "kube_extension_cached_objects",
                "Number of objects currently held in the resource cache",
                &["kind"]
            )
            .expect("Failed to register cached_objects"),

            watch_errors: register_int_counter_vec!(
                "kube_extension_watch_errors_total",
                "Total number of watch stream errors",
                &["kind"]
            )
            .expect("Failed to register watch_errors"),

            cache_sync_seconds: register_histogram!(
                "kube_extension_cache_sync_seconds",
                "Time until every watch stream delivered its initial listing",
                SYNC_BUCKETS.to_vec()
            )
            .expect("Failed to register cache_sync_seconds"),

            discovery_latency_seconds: register_histogram_vec!(
                "kube_extension_discovery_latency_seconds",
                "Time spent computing one discovery cycle",
                &["type"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register discovery_latency_seconds"),

            enrichment_records: register_int_counter_vec!(
                "kube_extension_enrichment_records_total",
                "Total number of enrichment records emitted",
                &["type"]
            )
            .expect("Failed to register enrichment_records"),

            checks_completed: register_int_counter_vec!(
                "kube_extension_checks_completed_total",
                "Total number of checks that reached their deadline, by outcome",
                &["check", "outcome"]
            )
            .expect("Failed to register checks_completed"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExtensionMetrics {
    _private: (),
}

impl Default for ExtensionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionMetrics {
    /// Create a metrics handle (registers the global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MetricsInner {
        GLOBAL_METRICS.get_or_init(MetricsInner::new)
    }

    pub fn set_cached_objects(&self, kind: ResourceKind, count: i64) {
        self.inner()
            .cached_objects
            .with_label_values(&[kind.as_str()])
            .set(count);
    }

    pub fn inc_watch_errors(&self, kind: ResourceKind) {
        self.inner()
            .watch_errors
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn observe_cache_sync(&self, duration_secs: f64) {
        self.inner().cache_sync_seconds.observe(duration_secs);
    }

    /// Record one discovery cycle for a record type
    pub fn observe_discovery(&self, record_type: &str, duration_secs: f64, records: usize) {
        let inner = self.inner();
        inner
            .discovery_latency_seconds
            .with_label_values(&[record_type])
            .observe(duration_secs);
        inner
            .enrichment_records
            .with_label_values(&[record_type])
            .inc_by(records as u64);
    }

    /// `outcome` is one of `passed`, `failed`, `errored`
    pub fn inc_checks_completed(&self, check: &str, outcome: &str) {
        self.inner()
            .checks_completed
            .with_label_values(&[check, outcome])
            .inc();
    }
}

/// Structured logger for extension lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    cluster_name: String,
}

impl StructuredLogger {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, distribution: &str) {
        info!(
            event = "extension_started",
            cluster = %self.cluster_name,
            extension_version = %version,
            distribution = %distribution,
            "Kube extension started"
        );
    }

    pub fn log_cache_synced(&self, objects: usize) {
        info!(
            event = "cache_synced",
            cluster = %self.cluster_name,
            objects = objects,
            "Resource cache ready"
        );
    }

    /// Log a check that reached its deadline
    pub fn log_check_completed(&self, target: &str, mode: &str, error: Option<&str>) {
        match error {
            Some(title) => {
                warn!(
                    event = "check_completed",
                    cluster = %self.cluster_name,
                    target = %target,
                    mode = %mode,
                    passed = false,
                    error = %title,
                    "Check completed with error"
                );
            }
            None => {
                info!(
                    event = "check_completed",
                    cluster = %self.cluster_name,
                    target = %target,
                    mode = %mode,
                    passed = true,
                    "Check completed"
                );
            }
        }
    }

    pub fn log_discovery_cycle(&self, record_type: &str, records: usize, elapsed_ms: u64) {
        info!(
            event = "discovery_cycle",
            cluster = %self.cluster_name,
            record_type = %record_type,
            records = records,
            elapsed_ms = elapsed_ms,
            "Discovery cycle finished"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "extension_shutdown",
            cluster = %self.cluster_name,
            reason = %reason,
            "Kube extension shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = ExtensionMetrics::new();
        metrics.set_cached_objects(ResourceKind::Service, 4);
        metrics.inc_watch_errors(ResourceKind::Service);
        metrics.observe_cache_sync(0.3);
        metrics.observe_discovery("com.kube-extension.container", 0.002, 7);
        metrics.inc_checks_completed("pod-count", "passed");

        let _other = ExtensionMetrics::new();
        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"kube_extension_cached_objects".to_string()));
        assert!(names.contains(&"kube_extension_checks_completed_total".to_string()));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("prod-eu");
        assert_eq!(logger.cluster_name, "prod-eu");
    }
}
