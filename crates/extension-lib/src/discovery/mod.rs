//! Container and deployment discovery
//!
//! Every cycle reads a fresh snapshot from the cache and turns it into
//! enrichment records. Pods and Deployments labelled with an exclusion
//! marker, directly or through an owning workload, are skipped unless
//! exclusion is disabled. Nothing is cached between cycles.

mod container;
mod deployment;
mod owners;

#[cfg(test)]
mod tests;

pub use container::strip_container_id;
pub use deployment::deployment_id;
pub use owners::{is_excluded_from_discovery, Owners, AGENT_LABEL, DISCOVERY_DISABLED_LABEL};

use crate::models::{EnrichmentDataType, EnrichmentRecord};
use crate::observability::{ExtensionMetrics, StructuredLogger};
use crate::query::ClusterQuery;
use kube::ResourceExt;
use std::time::Instant;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    pub cluster_name: String,
    /// Label keys never surfaced as attributes
    pub label_filter: Vec<String>,
    /// Ignore the exclusion markers
    pub disable_discovery_excludes: bool,
}

impl DiscoveryConfig {
    fn is_filtered(&self, label: &str) -> bool {
        self.label_filter.iter().any(|key| key == label)
    }
}

#[derive(Clone)]
pub struct DiscoveryEngine {
    query: ClusterQuery,
    config: DiscoveryConfig,
    metrics: ExtensionMetrics,
    logger: StructuredLogger,
}

impl DiscoveryEngine {
    pub fn new(query: ClusterQuery, config: DiscoveryConfig, logger: StructuredLogger) -> Self {
        Self {
            query,
            config,
            metrics: ExtensionMetrics::new(),
            logger,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// One record per started container of every visible pod, ordered by id
    pub fn container_records(&self) -> Vec<EnrichmentRecord> {
        let started = Instant::now();
        let distribution = self.query.distribution();

        let mut records: Vec<EnrichmentRecord> = self
            .query
            .pods()
            .iter()
            .filter_map(|pod| {
                let owners = Owners::resolve(pod, &self.query);
                if !self.config.disable_discovery_excludes
                    && (is_excluded_from_discovery(pod.labels()) || owners.excluded())
                {
                    trace!(pod = %pod.name_any(), "Pod excluded from discovery");
                    return None;
                }
                let services = self.query.services_matching_pod(pod);
                let attrs =
                    container::pod_attributes(pod, &owners, &services, &self.config, distribution);
                Some(container::container_records(pod, &attrs))
            })
            .flatten()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        self.finish_cycle(EnrichmentDataType::Container, &records, started);
        records
    }

    /// One record per visible Deployment, ordered by id
    pub fn deployment_records(&self) -> Vec<EnrichmentRecord> {
        let started = Instant::now();
        let distribution = self.query.distribution();

        let mut records: Vec<EnrichmentRecord> = self
            .query
            .deployments()
            .iter()
            .filter(|d| {
                self.config.disable_discovery_excludes || !is_excluded_from_discovery(d.labels())
            })
            .filter_map(|d| {
                deployment::deployment_record(d, &self.query, &self.config, distribution)
            })
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        self.finish_cycle(EnrichmentDataType::Deployment, &records, started);
        records
    }

    fn finish_cycle(&self, record_type: EnrichmentDataType, records: &[EnrichmentRecord], started: Instant) {
        let elapsed = started.elapsed();
        self.metrics
            .observe_discovery(record_type.as_str(), elapsed.as_secs_f64(), records.len());
        self.logger.log_discovery_cycle(
            record_type.as_str(),
            records.len(),
            elapsed.as_millis() as u64,
        );
    }
}
