//! Deployment enrichment records

use super::container::strip_container_id;
use super::owners::is_excluded_from_discovery;
use super::DiscoveryConfig;
use crate::models::{Attributes, Distribution, EnrichmentDataType, EnrichmentRecord};
use crate::query::ClusterQuery;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;

/// Record id: `<cluster>/<namespace>/<name>`
pub fn deployment_id(cluster_name: &str, namespace: &str, name: &str) -> String {
    format!("{cluster_name}/{namespace}/{name}")
}

pub(super) fn deployment_record(
    deployment: &Deployment,
    query: &ClusterQuery,
    config: &DiscoveryConfig,
    distribution: Distribution,
) -> Option<EnrichmentRecord> {
    let namespace = deployment.namespace()?;
    let name = deployment.name_any();

    let mut attrs = Attributes::new();
    attrs.insert("k8s.cluster-name", config.cluster_name.as_str());
    attrs.insert("k8s.namespace", namespace.as_str());
    attrs.insert("k8s.deployment", name.as_str());
    for (key, value) in deployment.labels() {
        if config.is_filtered(key) {
            continue;
        }
        attrs.insert(format!("k8s.deployment.label.{key}"), value.as_str());
        attrs.insert(format!("k8s.label.{key}"), value.as_str());
    }

    for pod in query.pods_by_workload(deployment) {
        if !config.disable_discovery_excludes && is_excluded_from_discovery(pod.labels()) {
            continue;
        }
        attrs.insert("k8s.pod.name", pod.name_any());

        let statuses = pod
            .status
            .as_ref()
            .and_then(|status| status.container_statuses.as_deref())
            .unwrap_or_default();
        for id in statuses
            .iter()
            .filter_map(|s| s.container_id.as_deref())
            .filter(|id| !id.is_empty())
        {
            attrs.insert("k8s.container.id", id);
            attrs.insert("k8s.container.id.stripped", strip_container_id(id));
        }

        attrs.extend(
            "k8s.service.name",
            query.services_matching_pod(&pod).iter().map(|s| s.name_any()),
        );
    }
    attrs.insert("k8s.distribution", distribution.as_str());

    Some(attrs.into_record(
        deployment_id(&config.cluster_name, &namespace, &name),
        EnrichmentDataType::Deployment,
    ))
}
