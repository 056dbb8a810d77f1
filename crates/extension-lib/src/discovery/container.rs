//! Container enrichment records

use super::owners::Owners;
use super::DiscoveryConfig;
use crate::models::{Attributes, Distribution, EnrichmentDataType, EnrichmentRecord};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod, Service};
use kube::ResourceExt;
use std::sync::Arc;

/// Container ID without its runtime scheme, e.g. `crio://abc` to `abc`
pub fn strip_container_id(id: &str) -> &str {
    id.split_once("://").map_or(id, |(_, rest)| rest)
}

fn is_ready(status: &ContainerStatus) -> bool {
    status.ready
        && status
            .state
            .as_ref()
            .map_or(false, |state| state.running.is_some())
}

/// Pod-level attributes shared by every container record of a pod
pub(super) fn pod_attributes(
    pod: &Pod,
    owners: &Owners,
    services: &[Arc<Service>],
    config: &DiscoveryConfig,
    distribution: Distribution,
) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("k8s.cluster-name", config.cluster_name.as_str());
    attrs.extend("k8s.namespace", pod.namespace());
    attrs.insert("k8s.pod.name", pod.name_any());
    attrs.extend(
        "k8s.node.name",
        pod.spec.as_ref().and_then(|spec| spec.node_name.clone()),
    );
    for (key, value) in pod.labels() {
        if config.is_filtered(key) {
            continue;
        }
        attrs.insert(format!("k8s.pod.label.{key}"), value.as_str());
        attrs.insert(format!("k8s.label.{key}"), value.as_str());
    }
    attrs.extend("k8s.service.name", services.iter().map(|s| s.name_any()));
    attrs.insert("k8s.distribution", distribution.as_str());
    owners.add_attributes(&mut attrs);
    attrs
}

/// One record per started container of `pod`
pub(super) fn container_records(pod: &Pod, pod_attrs: &Attributes) -> Vec<EnrichmentRecord> {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_deref())
        .unwrap_or_default();

    statuses
        .iter()
        .filter_map(|status| {
            let id = status.container_id.as_deref().filter(|id| !id.is_empty())?;
            let mut attrs = pod_attrs.clone();
            attrs.insert("k8s.container.id", id);
            attrs.insert("k8s.container.id.stripped", strip_container_id(id));
            attrs.insert("k8s.container.name", status.name.as_str());
            attrs.insert("k8s.container.image", status.image.as_str());
            attrs.insert("k8s.container.ready", is_ready(status).to_string());
            Some(attrs.into_record(id, EnrichmentDataType::Container))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_container_id() {
        assert_eq!(strip_container_id("crio://abcdef"), "abcdef");
        assert_eq!(strip_container_id("containerd://0f1e"), "0f1e");
        assert_eq!(strip_container_id("abcdef"), "abcdef");
    }

    #[test]
    fn test_ready_requires_running_state() {
        let mut status = ContainerStatus {
            ready: true,
            ..Default::default()
        };
        assert!(!is_ready(&status));

        status.state = Some(k8s_openapi::api::core::v1::ContainerState {
            running: Some(Default::default()),
            ..Default::default()
        });
        assert!(is_ready(&status));
    }
}
