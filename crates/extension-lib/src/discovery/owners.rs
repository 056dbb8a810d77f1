//! Owner resolution and the exclusion label policy

use crate::models::Attributes;
use crate::query::ClusterQuery;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Marks a resource as invisible to discovery
pub const DISCOVERY_DISABLED_LABEL: &str = "discovery-disabled";
/// Marks the extension's own agent workloads
pub const AGENT_LABEL: &str = "extension-agent";

/// Whether a label set carries one of the exclusion markers set to `true`
pub fn is_excluded_from_discovery(labels: &BTreeMap<String, String>) -> bool {
    [DISCOVERY_DISABLED_LABEL, AGENT_LABEL]
        .iter()
        .filter_map(|key| labels.get(*key))
        .any(|value| value.eq_ignore_ascii_case("true"))
}

/// Workloads owning a pod, as far as the cache can resolve them
#[derive(Debug, Default)]
pub struct Owners {
    pub replica_set: Option<Arc<ReplicaSet>>,
    pub deployment: Option<Arc<Deployment>>,
    pub stateful_set: Option<Arc<StatefulSet>>,
    pub daemon_set: Option<Arc<DaemonSet>>,
}

impl Owners {
    /// Follow owner references from `pod` (ReplicaSet to Deployment,
    /// StatefulSet, DaemonSet). Owners missing from the cache are skipped.
    pub fn resolve(pod: &Pod, query: &ClusterQuery) -> Self {
        let mut owners = Owners::default();
        let Some(namespace) = pod.namespace() else {
            return owners;
        };

        for reference in pod.owner_references() {
            match reference.kind.as_str() {
                "ReplicaSet" => {
                    owners.replica_set = query.replica_set(&namespace, &reference.name);
                }
                "StatefulSet" => {
                    owners.stateful_set = query.stateful_set(&namespace, &reference.name);
                }
                "DaemonSet" => {
                    owners.daemon_set = query.daemon_set(&namespace, &reference.name);
                }
                _ => {}
            }
        }

        if let Some(replica_set) = owners.replica_set.as_ref() {
            owners.deployment = replica_set
                .owner_references()
                .iter()
                .find(|r| r.kind == "Deployment")
                .and_then(|r| query.deployment(&namespace, &r.name));
        }
        owners
    }

    fn label_sets(&self) -> impl Iterator<Item = &BTreeMap<String, String>> {
        [
            self.replica_set.as_ref().map(|o| o.labels()),
            self.deployment.as_ref().map(|o| o.labels()),
            self.stateful_set.as_ref().map(|o| o.labels()),
            self.daemon_set.as_ref().map(|o| o.labels()),
        ]
        .into_iter()
        .flatten()
    }

    /// Whether any resolved owner carries an exclusion marker
    pub fn excluded(&self) -> bool {
        self.label_sets().any(is_excluded_from_discovery)
    }

    pub fn add_attributes(&self, attrs: &mut Attributes) {
        if let Some(o) = &self.deployment {
            attrs.insert("k8s.deployment", o.name_any());
        }
        if let Some(o) = &self.replica_set {
            attrs.insert("k8s.replicaset", o.name_any());
        }
        if let Some(o) = &self.stateful_set {
            attrs.insert("k8s.statefulset", o.name_any());
        }
        if let Some(o) = &self.daemon_set {
            attrs.insert("k8s.daemonset", o.name_any());
        }
    }
}
