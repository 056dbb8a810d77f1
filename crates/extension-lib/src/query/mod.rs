//! Read-only queries over the resource cache
//!
//! `ClusterQuery` is cheap to clone and never blocks on network I/O.
//! Lookups return `Arc` snapshots; absence is a valid result.

mod selector;

pub use selector::{Selector, SelectorError};

use crate::cache::{CachedKind, ResourceCache};
use crate::models::{Distribution, EventRecord};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct ClusterQuery {
    cache: Arc<ResourceCache>,
}

impl ClusterQuery {
    pub fn new(cache: Arc<ResourceCache>) -> Self {
        Self { cache }
    }

    pub fn distribution(&self) -> Distribution {
        self.cache.distribution()
    }

    /// Lookup by key. Cluster-scoped kinds take `None` as namespace.
    pub fn by_key<K: CachedKind>(&self, namespace: Option<&str>, name: &str) -> Option<Arc<K>> {
        self.cache.store::<K>().get(namespace, name)
    }

    /// Every cached object of one kind, unordered
    pub fn all<K: CachedKind>(&self) -> Vec<Arc<K>> {
        self.cache.store::<K>().list()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Arc<Deployment>> {
        self.by_key(Some(namespace), name)
    }

    pub fn replica_set(&self, namespace: &str, name: &str) -> Option<Arc<ReplicaSet>> {
        self.by_key(Some(namespace), name)
    }

    pub fn daemon_set(&self, namespace: &str, name: &str) -> Option<Arc<DaemonSet>> {
        self.by_key(Some(namespace), name)
    }

    pub fn stateful_set(&self, namespace: &str, name: &str) -> Option<Arc<StatefulSet>> {
        self.by_key(Some(namespace), name)
    }

    pub fn pod(&self, namespace: &str, name: &str) -> Option<Arc<Pod>> {
        self.by_key(Some(namespace), name)
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.by_key(Some(namespace), name)
    }

    pub fn node(&self, name: &str) -> Option<Arc<Node>> {
        self.by_key(None, name)
    }

    pub fn pods(&self) -> Vec<Arc<Pod>> {
        self.all()
    }

    pub fn deployments(&self) -> Vec<Arc<Deployment>> {
        self.all()
    }

    pub fn services(&self) -> Vec<Arc<Service>> {
        self.all()
    }

    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.all()
    }

    /// Pods in `namespace` selected by a workload selector. A selector that
    /// fails to parse selects nothing.
    pub fn pods_matching_selector(&self, namespace: &str, selector: &LabelSelector) -> Vec<Arc<Pod>> {
        let selector = match Selector::try_from(selector) {
            Ok(selector) => selector,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Ignoring unparseable label selector");
                return Vec::new();
            }
        };

        self.cache
            .store::<Pod>()
            .list_namespaced(namespace)
            .into_iter()
            .filter(|pod| selector.matches(pod.metadata.labels.as_ref()))
            .collect()
    }

    /// Pods governed by a Deployment's selector
    pub fn pods_by_workload(&self, deployment: &Deployment) -> Vec<Arc<Pod>> {
        let (Some(namespace), Some(spec)) = (deployment.namespace(), deployment.spec.as_ref()) else {
            return Vec::new();
        };
        self.pods_matching_selector(&namespace, &spec.selector)
    }

    /// Services in the pod's namespace whose selector matches the pod labels.
    /// Services without a selector never match.
    pub fn services_matching_pod(&self, pod: &Pod) -> Vec<Arc<Service>> {
        let Some(namespace) = pod.namespace() else {
            return Vec::new();
        };
        let labels = pod.metadata.labels.as_ref();

        self.cache
            .store::<Service>()
            .list_namespaced(&namespace)
            .into_iter()
            .filter(|service| {
                let Some(selector) = service.spec.as_ref().and_then(|s| s.selector.as_ref()) else {
                    return false;
                };
                !selector.is_empty() && Selector::from_labels(selector).matches(labels)
            })
            .collect()
    }

    /// Nodes whose `Ready` condition is `True`
    pub fn node_ready_count(&self) -> usize {
        self.nodes().iter().filter(|node| is_node_ready(node)).count()
    }

    /// Events strictly after `since`, oldest first
    pub fn events_since(&self, since: DateTime<Utc>) -> Vec<EventRecord> {
        self.cache.events().since(since)
    }
}

fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map_or(false, |conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}
