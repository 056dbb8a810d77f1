//! Object builders shared by unit tests

use crate::cache::{CacheConfig, ResourceCache, StopSignal};
use crate::models::Distribution;
use crate::query::ClusterQuery;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetStatus, Deployment, DeploymentSpec, DeploymentStatus, ReplicaSet,
    ReplicaSetSpec, StatefulSet, StatefulSetSpec, StatefulSetStatus,
};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStatus, Event as KubeEvent, Node,
    NodeCondition, NodeStatus, ObjectReference, Pod, PodSpec, PodStatus, Service, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta, OwnerReference, Time,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn owner(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("uid-{}", name),
        controller: Some(true),
        ..Default::default()
    }
}

/// Empty cache plus a query facade over it
pub fn query(distribution: Distribution) -> (Arc<ResourceCache>, ClusterQuery) {
    let cache = Arc::new(ResourceCache::new(
        distribution,
        &CacheConfig::default(),
        StopSignal::new(),
    ));
    let query = ClusterQuery::new(Arc::clone(&cache));
    (cache, query)
}

pub struct PodBuilder {
    pod: Pod,
}

pub fn pod(namespace: &str, name: &str) -> PodBuilder {
    PodBuilder {
        pod: Pod {
            metadata: meta(Some(namespace), name),
            spec: Some(PodSpec::default()),
            status: Some(PodStatus::default()),
        },
    }
}

impl PodBuilder {
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.pod
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn node(mut self, node_name: &str) -> Self {
        if let Some(spec) = self.pod.spec.as_mut() {
            spec.node_name = Some(node_name.to_string());
        }
        self
    }

    pub fn owned_by(mut self, kind: &str, name: &str) -> Self {
        self.pod
            .metadata
            .owner_references
            .get_or_insert_with(Vec::new)
            .push(owner(kind, name));
        self
    }

    /// Add a container status; `id` of `None` models a container not yet created
    pub fn container(mut self, name: &str, id: Option<&str>, image: &str, ready: bool) -> Self {
        let state = ready.then(|| ContainerState {
            running: Some(ContainerStateRunning::default()),
            ..Default::default()
        });
        let status = ContainerStatus {
            name: name.to_string(),
            container_id: id.map(str::to_string),
            image: image.to_string(),
            ready,
            state,
            ..Default::default()
        };
        if let Some(pod_status) = self.pod.status.as_mut() {
            pod_status
                .container_statuses
                .get_or_insert_with(Vec::new)
                .push(status);
        }
        self
    }

    pub fn build(self) -> Pod {
        self.pod
    }
}

pub struct DeploymentBuilder {
    deployment: Deployment,
}

pub fn deployment(namespace: &str, name: &str) -> DeploymentBuilder {
    DeploymentBuilder {
        deployment: Deployment {
            metadata: meta(Some(namespace), name),
            spec: Some(DeploymentSpec::default()),
            status: Some(DeploymentStatus::default()),
        },
    }
}

impl DeploymentBuilder {
    pub fn replicas(mut self, desired: i32) -> Self {
        if let Some(spec) = self.deployment.spec.as_mut() {
            spec.replicas = Some(desired);
        }
        self
    }

    pub fn ready(mut self, ready: i32) -> Self {
        if let Some(status) = self.deployment.status.as_mut() {
            status.ready_replicas = Some(ready);
        }
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.deployment
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn selector(mut self, key: &str, value: &str) -> Self {
        if let Some(spec) = self.deployment.spec.as_mut() {
            spec.selector
                .match_labels
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn build(self) -> Deployment {
        self.deployment
    }
}

pub fn replica_set(namespace: &str, name: &str, deployment: Option<&str>) -> ReplicaSet {
    let mut metadata = meta(Some(namespace), name);
    if let Some(deployment) = deployment {
        metadata.owner_references = Some(vec![owner("Deployment", deployment)]);
    }
    ReplicaSet {
        metadata,
        spec: Some(ReplicaSetSpec {
            selector: LabelSelector::default(),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn stateful_set(namespace: &str, name: &str, desired: Option<i32>, ready: i32) -> StatefulSet {
    StatefulSet {
        metadata: meta(Some(namespace), name),
        spec: Some(StatefulSetSpec {
            replicas: desired,
            ..Default::default()
        }),
        status: Some(StatefulSetStatus {
            ready_replicas: Some(ready),
            ..Default::default()
        }),
    }
}

pub fn daemon_set(namespace: &str, name: &str, desired: i32, ready: i32) -> DaemonSet {
    DaemonSet {
        metadata: meta(Some(namespace), name),
        spec: None,
        status: Some(DaemonSetStatus {
            desired_number_scheduled: desired,
            number_ready: ready,
            ..Default::default()
        }),
    }
}

pub fn service(namespace: &str, name: &str, selector: &[(&str, &str)]) -> Service {
    Service {
        metadata: meta(Some(namespace), name),
        spec: Some(ServiceSpec {
            selector: Some(labels(selector)),
            ..Default::default()
        }),
        status: None,
    }
}

pub fn service_without_selector(namespace: &str, name: &str) -> Service {
    Service {
        metadata: meta(Some(namespace), name),
        spec: Some(ServiceSpec::default()),
        status: None,
    }
}

pub fn node(name: &str, ready: bool) -> Node {
    Node {
        metadata: meta(None, name),
        spec: None,
        status: Some(NodeStatus {
            conditions: Some(vec![
                NodeCondition {
                    type_: "MemoryPressure".to_string(),
                    status: "False".to_string(),
                    ..Default::default()
                },
                NodeCondition {
                    type_: "Ready".to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
    }
}

pub fn event(name: &str, at: DateTime<Utc>, message: &str) -> KubeEvent {
    KubeEvent {
        metadata: meta(Some("default"), name),
        involved_object: ObjectReference {
            kind: Some("Pod".to_string()),
            namespace: Some("default".to_string()),
            name: Some("shop".to_string()),
            ..Default::default()
        },
        last_timestamp: Some(Time(at)),
        message: Some(message.to_string()),
        reason: Some("Started".to_string()),
        type_: Some("Normal".to_string()),
        ..Default::default()
    }
}
