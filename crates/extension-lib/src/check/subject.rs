//! What a check observes: one workload, or the cluster's nodes

use super::mode::Counts;
use crate::query::ClusterQuery;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workload kinds a pod-count check can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
}

impl WorkloadKind {
    /// Target attributes in lookup order
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::Deployment,
        WorkloadKind::StatefulSet,
        WorkloadKind::DaemonSet,
        WorkloadKind::ReplicaSet,
    ];

    /// Target attribute carrying the workload name
    pub fn attribute(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "k8s.deployment",
            WorkloadKind::StatefulSet => "k8s.statefulset",
            WorkloadKind::DaemonSet => "k8s.daemonset",
            WorkloadKind::ReplicaSet => "k8s.replicaset",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::ReplicaSet => "ReplicaSet",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeThreshold {
    pub cluster_name: String,
    pub node_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CheckSubject {
    Workload(WorkloadRef),
    Nodes(NodeThreshold),
}

impl CheckSubject {
    /// Name used in check titles
    pub fn target(&self) -> &str {
        match self {
            CheckSubject::Workload(workload) => &workload.name,
            CheckSubject::Nodes(nodes) => &nodes.cluster_name,
        }
    }

    /// What is being counted
    pub fn unit(&self) -> &'static str {
        match self {
            CheckSubject::Workload(_) => "pods",
            CheckSubject::Nodes(_) => "nodes",
        }
    }

    /// Label for metrics
    pub fn check_name(&self) -> &'static str {
        match self {
            CheckSubject::Workload(_) => "pod-count",
            CheckSubject::Nodes(_) => "node-count",
        }
    }

    /// `"<Kind> <name>"`, used in errored titles
    pub fn describe(&self) -> String {
        match self {
            CheckSubject::Workload(w) => format!("{} {}", w.kind, w.name),
            CheckSubject::Nodes(n) => format!("Cluster {}", n.cluster_name),
        }
    }

    /// Read ready and desired counts from the cache; `None` if the target is gone
    pub fn observe(&self, query: &ClusterQuery) -> Option<Counts> {
        match self {
            CheckSubject::Workload(w) => observe_workload(w, query),
            CheckSubject::Nodes(n) => Some(Counts {
                ready: i32::try_from(query.node_ready_count()).unwrap_or(i32::MAX),
                desired: Some(n.node_count),
            }),
        }
    }
}

fn observe_workload(w: &WorkloadRef, query: &ClusterQuery) -> Option<Counts> {
    let (ns, name) = (w.namespace.as_str(), w.name.as_str());
    let counts = match w.kind {
        WorkloadKind::Deployment => {
            let d = query.deployment(ns, name)?;
            Counts {
                ready: d.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0),
                desired: d.spec.as_ref().and_then(|s| s.replicas),
            }
        }
        WorkloadKind::StatefulSet => {
            let s = query.stateful_set(ns, name)?;
            Counts {
                ready: s.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0),
                desired: s.spec.as_ref().and_then(|s| s.replicas),
            }
        }
        WorkloadKind::ReplicaSet => {
            let r = query.replica_set(ns, name)?;
            Counts {
                ready: r.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0),
                desired: r.spec.as_ref().and_then(|s| s.replicas),
            }
        }
        WorkloadKind::DaemonSet => {
            let d = query.daemon_set(ns, name)?;
            let status = d.status.as_ref();
            Counts {
                ready: status.map(|s| s.number_ready).unwrap_or(0),
                desired: status.map(|s| s.desired_number_scheduled),
            }
        }
    };
    Some(counts)
}
