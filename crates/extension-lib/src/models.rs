//! Core data models for the extension

use chrono::{DateTime, Utc};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Resource kinds mirrored by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Deployment,
    ReplicaSet,
    DaemonSet,
    StatefulSet,
    Pod,
    Service,
    Node,
    Event,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::ReplicaSet => "replicaset",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::StatefulSet => "statefulset",
            ResourceKind::Pod => "pod",
            ResourceKind::Service => "service",
            ResourceKind::Node => "node",
            ResourceKind::Event => "event",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a cached object. Cluster-scoped kinds have no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn of<K: kube::Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Kubernetes distribution the extension is connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Kubernetes,
    OpenShift,
}

impl Distribution {
    /// Classify a cluster by the paths advertised on its API root.
    /// OpenShift exposes the legacy `/oapi` group path.
    pub fn from_root_paths<S: AsRef<str>>(paths: &[S]) -> Self {
        let legacy = paths
            .iter()
            .any(|p| matches!(p.as_ref(), "/oapi" | "oapi"));
        if legacy {
            Distribution::OpenShift
        } else {
            Distribution::Kubernetes
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Kubernetes => "kubernetes",
            Distribution::OpenShift => "openshift",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the object an event is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

/// One observation of a cluster event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub involved_object: InvolvedObject,
    pub reason: Option<String>,
    pub event_type: Option<String>,
    pub message: String,
}

/// Kind of enrichment record produced by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrichmentDataType {
    #[serde(rename = "com.kube-extension.container")]
    Container,
    #[serde(rename = "com.kube-extension.deployment")]
    Deployment,
}

impl EnrichmentDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentDataType::Container => "com.kube-extension.container",
            EnrichmentDataType::Deployment => "com.kube-extension.deployment",
        }
    }
}

/// Attribute bundle describing one telemetry-visible identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: EnrichmentDataType,
    pub attributes: BTreeMap<String, BTreeSet<String>>,
}

impl EnrichmentRecord {
    /// Values of a single attribute, if present
    pub fn attribute(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.attributes.get(key)
    }
}

/// Builder for multi-valued attribute maps
#[derive(Debug, Clone, Default)]
pub struct Attributes(BTreeMap<String, BTreeSet<String>>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to an attribute
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().insert(value.into());
    }

    /// Add several values; an empty iterator leaves the attribute absent
    pub fn extend<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let mut values = values.into_iter().map(Into::into).peekable();
        if values.peek().is_none() {
            return;
        }
        self.0.entry(key.into()).or_default().extend(values);
    }

    pub fn into_record(self, id: impl Into<String>, record_type: EnrichmentDataType) -> EnrichmentRecord {
        EnrichmentRecord {
            id: id.into(),
            record_type,
            attributes: self.0,
        }
    }
}
