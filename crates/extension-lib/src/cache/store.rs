//! Per-kind indexed object store
//!
//! Each tracked kind gets one `KindStore`, keyed by `(namespace, name)` and
//! written only by that kind's watch task. Records are stored behind `Arc`
//! so readers never see a partially applied update.

use super::sync::SyncFlag;
use super::ApplyEvent;
use crate::models::{ObjectKey, ResourceKind};
use crate::observability::ExtensionMetrics;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kube::runtime::watcher::Event;
use kube::{Resource, ResourceExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Indexed mirror of one resource kind
pub struct KindStore<K> {
    kind: ResourceKind,
    objects: DashMap<ObjectKey, Arc<K>>,
    synced: SyncFlag,
    metrics: ExtensionMetrics,
}

impl<K> KindStore<K>
where
    K: Resource + Send + Sync + 'static,
{
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            objects: DashMap::new(),
            synced: SyncFlag::new(),
            metrics: ExtensionMetrics::new(),
        }
    }

    /// Look up a single object
    pub fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<K>> {
        self.objects
            .get(&ObjectKey::new(namespace, name))
            .map(|r| Arc::clone(r.value()))
    }

    /// Snapshot of every cached object, unordered
    pub fn list(&self) -> Vec<Arc<K>> {
        self.objects.iter().map(|r| Arc::clone(r.value())).collect()
    }

    /// Snapshot of the objects in one namespace, unordered
    pub fn list_namespaced(&self, namespace: &str) -> Vec<Arc<K>> {
        self.objects
            .iter()
            .filter(|r| r.key().namespace.as_deref() == Some(namespace))
            .map(|r| Arc::clone(r.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn upsert(&self, obj: K) {
        let key = ObjectKey::of(&obj);
        match self.objects.entry(key) {
            Entry::Occupied(mut entry) => {
                if supersedes(&obj, entry.get()) {
                    entry.insert(Arc::new(obj));
                } else {
                    trace!(kind = %self.kind, key = %entry.key(), "Ignoring stale update");
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(obj));
            }
        }
    }

    fn replace_all(&self, objs: Vec<K>) {
        let mut listed = HashSet::with_capacity(objs.len());
        for obj in objs {
            let key = ObjectKey::of(&obj);
            listed.insert(key.clone());
            self.objects.insert(key, Arc::new(obj));
        }
        self.objects.retain(|key, _| listed.contains(key));
    }
}

impl<K> ApplyEvent<K> for KindStore<K>
where
    K: Resource + Send + Sync + 'static,
{
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn apply(&self, event: Event<K>) {
        match event {
            Event::Applied(obj) => self.upsert(obj),
            Event::Deleted(obj) => {
                let key = ObjectKey::of(&obj);
                debug!(kind = %self.kind, key = %key, "Removing deleted object");
                self.objects.remove(&key);
            }
            Event::Restarted(objs) => {
                debug!(kind = %self.kind, count = objs.len(), "Replacing cache contents from listing");
                self.replace_all(objs);
                self.synced.mark();
            }
        }
        self.metrics.set_cached_objects(self.kind, self.objects.len() as i64);
    }

    fn sync_flag(&self) -> &SyncFlag {
        &self.synced
    }
}

/// Whether `incoming` may replace `current`. Resource versions are opaque,
/// so ordering is only enforced when both parse as integers.
fn supersedes<K: Resource>(incoming: &K, current: &K) -> bool {
    let parse = |obj: &K| obj.resource_version().and_then(|rv| rv.parse::<u64>().ok());
    match (parse(incoming), parse(current)) {
        (Some(new), Some(old)) => new >= old,
        _ => true,
    }
}
