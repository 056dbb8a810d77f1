//! Rolling log of recent cluster events

use super::sync::SyncFlag;
use super::ApplyEvent;
use crate::models::{EventRecord, InvolvedObject, ObjectKey, ResourceKind};
use crate::observability::ExtensionMetrics;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event as KubeEvent;
use kube::runtime::watcher::Event;
use std::collections::VecDeque;
use std::sync::RwLock;
use tracing::trace;

/// Default number of events retained
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1000;

/// Bounded event log holding one record per Event object. An update
/// replaces the object's earlier record; the oldest records are evicted first.
pub struct EventLog {
    capacity: usize,
    records: RwLock<VecDeque<(ObjectKey, EventRecord)>>,
    synced: SyncFlag,
    metrics: ExtensionMetrics,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            synced: SyncFlag::new(),
            metrics: ExtensionMetrics::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records strictly newer than `since`, oldest first
    pub fn since(&self, since: DateTime<Utc>) -> Vec<EventRecord> {
        let records = match self.records.read() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut result: Vec<EventRecord> = records
            .iter()
            .map(|(_, r)| r)
            .filter(|r| r.timestamp > since)
            .cloned()
            .collect();
        drop(records);

        result.sort_by_key(|r| r.timestamp);
        result
    }

    fn push(&self, key: ObjectKey, record: EventRecord) {
        let mut records = match self.records.write() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.retain(|(existing, _)| *existing != key);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back((key, record));
    }

    fn reset(&self, mut listed: Vec<(ObjectKey, EventRecord)>) {
        listed.sort_by_key(|(_, r)| r.timestamp);
        let skip = listed.len().saturating_sub(self.capacity);

        let mut records = match self.records.write() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.clear();
        records.extend(listed.into_iter().skip(skip));
    }
}

impl ApplyEvent<KubeEvent> for EventLog {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Event
    }

    fn apply(&self, event: Event<KubeEvent>) {
        match event {
            Event::Applied(ev) => {
                if let Some(record) = to_record(&ev) {
                    self.push(ObjectKey::of(&ev), record);
                }
            }
            // Deleted events stay in the log until they are evicted.
            Event::Deleted(_) => {}
            Event::Restarted(events) => {
                self.reset(
                    events
                        .iter()
                        .filter_map(|ev| to_record(ev).map(|r| (ObjectKey::of(ev), r)))
                        .collect(),
                );
                self.synced.mark();
            }
        }
        self.metrics
            .set_cached_objects(ResourceKind::Event, self.len() as i64);
    }

    fn sync_flag(&self) -> &SyncFlag {
        &self.synced
    }
}

/// Convert a cluster event into a log record. Events carrying no usable
/// timestamp cannot be ordered and are dropped.
fn to_record(ev: &KubeEvent) -> Option<EventRecord> {
    let timestamp = ev
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| ev.event_time.as_ref().map(|t| t.0))
        .or_else(|| ev.first_timestamp.as_ref().map(|t| t.0))
        .or_else(|| ev.metadata.creation_timestamp.as_ref().map(|t| t.0));

    let Some(timestamp) = timestamp else {
        trace!(name = ?ev.metadata.name, "Dropping event without timestamp");
        return None;
    };

    Some(EventRecord {
        timestamp,
        involved_object: InvolvedObject {
            kind: ev.involved_object.kind.clone(),
            namespace: ev.involved_object.namespace.clone(),
            name: ev.involved_object.name.clone(),
        },
        reason: ev.reason.clone(),
        event_type: ev.type_.clone(),
        message: ev.message.clone().unwrap_or_default(),
    })
}
