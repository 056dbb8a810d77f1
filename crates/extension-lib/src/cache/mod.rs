//! Watch-synchronized mirror of cluster state
//!
//! `ResourceCache` keeps one indexed store per tracked kind (Deployments,
//! ReplicaSets, DaemonSets, StatefulSets, Pods, Services, Nodes) plus a
//! rolling log of Events. Each store is fed by a dedicated watch task;
//! these tasks are the only writers. `start` returns only once every
//! stream has delivered its initial listing.

mod distribution;
mod events;
mod store;
mod sync;
mod watch;


pub use distribution::{detect_distribution, RootPathProbe};
pub use events::{EventLog, DEFAULT_EVENT_LOG_CAPACITY};
pub use store::KindStore;
pub use sync::{StopSignal, SyncFlag};
pub use watch::run_watch;

use crate::models::{Distribution, ResourceKind};
use crate::observability::ExtensionMetrics;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Event as KubeEvent, Node, Pod, Service};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

/// Receives the events of one watch stream
pub trait ApplyEvent<K>: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn apply(&self, event: watcher::Event<K>);

    fn sync_flag(&self) -> &SyncFlag;
}

/// Configuration for the resource cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum time to wait for every watch stream to deliver its initial listing
    pub sync_timeout: Duration,
    /// Number of events retained in the rolling event log
    pub event_log_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(60),
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
        }
    }
}

/// Cache startup failures. All of them are fatal for the process.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to probe the API server root: {0}")]
    Probe(#[source] kube::Error),

    #[error("timed out after {timeout:?} waiting for caches to sync: {pending:?}")]
    SyncTimeout {
        timeout: Duration,
        pending: Vec<ResourceKind>,
    },

    #[error("stop signal raised before caches synced")]
    Stopped,
}

/// Kinds stored in the cache, mapped to their store
pub trait CachedKind: kube::Resource + Sized + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn store(cache: &ResourceCache) -> &Arc<KindStore<Self>>;
}

macro_rules! cached_kind {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl CachedKind for $ty {
            const KIND: ResourceKind = $kind;

            fn store(cache: &ResourceCache) -> &Arc<KindStore<Self>> {
                &cache.$field
            }
        }
    };
}

cached_kind!(Deployment, ResourceKind::Deployment, deployments);
cached_kind!(ReplicaSet, ResourceKind::ReplicaSet, replica_sets);
cached_kind!(DaemonSet, ResourceKind::DaemonSet, daemon_sets);
cached_kind!(StatefulSet, ResourceKind::StatefulSet, stateful_sets);
cached_kind!(Pod, ResourceKind::Pod, pods);
cached_kind!(Service, ResourceKind::Service, services);
cached_kind!(Node, ResourceKind::Node, nodes);

/// In-memory mirror of the cluster, shared by every reader
pub struct ResourceCache {
    deployments: Arc<KindStore<Deployment>>,
    replica_sets: Arc<KindStore<ReplicaSet>>,
    daemon_sets: Arc<KindStore<DaemonSet>>,
    stateful_sets: Arc<KindStore<StatefulSet>>,
    pods: Arc<KindStore<Pod>>,
    services: Arc<KindStore<Service>>,
    nodes: Arc<KindStore<Node>>,
    events: Arc<EventLog>,
    distribution: Distribution,
    stop: StopSignal,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ResourceCache {
    /// Create an empty cache that is not backed by any watch stream.
    /// `start` is the production entry point.
    pub fn new(distribution: Distribution, config: &CacheConfig, stop: StopSignal) -> Self {
        Self {
            deployments: Arc::new(KindStore::new(ResourceKind::Deployment)),
            replica_sets: Arc::new(KindStore::new(ResourceKind::ReplicaSet)),
            daemon_sets: Arc::new(KindStore::new(ResourceKind::DaemonSet)),
            stateful_sets: Arc::new(KindStore::new(ResourceKind::StatefulSet)),
            pods: Arc::new(KindStore::new(ResourceKind::Pod)),
            services: Arc::new(KindStore::new(ResourceKind::Service)),
            nodes: Arc::new(KindStore::new(ResourceKind::Node)),
            events: Arc::new(EventLog::new(config.event_log_capacity)),
            distribution,
            stop,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Detect the distribution, start one watch per kind and wait for the
    /// initial sync of every stream
    pub async fn start(
        client: Client,
        config: &CacheConfig,
        stop: StopSignal,
    ) -> Result<Arc<Self>, CacheError> {
        let distribution = detect_distribution(&client)
            .await
            .map_err(CacheError::Probe)?;

        let cache = Arc::new(Self::new(distribution, config, stop));
        cache.watch_all(&client);

        info!("Start Kubernetes cache sync");
        if let Err(e) = cache.wait_for_sync(config.sync_timeout).await {
            error!(error = %e, "Kubernetes cache sync failed");
            cache.shutdown().await;
            return Err(e);
        }
        Ok(cache)
    }

    fn watch_all(&self, client: &Client) {
        self.watch::<Deployment, _>(Arc::clone(&self.deployments), client);
        self.watch::<ReplicaSet, _>(Arc::clone(&self.replica_sets), client);
        self.watch::<DaemonSet, _>(Arc::clone(&self.daemon_sets), client);
        self.watch::<StatefulSet, _>(Arc::clone(&self.stateful_sets), client);
        self.watch::<Pod, _>(Arc::clone(&self.pods), client);
        self.watch::<Service, _>(Arc::clone(&self.services), client);
        self.watch::<Node, _>(Arc::clone(&self.nodes), client);
        self.watch::<KubeEvent, _>(Arc::clone(&self.events), client);
    }

    fn watch<K, T>(&self, target: Arc<T>, client: &Client)
    where
        K: kube::Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
        T: ApplyEvent<K> + 'static,
    {
        let api: Api<K> = Api::all(client.clone());
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        self.spawn(run_watch(target, stream, self.stop.clone()));
    }

    /// Spawn a sync task owned by this cache
    pub fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Block until every kind delivered its initial listing
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<(), CacheError> {
        let started = Instant::now();
        let flags: Vec<SyncFlag> = self.sync_flags().into_iter().map(|(_, f)| f).collect();
        let barrier = futures::future::join_all(flags.iter().map(|f| f.wait()));

        tokio::select! {
            synced = tokio::time::timeout(timeout, barrier) => match synced {
                Ok(_) => {
                    let elapsed = started.elapsed();
                    ExtensionMetrics::new().observe_cache_sync(elapsed.as_secs_f64());
                    info!(elapsed_ms = elapsed.as_millis() as u64, "Caches synced");
                    Ok(())
                }
                Err(_) => Err(CacheError::SyncTimeout {
                    timeout,
                    pending: self.unsynced_kinds(),
                }),
            },
            _ = self.stop.raised() => Err(CacheError::Stopped),
        }
    }

    /// Stop every watch task. Reads keep serving the last-known state.
    pub async fn shutdown(&self) {
        self.stop.raise();
        let handles: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Watch task panicked");
            }
        }
        info!("Resource cache stopped");
    }

    fn sync_flags(&self) -> Vec<(ResourceKind, SyncFlag)> {
        vec![
            (ResourceKind::Deployment, self.deployments.sync_flag().clone()),
            (ResourceKind::ReplicaSet, self.replica_sets.sync_flag().clone()),
            (ResourceKind::DaemonSet, self.daemon_sets.sync_flag().clone()),
            (ResourceKind::StatefulSet, self.stateful_sets.sync_flag().clone()),
            (ResourceKind::Pod, self.pods.sync_flag().clone()),
            (ResourceKind::Service, self.services.sync_flag().clone()),
            (ResourceKind::Node, self.nodes.sync_flag().clone()),
            (ResourceKind::Event, self.events.sync_flag().clone()),
        ]
    }

    /// Kinds that have not delivered their initial listing yet
    pub fn unsynced_kinds(&self) -> Vec<ResourceKind> {
        self.sync_flags()
            .into_iter()
            .filter(|(_, flag)| !flag.is_synced())
            .map(|(kind, _)| kind)
            .collect()
    }

    pub fn is_synced(&self) -> bool {
        self.unsynced_kinds().is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_raised()
    }

    /// Total number of cached objects across all kinds, events included
    pub fn object_count(&self) -> usize {
        self.deployments.len()
            + self.replica_sets.len()
            + self.daemon_sets.len()
            + self.stateful_sets.len()
            + self.pods.len()
            + self.services.len()
            + self.nodes.len()
            + self.events.len()
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// Store for one cached kind
    pub fn store<K: CachedKind>(&self) -> &Arc<KindStore<K>> {
        K::store(self)
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Apply an event to the matching store. Watch tasks write to the
    /// stores directly; this entry point serves tests and embedders that
    /// feed the cache themselves.
    pub fn apply<K: CachedKind>(&self, event: watcher::Event<K>) {
        K::store(self).apply(event);
    }
}
