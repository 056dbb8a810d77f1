//! Watch stream consumption
//!
//! One task per tracked kind drains a watch stream into that kind's store.
//! Stream errors are logged and counted; the stream itself reconnects
//! with backoff, so the task only ends when the stop signal is raised or
//! the stream terminates.

use super::sync::StopSignal;
use super::ApplyEvent;
use crate::observability::ExtensionMetrics;
use futures::{Stream, StreamExt};
use kube::runtime::watcher::Event;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Apply watch events to `target` until stopped
pub async fn run_watch<K, T, S, E>(target: Arc<T>, stream: S, stop: StopSignal)
where
    T: ApplyEvent<K> + ?Sized,
    S: Stream<Item = Result<Event<K>, E>> + Send,
    E: Display,
{
    let kind = target.kind();
    let metrics = ExtensionMetrics::new();
    let mut stream = Box::pin(stream);

    info!(kind = %kind, "Starting watch stream");

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(event)) => {
                    debug!(kind = %kind, event = event_name(&event), "Applying watch event");
                    target.apply(event);
                }
                Some(Err(e)) => {
                    metrics.inc_watch_errors(kind);
                    warn!(kind = %kind, error = %e, "Watch stream error, reconnecting");
                }
                None => {
                    warn!(kind = %kind, "Watch stream ended");
                    break;
                }
            },
            _ = stop.raised() => {
                info!(kind = %kind, "Stopping watch stream");
                break;
            }
        }
    }
}

fn event_name<K>(event: &Event<K>) -> &'static str {
    match event {
        Event::Applied(_) => "applied",
        Event::Deleted(_) => "deleted",
        Event::Restarted(_) => "restarted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::KindStore;
    use crate::fixtures;
    use crate::models::ResourceKind;
    use k8s_openapi::api::core::v1::Pod;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_watch_applies_events_in_order() {
        let store = Arc::new(KindStore::<Pod>::new(ResourceKind::Pod));
        let events: Vec<Result<Event<Pod>, String>> = vec![
            Ok(Event::Restarted(vec![fixtures::pod("default", "a").build()])),
            Ok(Event::Applied(fixtures::pod("default", "b").build())),
            Err("connection reset".to_string()),
            Ok(Event::Deleted(fixtures::pod("default", "a").build())),
        ];

        run_watch(store.clone(), futures::stream::iter(events), StopSignal::new()).await;

        assert!(store.sync_flag().is_synced());
        assert!(store.get(Some("default"), "a").is_none());
        assert!(store.get(Some("default"), "b").is_some());
    }

    #[tokio::test]
    async fn test_run_watch_stops_on_signal() {
        let store = Arc::new(KindStore::<Pod>::new(ResourceKind::Pod));
        let stop = StopSignal::new();
        let stream = futures::stream::pending::<Result<Event<Pod>, String>>();

        let task = tokio::spawn(run_watch(store, stream, stop.clone()));
        stop.raise();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("watch task should stop")
            .unwrap();
    }
}
