//! Pod-count and node-count checks
//!
//! A check is prepared once, producing a serializable [`CheckState`] with a
//! fixed deadline, and then polled by the caller until it reports
//! `completed`. [`poll`] is a pure function of the state, the cache and the
//! current time; failures observed before the deadline only raise the
//! `failing` flag so a workload that recovers in time still passes.

mod mode;
mod subject;


pub use mode::{CheckMode, Counts, UnknownMode};
pub use subject::{CheckSubject, NodeThreshold, WorkloadKind, WorkloadRef};

use crate::observability::{ExtensionMetrics, StructuredLogger};
use crate::query::ClusterQuery;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

pub const NAMESPACE_ATTRIBUTE: &str = "k8s.namespace";
pub const CLUSTER_NAME_ATTRIBUTE: &str = "k8s.cluster-name";

/// Check parameters chosen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    /// Time to wait for the condition, in milliseconds
    pub duration: u64,
    #[serde(alias = "podCountCheckMode", alias = "nodeCountCheckMode")]
    pub mode: CheckMode,
    /// Required ready node count for node-count checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<i32>,
}

/// Attributes of the selected target; every attribute may carry several values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTarget {
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl CheckTarget {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.attributes
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Non-retryable prepare failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrepareError {
    #[error("target attribute {0} is missing")]
    MissingAttribute(&'static str),

    #[error("target names no workload, expected one of k8s.deployment, k8s.statefulset, k8s.daemonset, k8s.replicaset")]
    MissingWorkload,

    #[error("nodeCount is required for node-count checks")]
    MissingNodeCount,

    #[error("duration of {0} ms is out of range")]
    DurationOutOfRange(u64),
}

/// Everything a poll needs. Never changes after prepare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckState {
    pub deadline: DateTime<Utc>,
    pub mode: CheckMode,
    pub subject: CheckSubject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The condition was evaluated and did not hold
    Failed,
    /// The check cannot be evaluated as posed
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    pub title: String,
    pub status: CheckStatus,
}

impl CheckError {
    fn failed(title: String) -> Self {
        Self {
            title,
            status: CheckStatus::Failed,
        }
    }

    fn errored(title: String) -> Self {
        Self {
            title,
            status: CheckStatus::Errored,
        }
    }
}

/// Result of one poll. `error` is only attached once `completed` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    pub completed: bool,
    pub failing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckError>,
}

fn deadline_after(now: DateTime<Utc>, duration_ms: u64) -> Result<DateTime<Utc>, PrepareError> {
    i64::try_from(duration_ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|duration| now.checked_add_signed(duration))
        .ok_or(PrepareError::DurationOutOfRange(duration_ms))
}

/// Prepare a pod-count check against the workload named in `target`
pub fn prepare_pod_count(
    config: &CheckConfig,
    target: &CheckTarget,
    now: DateTime<Utc>,
) -> Result<CheckState, PrepareError> {
    let namespace = target
        .first(NAMESPACE_ATTRIBUTE)
        .ok_or(PrepareError::MissingAttribute(NAMESPACE_ATTRIBUTE))?;

    let (kind, name) = WorkloadKind::ALL
        .into_iter()
        .find_map(|kind| target.first(kind.attribute()).map(|name| (kind, name)))
        .ok_or(PrepareError::MissingWorkload)?;

    Ok(CheckState {
        deadline: deadline_after(now, config.duration)?,
        mode: config.mode,
        subject: CheckSubject::Workload(WorkloadRef {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }),
    })
}

/// Prepare a node-count check for the cluster named in `target`
pub fn prepare_node_count(
    config: &CheckConfig,
    target: &CheckTarget,
    now: DateTime<Utc>,
) -> Result<CheckState, PrepareError> {
    let cluster_name = target
        .first(CLUSTER_NAME_ATTRIBUTE)
        .ok_or(PrepareError::MissingAttribute(CLUSTER_NAME_ATTRIBUTE))?;
    let node_count = config.node_count.ok_or(PrepareError::MissingNodeCount)?;

    Ok(CheckState {
        deadline: deadline_after(now, config.duration)?,
        mode: config.mode,
        subject: CheckSubject::Nodes(NodeThreshold {
            cluster_name: cluster_name.to_string(),
            node_count,
        }),
    })
}

/// The error active at this observation, if any
pub fn evaluate(state: &CheckState, query: &ClusterQuery) -> Option<CheckError> {
    let subject = &state.subject;
    let Some(counts) = subject.observe(query) else {
        return Some(CheckError::errored(format!("{} not found", subject.describe())));
    };
    if counts.desired.is_none() && state.mode.needs_desired_count() {
        return Some(CheckError::errored(format!(
            "{} has no desired count.",
            subject.describe()
        )));
    }
    state
        .mode
        .evaluate(subject.target(), subject.unit(), counts)
        .map(CheckError::failed)
}

/// Evaluate a check at `now`. Completes exactly when the deadline is reached.
pub fn poll(state: &CheckState, query: &ClusterQuery, now: DateTime<Utc>) -> PollResult {
    let error = evaluate(state, query);
    let completed = now >= state.deadline;
    PollResult {
        completed,
        failing: error.is_some(),
        error: if completed { error } else { None },
    }
}

/// Wall-clock entry point over [`prepare_pod_count`], [`prepare_node_count`]
/// and [`poll`] that also records outcomes
#[derive(Clone)]
pub struct CheckEngine {
    query: ClusterQuery,
    metrics: ExtensionMetrics,
    logger: StructuredLogger,
}

impl CheckEngine {
    pub fn new(query: ClusterQuery, logger: StructuredLogger) -> Self {
        Self {
            query,
            metrics: ExtensionMetrics::new(),
            logger,
        }
    }

    pub fn prepare_pod_count(
        &self,
        config: &CheckConfig,
        target: &CheckTarget,
    ) -> Result<CheckState, PrepareError> {
        prepare_pod_count(config, target, Utc::now())
    }

    pub fn prepare_node_count(
        &self,
        config: &CheckConfig,
        target: &CheckTarget,
    ) -> Result<CheckState, PrepareError> {
        prepare_node_count(config, target, Utc::now())
    }

    /// Poll a check. Completion is recorded on every poll at or after the
    /// deadline, so a host that keeps polling a completed check counts it
    /// again.
    pub fn status(&self, state: &CheckState) -> PollResult {
        let result = poll(state, &self.query, Utc::now());
        debug!(
            target_name = %state.subject.target(),
            mode = %state.mode,
            completed = result.completed,
            failing = result.failing,
            "Polled check"
        );

        if result.completed {
            let outcome = match result.error.as_ref().map(|e| e.status) {
                None => "passed",
                Some(CheckStatus::Failed) => "failed",
                Some(CheckStatus::Errored) => "errored",
            };
            self.metrics
                .inc_checks_completed(state.subject.check_name(), outcome);
            self.logger.log_check_completed(
                &state.subject.describe(),
                state.mode.as_str(),
                result.error.as_ref().map(|e| e.title.as_str()),
            );
        }
        result
    }
}
