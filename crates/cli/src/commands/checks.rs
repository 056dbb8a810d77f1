//! Check commands: prepare a check, then poll it until its deadline

use anyhow::{Context, Result};
use std::time::Duration;

use crate::client::{ApiClient, CheckConfig, CheckTarget, PollResult, PrepareRequest, StateEnvelope};
use crate::output::{color_status, print_info, print_json, print_success, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

const WORKLOAD_KINDS: [&str; 4] = ["deployment", "statefulset", "daemonset", "replicaset"];

/// Workload a pod-count check runs against
pub struct Workload {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

/// Parse a check duration such as `500ms`, `10s` or `2m` into milliseconds
pub fn parse_duration(value: &str) -> Result<u64> {
    let value = value.trim();
    let digits = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(digits);
    let amount: u64 = amount
        .parse()
        .with_context(|| format!("Invalid duration: {}", value))?;

    let factor = match unit {
        "ms" => 1,
        "s" | "" => 1_000,
        "m" => 60_000,
        _ => anyhow::bail!("Invalid duration unit in {} (use ms, s or m)", value),
    };
    amount
        .checked_mul(factor)
        .with_context(|| format!("Duration out of range: {}", value))
}

fn workload_target(workload: &Workload) -> Result<CheckTarget> {
    let kind = workload.kind.to_lowercase();
    if !WORKLOAD_KINDS.contains(&kind.as_str()) {
        anyhow::bail!(
            "Unknown workload kind {} (expected one of {})",
            workload.kind,
            WORKLOAD_KINDS.join(", ")
        );
    }
    Ok(CheckTarget::default()
        .with("k8s.namespace", &workload.namespace)
        .with(&format!("k8s.{}", kind), &workload.name))
}

/// Run a pod-count check
pub async fn check_pods(
    client: &ApiClient,
    workload: Workload,
    mode: &str,
    duration: &str,
    verbose: bool,
    format: OutputFormat,
) -> Result<()> {
    let request = PrepareRequest {
        config: CheckConfig {
            duration: parse_duration(duration)?,
            mode: mode.to_string(),
            node_count: None,
        },
        target: workload_target(&workload)?,
    };
    let label = format!("{} {}/{}", workload.kind, workload.namespace, workload.name);
    run(client, "checks/pod-count/prepare", &request, &label, verbose, format).await
}

/// Run a node-count check
pub async fn check_nodes(
    client: &ApiClient,
    cluster: &str,
    count: i32,
    mode: &str,
    duration: &str,
    verbose: bool,
    format: OutputFormat,
) -> Result<()> {
    let request = PrepareRequest {
        config: CheckConfig {
            duration: parse_duration(duration)?,
            mode: mode.to_string(),
            node_count: Some(count),
        },
        target: CheckTarget::default().with("k8s.cluster-name", cluster),
    };
    let label = format!("cluster {}", cluster);
    run(client, "checks/node-count/prepare", &request, &label, verbose, format).await
}

async fn run(
    client: &ApiClient,
    prepare_path: &str,
    request: &PrepareRequest,
    label: &str,
    verbose: bool,
    format: OutputFormat,
) -> Result<()> {
    let state: StateEnvelope = client.post(prepare_path, request).await?;
    if verbose {
        print_info(&format!(
            "Checking {} for {}ms ({})",
            label, request.config.duration, request.config.mode
        ));
    }

    let result = loop {
        let result: PollResult = client.post("checks/status", &state).await?;
        if result.completed {
            break result;
        }
        if verbose {
            let current = if result.failing { "failing" } else { "passing" };
            print_info(&format!("Still running, currently {}", color_status(current)));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    if let OutputFormat::Json = format {
        print_json(&result);
    }

    match result.error {
        None => {
            if let OutputFormat::Table = format {
                print_success(&format!("Check {} {}", color_status("passed"), label));
            }
            Ok(())
        }
        Some(error) => anyhow::bail!("{}: {}", color_status(&error.status), error.title),
    }
}
