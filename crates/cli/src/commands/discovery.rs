//! Discovery commands: container and deployment enrichment records

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, EnrichmentDataResponse, EnrichmentRecord};
use crate::output::{color_status, print_json, print_table, truncate, OutputFormat};

/// Row for the containers table
#[derive(Tabled, Serialize)]
struct ContainerRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Ready")]
    ready: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "ID")]
    id: String,
}

/// Row for the deployments table
#[derive(Tabled, Serialize)]
struct DeploymentRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Pods")]
    pods: usize,
    #[tabled(rename = "Services")]
    services: String,
    #[tabled(rename = "ID")]
    id: String,
}

fn in_namespace(record: &EnrichmentRecord, namespace: &Option<String>) -> bool {
    namespace
        .as_ref()
        .map(|ns| record.attribute("k8s.namespace") == *ns)
        .unwrap_or(true)
}

async fn fetch(client: &ApiClient, path: &str, namespace: &Option<String>) -> Result<Vec<EnrichmentRecord>> {
    let response: EnrichmentDataResponse = client.get(path).await?;
    Ok(response
        .enrichment_data
        .into_iter()
        .filter(|r| in_namespace(r, namespace))
        .collect())
}

/// List containers the extension has discovered
pub async fn list_containers(
    client: &ApiClient,
    namespace: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let records = fetch(client, "discovery/container/enrichment-data", &namespace).await?;

    match format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Table => {
            let rows: Vec<ContainerRow> = records
                .iter()
                .map(|r| {
                    let ready = if r.attribute("k8s.container.ready") == "true" {
                        "ready"
                    } else {
                        "not ready"
                    };
                    ContainerRow {
                        namespace: r.attribute("k8s.namespace"),
                        pod: r.attribute("k8s.pod.name"),
                        container: r.attribute("k8s.container.name"),
                        image: truncate(&r.attribute("k8s.container.image"), 40),
                        ready: color_status(ready),
                        node: r.attribute("k8s.node.name"),
                        id: truncate(&r.attribute("k8s.container.id.stripped"), 12),
                    }
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

/// List deployments the extension has discovered
pub async fn list_deployments(
    client: &ApiClient,
    namespace: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let records = fetch(client, "discovery/deployment/enrichment-data", &namespace).await?;

    match format {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Table => {
            let rows: Vec<DeploymentRow> = records
                .iter()
                .map(|r| DeploymentRow {
                    namespace: r.attribute("k8s.namespace"),
                    deployment: r.attribute("k8s.deployment"),
                    pods: r.attributes.get("k8s.pod.name").map_or(0, Vec::len),
                    services: r.attribute("k8s.service.name"),
                    id: r.id.clone(),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(namespace: &str) -> EnrichmentRecord {
        let mut attributes = BTreeMap::new();
        attributes.insert("k8s.namespace".to_string(), vec![namespace.to_string()]);
        EnrichmentRecord {
            id: "containerd://abc".to_string(),
            record_type: "com.kube-extension.container".to_string(),
            attributes,
        }
    }

    #[test]
    fn test_namespace_filter() {
        let shop = record("shop");
        assert!(in_namespace(&shop, &None));
        assert!(in_namespace(&shop, &Some("shop".to_string())));
        assert!(!in_namespace(&shop, &Some("billing".to_string())));
    }
}
