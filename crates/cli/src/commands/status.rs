//! Extension health and readiness

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthResponse, ReadinessResponse};
use crate::output::{color_status, print_json, print_table, print_warning, OutputFormat};

#[derive(Tabled, Serialize)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

#[derive(Serialize)]
struct StatusReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    // both endpoints answer 503 with a body when the extension is not ready
    let (_, health): (_, HealthResponse) = client.get_with_status("healthz").await?;
    let (_, readiness): (_, ReadinessResponse) = client.get_with_status("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&StatusReport { health, readiness }),
        OutputFormat::Table => {
            println!("Health: {}", color_status(&health.status));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Readiness: {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                print_warning(reason);
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .into_iter()
                .map(|(name, component)| ComponentRow {
                    name,
                    status: color_status(&component.status),
                    message: component.message.unwrap_or_default(),
                    last_check: Utc
                        .timestamp_opt(component.last_check_timestamp, 0)
                        .single()
                        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}
