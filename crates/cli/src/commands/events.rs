//! Cluster event listing

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, EventsResponse};
use crate::output::{color_status, print_json, print_table, truncate, OutputFormat};

#[derive(Tabled, Serialize)]
struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Type")]
    event_type: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Parse `--since` as a relative window (`30s`, `15m`, `2h`, `1d`) or an
/// RFC 3339 timestamp
pub fn parse_since(since: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(since) {
        return Ok(ts.with_timezone(&Utc));
    }

    let split = since.char_indices().last().map_or(0, |(i, _)| i);
    let (value, unit) = since.split_at(split);
    let value: i64 = value
        .parse()
        .with_context(|| format!("Invalid --since value: {}", since))?;
    let window = match unit {
        "s" => Duration::try_seconds(value),
        "m" => Duration::try_minutes(value),
        "h" => Duration::try_hours(value),
        "d" => Duration::try_days(value),
        _ => anyhow::bail!("Invalid --since unit in {} (use s, m, h or d)", since),
    }
    .with_context(|| format!("--since window out of range: {}", since))?;

    now.checked_sub_signed(window)
        .with_context(|| format!("--since window out of range: {}", since))
}

/// Show events newer than `since`
pub async fn show_events(client: &ApiClient, since: &str, format: OutputFormat) -> Result<()> {
    let since = parse_since(since, Utc::now())?;
    let path = format!(
        "events?since={}",
        since.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let response: EventsResponse = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&response.events),
        OutputFormat::Table => {
            let rows: Vec<EventRow> = response
                .events
                .into_iter()
                .map(|e| {
                    let object = [e.involved_object.kind, e.involved_object.namespace, e.involved_object.name]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join("/");
                    EventRow {
                        time: e.timestamp,
                        event_type: color_status(e.event_type.as_deref().unwrap_or("-")),
                        reason: e.reason.unwrap_or_else(|| "-".to_string()),
                        object,
                        message: truncate(&e.message, 60),
                    }
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}
