use chrono::Utc;
use healthhive_core::SyncSummary;

use crate::commands::common::{format_relative_time, format_timestamp, open_queue, Context};
use crate::error::CliError;

pub async fn run_status(as_json: bool, context: &Context) -> Result<(), CliError> {
    let queue = open_queue(&context.db_path).await?;
    let summary = queue.summary().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in format_status_lines(&summary, context.offline) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_status_lines(summary: &SyncSummary, offline: bool) -> Vec<String> {
    let mut lines = vec![format!("Pending visits: {}", summary.pending)];

    let last_sync = summary.last_synced_at.map_or_else(
        || "never".to_string(),
        |time| {
            format!(
                "{} ({})",
                format_timestamp(time),
                format_relative_time(time.timestamp_millis(), Utc::now().timestamp_millis())
            )
        },
    );
    lines.push(format!("Last sync: {last_sync}"));

    if summary.quarantined > 0 {
        lines.push(format!(
            "Unreadable queued entries set aside: {}",
            summary.quarantined
        ));
    }
    if offline {
        lines.push("Mode: offline (visits are queued locally)".to_string());
    }
    if summary.pending > 0 {
        lines.push("Run `healthhive sync` when online to upload pending visits.".to_string());
    } else if summary.overdue {
        lines.push("No sync in the last 24 hours.".to_string());
    }
    lines
}
