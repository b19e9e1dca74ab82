use std::path::Path;

use healthhive_core::VisitPayload;

use crate::cli::QueueCommands;
use crate::commands::common::{
    format_pending_lines, open_queue, pending_to_item, read_payload_input, Context,
    PendingVisitItem,
};
use crate::error::CliError;

pub async fn run_queue(command: QueueCommands, context: &Context) -> Result<(), CliError> {
    match command {
        QueueCommands::Add { file } => run_queue_add(file.as_deref(), &context.db_path).await,
        QueueCommands::List { json } => run_queue_list(json, &context.db_path).await,
    }
}

pub async fn run_queue_add(file: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let raw = read_payload_input(file)?;
    let visit = parse_visit_payload(&raw)?;

    let queue = open_queue(db_path).await?;
    let pending = queue.enqueue(visit).await?;
    println!("Visit saved locally, {pending} pending sync");
    Ok(())
}

pub async fn run_queue_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(db_path).await?;
    let records = queue.load().await;

    if as_json {
        let items = records
            .iter()
            .enumerate()
            .map(|(index, record)| pending_to_item(index + 1, record))
            .collect::<Vec<PendingVisitItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No pending visits.");
        return Ok(());
    }

    for line in format_pending_lines(&records) {
        println!("{line}");
    }
    Ok(())
}

/// Parse a raw visit object; derived fields are filled in when absent.
pub fn parse_visit_payload(raw: &str) -> Result<VisitPayload, CliError> {
    let visit = serde_json::from_str::<VisitPayload>(raw)
        .map_err(|error| CliError::InvalidPayload(error.to_string()))?;
    if visit.patient_id.trim().is_empty() {
        return Err(CliError::EmptyPatientId);
    }
    Ok(visit.with_derived_fields())
}
