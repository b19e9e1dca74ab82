use healthhive_core::{DrainOutcome, VisitSyncApi};

use crate::commands::common::{open_queue, Context, LocalQueue};
use crate::error::CliError;

pub async fn run_sync(context: &Context) -> Result<(), CliError> {
    let queue = open_queue(&context.db_path).await?;
    if context.offline {
        let pending = queue.pending_count();
        return Err(CliError::SyncFailed {
            pending,
            reason: "device is offline".to_string(),
        });
    }

    let api = context.api_client()?;
    let message = drain_queue(&queue, &api).await?;
    println!("{message}");
    Ok(())
}

/// Drain and turn the outcome into a user-facing message or error.
pub async fn drain_queue<A: VisitSyncApi>(queue: &LocalQueue, api: &A) -> Result<String, CliError> {
    match queue.drain(api).await? {
        DrainOutcome::Empty => Ok("No pending visits to sync.".to_string()),
        DrainOutcome::Cleared { synced, pending } if pending > 0 => Ok(format!(
            "Synced {synced} visit(s); {pending} recorded during sync still pending."
        )),
        DrainOutcome::Cleared { synced, .. } => Ok(format!("Synced {synced} visit(s).")),
        DrainOutcome::Retained {
            pending,
            errors,
            conflicts,
            ..
        } => Err(CliError::SyncNeedsReview {
            pending,
            errors: errors.len(),
            conflicts: conflicts.len(),
        }),
        DrainOutcome::Failed { pending, error } => Err(CliError::SyncFailed {
            pending,
            reason: error.to_string(),
        }),
    }
}
