//! Bulk drain of the offline queue.
//!
//! A drain submits every pending record in one request and reconciles the
//! queue against the aggregate response. The batch is all-or-nothing: a
//! single error or conflict keeps the entire batch queued for review.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::PendingVisitRecord;
use crate::sync::{SyncError, VisitSyncApi};
use uuid::Uuid;

use super::OfflineVisitQueue;

/// Progress of the drain currently running, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainPhase {
    #[default]
    Idle,
    Loading,
    Submitting,
    Reconciling,
}

/// How a drain ended
#[derive(Debug)]
pub enum DrainOutcome {
    /// Nothing was queued; no request was made
    Empty,
    /// The server accepted the batch and it was removed from the queue.
    /// `pending` counts visits queued while the request was in flight.
    Cleared { synced: usize, pending: usize },
    /// The server reported errors or conflicts; the full batch stays queued
    /// and needs review before it is retried.
    Retained {
        pending: usize,
        synced: usize,
        errors: Vec<Value>,
        conflicts: Vec<Value>,
    },
    /// No usable response; the queue was left untouched
    Failed { pending: usize, error: SyncError },
}

impl DrainOutcome {
    /// Queue length after the drain
    pub const fn pending(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Cleared { pending, .. }
            | Self::Retained { pending, .. }
            | Self::Failed { pending, .. } => *pending,
        }
    }

    pub const fn needs_review(&self) -> bool {
        matches!(self, Self::Retained { .. })
    }
}

/// Resets the published phase to idle however the drain exits.
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<DrainPhase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a watch::Sender<DrainPhase>, next: DrainPhase) -> Self {
        phase.send_replace(next);
        Self { phase }
    }

    fn advance(&self, next: DrainPhase) {
        self.phase.send_replace(next);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(DrainPhase::Idle);
    }
}

impl<S: KeyValueStore> OfflineVisitQueue<S> {
    /// Submit every pending visit in one bulk request and reconcile.
    ///
    /// Only one drain runs at a time; a second caller gets
    /// [`Error::DrainInProgress`]. Visits enqueued while the request is in
    /// flight are never part of the submitted batch and are always kept.
    /// Reconciliation matches records by `local_id`, so a queue replaced
    /// through [`OfflineVisitQueue::save`] mid-drain loses nothing unsent.
    pub async fn drain<A: VisitSyncApi>(&self, api: &A) -> Result<DrainOutcome> {
        let Ok(_drain_guard) = self.drain_lock.try_lock() else {
            return Err(Error::DrainInProgress);
        };
        let phase = PhaseGuard::enter(&self.phase, DrainPhase::Loading);

        let batch = self.load().await;
        if batch.is_empty() {
            self.pending.send_replace(0);
            info!("No pending visits to sync");
            return Ok(DrainOutcome::Empty);
        }

        info!(count = batch.len(), "Syncing pending visits");
        phase.advance(DrainPhase::Submitting);
        let response =
            match tokio::time::timeout(self.drain_timeout, api.bulk_sync_visits(&batch)).await {
                Ok(Ok(response)) => response,
                Ok(Err(error)) => return Ok(self.fail(error).await),
                Err(_) => return Ok(self.fail(SyncError::Timeout(self.drain_timeout)).await),
            };

        phase.advance(DrainPhase::Reconciling);
        let synced = response.synced_count(batch.len());
        if response.is_clean() {
            let pending = self.remove_batch(&batch).await?;
            self.record_sync_time(Utc::now()).await;
            info!(synced, pending, "Pending visits synced");
            return Ok(DrainOutcome::Cleared { synced, pending });
        }

        let pending = self.restore_batch(batch).await?;
        warn!(
            errors = response.errors.len(),
            conflicts = response.conflicts.len(),
            pending,
            "Sync finished with errors or conflicts, visits kept for review"
        );
        Ok(DrainOutcome::Retained {
            pending,
            synced,
            errors: response.errors,
            conflicts: response.conflicts,
        })
    }

    async fn fail(&self, error: SyncError) -> DrainOutcome {
        let pending = self.refresh_pending_count().await;
        warn!(%error, pending, "Sync failed, visits kept in queue");
        DrainOutcome::Failed { pending, error }
    }

    /// Drop the submitted records, keeping anything written since.
    async fn remove_batch(&self, batch: &[PendingVisitRecord]) -> Result<usize> {
        let submitted = local_ids(batch);
        let _guard = self.store_lock.lock().await;
        let snapshot = self.load_snapshot().await;
        let previous = snapshot.records.len();
        let remaining: Vec<PendingVisitRecord> = snapshot
            .records
            .into_iter()
            .filter(|record| !submitted.contains(&record.local_id))
            .collect();

        let result = self.write(&remaining, snapshot.skipped).await;
        self.publish_after_write(&result, remaining.len(), previous);
        result?;
        Ok(remaining.len())
    }

    /// Re-persist the submitted batch ahead of anything appended since.
    async fn restore_batch(&self, batch: Vec<PendingVisitRecord>) -> Result<usize> {
        let _guard = self.store_lock.lock().await;
        let snapshot = self.load_snapshot().await;
        let previous = snapshot.records.len();
        let submitted = local_ids(&batch);

        let mut records = batch;
        records.extend(
            snapshot
                .records
                .into_iter()
                .filter(|record| !submitted.contains(&record.local_id)),
        );

        let result = self.write(&records, snapshot.skipped).await;
        self.publish_after_write(&result, records.len(), previous);
        result?;
        Ok(records.len())
    }
}

fn local_ids(records: &[PendingVisitRecord]) -> HashSet<Uuid> {
    records.iter().map(|record| record.local_id).collect()
}
