//! Visit-recording workflow.
//!
//! Saves go straight to the API when possible. Only transport failures (or a
//! device that already knows it is offline) divert the visit into the offline
//! queue; anything the server actually rejected is returned to the caller.

use serde_json::Value;
use tracing::{info, warn};

use crate::connectivity::Connectivity;
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::VisitPayload;
use crate::queue::OfflineVisitQueue;
use crate::sync::VisitSyncApi;

/// Where a saved visit ended up
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Accepted by the server; carries the server's response body
    Recorded(Value),
    /// Stored locally for a later bulk sync
    Queued { pending: usize },
}

pub struct VisitRecorder<'a, S, A, C> {
    queue: &'a OfflineVisitQueue<S>,
    api: &'a A,
    connectivity: C,
}

impl<'a, S, A, C> VisitRecorder<'a, S, A, C>
where
    S: KeyValueStore,
    A: VisitSyncApi,
    C: Connectivity,
{
    pub const fn new(queue: &'a OfflineVisitQueue<S>, api: &'a A, connectivity: C) -> Self {
        Self {
            queue,
            api,
            connectivity,
        }
    }

    /// Record a visit remotely, falling back to the offline queue.
    pub async fn save_visit(&self, visit: VisitPayload) -> Result<SaveOutcome> {
        if !self.connectivity.is_online() {
            info!(patient_id = %visit.patient_id, "Offline, saving visit locally");
            return self.queue_visit(visit).await;
        }

        match self.api.record_visit(&visit).await {
            Ok(response) => {
                info!(patient_id = %visit.patient_id, "Visit recorded");
                Ok(SaveOutcome::Recorded(response))
            }
            Err(error) if error.is_network_error() || !self.connectivity.is_online() => {
                warn!(%error, patient_id = %visit.patient_id, "Network error, saving visit locally");
                self.queue_visit(visit).await
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn queue_visit(&self, visit: VisitPayload) -> Result<SaveOutcome> {
        let pending = self.queue.enqueue(visit).await?;
        Ok(SaveOutcome::Queued { pending })
    }
}
