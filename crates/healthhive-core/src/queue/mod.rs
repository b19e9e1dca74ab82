//! Offline visit queue.
//!
//! Visits that could not reach the server are kept as one JSON array under
//! [`PENDING_VISITS_KEY`]. Every write replaces the whole array. Reads never
//! fail: missing, unreadable, or malformed data is treated as an empty queue
//! so that sync logic cannot be blocked by corrupt local state.
//!
//! A watch channel mirrors the persisted length so views can show a pending
//! badge without polling storage. Entries this client cannot decode (written
//! by a newer release, or damaged) are skipped on read and moved under
//! [`QUARANTINE_KEY`] before the next write replaces the array.
//!
//! All read-modify-write cycles are serialized inside one process. Several
//! processes writing the same database concurrently are not supported.

mod drain;

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{PendingVisitRecord, VisitPayload};

pub use drain::{DrainOutcome, DrainPhase};

/// Storage key holding the pending visit array
pub const PENDING_VISITS_KEY: &str = "healthhive_pending_visits";

/// Storage key holding entries this client could not decode
pub const QUARANTINE_KEY: &str = "healthhive_pending_visits_quarantine";

/// Storage key holding the RFC 3339 time of the last clean drain
pub const LAST_SYNC_KEY: &str = "healthhive_last_sync_at";

/// Upper bound on a single bulk-sync round trip
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const SYNC_OVERDUE_HOURS: i64 = 24;

/// Decoded queue contents plus the raw entries that could not be decoded.
#[derive(Debug, Default)]
struct Snapshot {
    records: Vec<PendingVisitRecord>,
    skipped: Vec<Value>,
    /// Raw array with freshly assigned `local_id`s, when any entry lacked one
    backfilled: Option<Vec<Value>>,
}

/// Sync state shown by status views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub pending: usize,
    pub quarantined: usize,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// No clean drain within the last day (or ever)
    pub overdue: bool,
}

/// Durable FIFO of visits awaiting bulk sync
pub struct OfflineVisitQueue<S> {
    store: S,
    store_lock: Mutex<()>,
    drain_lock: Mutex<()>,
    pending: watch::Sender<usize>,
    phase: watch::Sender<DrainPhase>,
    drain_timeout: Duration,
}

impl<S: KeyValueStore> OfflineVisitQueue<S> {
    /// Open the queue over `store` and publish the persisted length.
    pub async fn open(store: S) -> Self {
        let (pending, _) = watch::channel(0);
        let (phase, _) = watch::channel(DrainPhase::Idle);
        let queue = Self {
            store,
            store_lock: Mutex::new(()),
            drain_lock: Mutex::new(()),
            pending,
            phase,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        };
        queue.refresh_pending_count().await;
        queue
    }

    #[must_use]
    pub const fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Current pending visits in insertion order. Never fails.
    ///
    /// Records stored without a `local_id` get one assigned and written back,
    /// so the same record keeps its id across loads.
    pub async fn load(&self) -> Vec<PendingVisitRecord> {
        let _guard = self.store_lock.lock().await;
        let snapshot = self.load_snapshot().await;
        if let Some(entries) = &snapshot.backfilled {
            self.persist_backfill(entries).await;
        }
        snapshot.records
    }

    /// Replace the persisted queue with `records`.
    pub async fn save(&self, records: &[PendingVisitRecord]) -> Result<()> {
        let _guard = self.store_lock.lock().await;
        let snapshot = self.load_snapshot().await;
        let result = self.write(records, snapshot.skipped).await;
        self.publish_after_write(&result, records.len(), snapshot.records.len());
        result
    }

    /// Remove the persisted queue entirely.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.store_lock.lock().await;
        let snapshot = self.load_snapshot().await;
        let result = self.write(&[], snapshot.skipped).await;
        self.publish_after_write(&result, 0, snapshot.records.len());
        result
    }

    /// Append a visit to the end of the queue and return the new length.
    ///
    /// Fails with [`Error::LocalSave`] when the queue cannot be persisted;
    /// the caller must surface that, since the visit then exists nowhere.
    pub async fn enqueue(&self, visit: VisitPayload) -> Result<usize> {
        self.enqueue_record(PendingVisitRecord::new(visit)).await
    }

    /// Append an already-wrapped record (e.g. one imported from a file).
    pub async fn enqueue_record(&self, record: PendingVisitRecord) -> Result<usize> {
        let _guard = self.store_lock.lock().await;
        let snapshot = self.load_snapshot().await;
        let previous = snapshot.records.len();
        let local_id = record.local_id;

        let mut records = snapshot.records;
        records.push(record);

        let result = self.write(&records, snapshot.skipped).await;
        self.publish_after_write(&result, records.len(), previous);
        result.map_err(|error| Error::LocalSave(error.to_string()))?;

        info!(%local_id, pending = records.len(), "Queued visit for later sync");
        Ok(records.len())
    }

    /// Last value published to observers
    pub fn pending_count(&self) -> usize {
        *self.pending.borrow()
    }

    /// Observe the persisted queue length
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    pub fn phase(&self) -> DrainPhase {
        *self.phase.borrow()
    }

    /// Observe drain progress
    pub fn subscribe_phase(&self) -> watch::Receiver<DrainPhase> {
        self.phase.subscribe()
    }

    /// Re-read storage and publish the persisted length.
    pub async fn refresh_pending_count(&self) -> usize {
        let count = self.load().await.len();
        self.pending.send_replace(count);
        count
    }

    /// Entries moved aside because this client could not decode them
    pub async fn quarantined(&self) -> Vec<Value> {
        match self.store.get(QUARANTINE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Value>>(&raw) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(%error, "Quarantined visit data is unreadable");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(error) => {
                warn!(%error, "Failed to read quarantined visits");
                Vec::new()
            }
        }
    }

    /// Time of the last drain the server accepted without errors
    pub async fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        let raw = match self.store.get(LAST_SYNC_KEY).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(%error, "Failed to read last sync time");
                return None;
            }
        };
        DateTime::parse_from_rfc3339(&raw)
            .map(|time| time.with_timezone(&Utc))
            .map_err(|error| warn!(%error, "Ignoring malformed last sync time"))
            .ok()
    }

    pub async fn summary(&self) -> SyncSummary {
        self.summary_at(Utc::now()).await
    }

    /// Summary evaluated against an explicit clock
    pub async fn summary_at(&self, now: DateTime<Utc>) -> SyncSummary {
        let pending = self.refresh_pending_count().await;
        let last_synced_at = self.last_synced_at().await;
        let overdue = last_synced_at
            .is_none_or(|last| now - last > TimeDelta::hours(SYNC_OVERDUE_HOURS));
        SyncSummary {
            pending,
            quarantined: self.quarantined().await.len(),
            last_synced_at,
            overdue,
        }
    }

    async fn record_sync_time(&self, at: DateTime<Utc>) {
        if let Err(error) = self.store.set(LAST_SYNC_KEY, &at.to_rfc3339()).await {
            warn!(%error, "Failed to record last sync time");
        }
    }

    async fn load_snapshot(&self) -> Snapshot {
        let raw = match self.store.get(PENDING_VISITS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Snapshot::default(),
            Err(error) => {
                warn!(%error, "Failed to read pending visits, treating queue as empty");
                return Snapshot::default();
            }
        };

        let mut entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(Value::Null) => return Snapshot::default(),
            Ok(other) => {
                warn!("Pending visit data is not an array, treating queue as empty");
                return Snapshot {
                    skipped: vec![other],
                    ..Snapshot::default()
                };
            }
            Err(error) => {
                warn!(%error, "Pending visit data is not valid JSON, treating queue as empty");
                return Snapshot {
                    skipped: vec![Value::String(raw)],
                    ..Snapshot::default()
                };
            }
        };

        let assigned = assign_missing_ids(&mut entries);
        let mut snapshot = Snapshot::default();
        for entry in &entries {
            match serde_json::from_value::<PendingVisitRecord>(entry.clone()) {
                Ok(record) if record.is_supported_schema() => snapshot.records.push(record),
                Ok(record) => {
                    warn!(
                        queue_schema = record.queue_schema,
                        "Skipping pending visit written by a newer client"
                    );
                    snapshot.skipped.push(entry.clone());
                }
                Err(error) => {
                    warn!(%error, "Skipping undecodable pending visit");
                    snapshot.skipped.push(entry.clone());
                }
            }
        }
        if assigned > 0 {
            debug!(assigned, "Assigned local ids to pending visits");
            snapshot.backfilled = Some(entries);
        }
        snapshot
    }

    /// Rewrite the raw array as loaded, with the ids assigned on read.
    async fn persist_backfill(&self, entries: &[Value]) {
        let result = match serde_json::to_string(entries) {
            Ok(raw) => self.store.set(PENDING_VISITS_KEY, &raw).await,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = result {
            warn!(%error, "Failed to persist assigned local ids");
        }
    }

    /// Persist `records` as the whole queue, quarantining `skipped` first.
    /// An empty list removes the key.
    async fn write(&self, records: &[PendingVisitRecord], skipped: Vec<Value>) -> Result<()> {
        if !skipped.is_empty() {
            self.quarantine(skipped).await?;
        }

        if records.is_empty() {
            self.store.remove(PENDING_VISITS_KEY).await?;
        } else {
            let raw = serde_json::to_string(records)?;
            self.store.set(PENDING_VISITS_KEY, &raw).await?;
        }
        debug!(count = records.len(), "Persisted pending visits");
        Ok(())
    }

    async fn quarantine(&self, entries: Vec<Value>) -> Result<()> {
        let count = entries.len();
        let mut quarantined = self.quarantined().await;
        quarantined.extend(entries);
        self.store
            .set(QUARANTINE_KEY, &serde_json::to_string(&quarantined)?)
            .await?;
        warn!(count, total = quarantined.len(), "Moved unreadable pending visits to quarantine");
        Ok(())
    }

    fn publish_after_write(&self, result: &Result<()>, written: usize, previous: usize) {
        let count = if result.is_ok() { written } else { previous };
        self.pending.send_replace(count);
    }
}

/// Give every object entry without a `local_id` a fresh one; returns how many.
fn assign_missing_ids(entries: &mut [Value]) -> usize {
    let mut assigned = 0;
    for entry in entries {
        if let Value::Object(fields) = entry {
            if !fields.contains_key("local_id") {
                fields.insert("local_id".to_string(), Value::String(Uuid::now_v7().to_string()));
                assigned += 1;
            }
        }
    }
    assigned
}
