//! Test doubles shared by the queue and workflow tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{PendingVisitRecord, VisitPayload, VisitType};
use crate::sync::{BulkSyncResponse, SyncError, SyncResult, VisitSyncApi};

pub fn visit(patient_id: &str) -> VisitPayload {
    VisitPayload::new(patient_id, VisitType::Screening)
}

/// How the fake server answers a request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(BulkSyncResponse),
    RespondAfter(Duration, BulkSyncResponse),
    Offline,
    Reject(u16, &'static str),
    Hang,
}

impl Reply {
    pub fn clean(count: usize) -> Self {
        Self::Respond(BulkSyncResponse {
            success: Some((0..count).map(|index| json!({ "index": index })).collect()),
            errors: Vec::new(),
            conflicts: Vec::new(),
        })
    }

    async fn resolve(&self) -> SyncResult<BulkSyncResponse> {
        match self {
            Self::Respond(response) => Ok(response.clone()),
            Self::RespondAfter(delay, response) => {
                tokio::time::sleep(*delay).await;
                Ok(response.clone())
            }
            Self::Offline => Err(SyncError::Network("connection refused".to_string())),
            Self::Reject(status, message) => Err(SyncError::Api {
                status: *status,
                message: (*message).to_string(),
            }),
            Self::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(BulkSyncResponse::default())
            }
        }
    }
}

/// In-memory stand-in for the visit API.
pub struct FakeApi {
    reply: Reply,
    bulk_calls: AtomicUsize,
    record_calls: AtomicUsize,
    last_batch: Mutex<Vec<PendingVisitRecord>>,
}

impl FakeApi {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            bulk_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
            last_batch: Mutex::new(Vec::new()),
        }
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn last_batch(&self) -> Vec<PendingVisitRecord> {
        self.last_batch.lock().unwrap().clone()
    }
}

impl VisitSyncApi for FakeApi {
    async fn record_visit(&self, visit: &VisitPayload) -> SyncResult<Value> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .resolve()
            .await
            .map(|_| json!({ "visit_id": format!("VISIT-{}", visit.patient_id) }))
    }

    async fn bulk_sync_visits(
        &self,
        visits: &[PendingVisitRecord],
    ) -> SyncResult<BulkSyncResponse> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_batch.lock().unwrap() = visits.to_vec();
        self.reply.resolve().await
    }
}

/// Store whose reads return a fixed value and whose writes always fail.
pub struct ReadOnlyStore {
    pub value: Option<String>,
}

impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(self.value.clone())
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Storage("disk full".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::Storage("disk full".to_string()))
    }
}

/// Store that is entirely unavailable.
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Storage("storage unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Storage("storage unavailable".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::Storage("storage unavailable".to_string()))
    }
}
