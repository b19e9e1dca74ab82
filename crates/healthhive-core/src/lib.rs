//! healthhive-core - Core library for HealthHive
//!
//! This crate contains the visit models, the offline visit queue with its
//! local storage, and the HTTP client used to record and bulk-sync visits.
//! The CLI (and any future front-end) drives everything through these types.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod sync;
pub mod util;
pub mod visits;
pub mod vitals;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use connectivity::{AssumeOnline, Connectivity, ConnectivityFlag};
pub use db::{Database, KeyValueStore, LibSqlKeyValueStore, MemoryKeyValueStore};
pub use error::{Error, Result};
pub use models::{Medication, PendingVisitRecord, VisitPayload, VisitType, Vitals};
pub use queue::{DrainOutcome, DrainPhase, OfflineVisitQueue, SyncSummary};
pub use sync::{ApiClient, BulkSyncResponse, SyncError, VisitSyncApi};
pub use visits::{SaveOutcome, VisitRecorder};
