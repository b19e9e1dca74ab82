//! Data models for HealthHive

mod pending;
mod visit;

pub use pending::{PendingVisitRecord, SyncStatus, QUEUE_SCHEMA_VERSION};
pub use visit::{Medication, VisitPayload, VisitType, Vitals};
