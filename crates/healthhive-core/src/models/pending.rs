//! Pending visit record model

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::VisitPayload;

/// Layout version written into every queued record.
pub const QUEUE_SCHEMA_VERSION: u32 = 1;

/// Keys owned by the record itself rather than the visit payload
const MANAGEMENT_FIELDS: [&str; 4] = ["sync_status", "created_at", "local_id", "queue_schema"];

/// Queue-management status of a record.
///
/// A record resident in the offline queue is always pending; there is no
/// other state to represent locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
}

/// A visit waiting in the offline queue
///
/// Serializes as the visit payload with the management fields merged in,
/// which is the shape the bulk-sync endpoint accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingVisitRecord {
    #[serde(flatten)]
    pub visit: VisitPayload,
    pub sync_status: SyncStatus,
    /// Local creation time (ISO-8601, millisecond precision)
    pub created_at: DateTime<Utc>,
    /// Client-side identifier for diagnostics (UUID v7)
    #[serde(default = "Uuid::now_v7")]
    pub local_id: Uuid,
    #[serde(default = "default_queue_schema")]
    pub queue_schema: u32,
}

const fn default_queue_schema() -> u32 {
    QUEUE_SCHEMA_VERSION
}

impl PendingVisitRecord {
    /// Wrap a payload for the offline queue, stamped with the current time
    #[must_use]
    pub fn new(visit: VisitPayload) -> Self {
        Self::with_created_at(visit, Utc::now())
    }

    /// Wrap a payload with an explicit creation time.
    ///
    /// Management keys carried over in the payload's extra fields (e.g. from a
    /// re-imported record) are replaced by this record's own values.
    #[must_use]
    pub fn with_created_at(mut visit: VisitPayload, created_at: DateTime<Utc>) -> Self {
        visit
            .extra
            .retain(|key, _| !MANAGEMENT_FIELDS.contains(&key.as_str()));
        Self {
            visit,
            sync_status: SyncStatus::Pending,
            created_at: created_at.trunc_subsecs(3),
            local_id: Uuid::now_v7(),
            queue_schema: QUEUE_SCHEMA_VERSION,
        }
    }

    /// Whether this client understands the record's layout version
    pub const fn is_supported_schema(&self) -> bool {
        self.queue_schema <= QUEUE_SCHEMA_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitType;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_serializes_flat_with_management_fields() {
        let created_at = DateTime::parse_from_rfc3339("2026-03-01T08:30:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = PendingVisitRecord::with_created_at(
            VisitPayload::new("JAG-000123", VisitType::Screening),
            created_at,
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["patient_id"], "JAG-000123");
        assert_eq!(value["visit_type"], "screening");
        assert_eq!(value["sync_status"], "pending");
        assert_eq!(value["created_at"], "2026-03-01T08:30:00.123Z");
        assert_eq!(value["queue_schema"], 1);
        assert!(value.get("visit").is_none());
    }

    #[test]
    fn legacy_record_without_version_fields_decodes() {
        let raw = r#"{
            "patient_id": "JAG-000124",
            "visit_type": "follow-up",
            "vitals": {"systolic": 150, "diastolic": 95},
            "flagged_for_follow_up": true,
            "sync_status": "pending",
            "created_at": "2025-11-02T01:02:03.000Z"
        }"#;

        let record: PendingVisitRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.visit.patient_id, "JAG-000124");
        assert_eq!(record.visit.vitals.systolic, Some(150.0));
        assert_eq!(record.queue_schema, QUEUE_SCHEMA_VERSION);
        assert!(record.is_supported_schema());
        assert!(record.visit.extra.is_empty());
    }

    #[test]
    fn non_pending_status_is_rejected() {
        let raw = r#"{
            "patient_id": "JAG-000125",
            "visit_type": "screening",
            "sync_status": "synced",
            "created_at": "2025-11-02T01:02:03.000Z"
        }"#;

        assert!(serde_json::from_str::<PendingVisitRecord>(raw).is_err());
    }

    #[test]
    fn reimported_management_fields_are_written_once() {
        let payload: VisitPayload = serde_json::from_str(
            r#"{
                "patient_id": "JAG-000127",
                "visit_type": "screening",
                "sync_status": "pending",
                "created_at": "2025-11-02T01:02:03.000Z",
                "local_id": "0190b8a4-3c1e-7a2b-9f00-000000000001",
                "queue_schema": 1,
                "barangay": "Jagna"
            }"#,
        )
        .unwrap();
        assert!(payload.extra.contains_key("created_at"));

        let created_at = DateTime::parse_from_rfc3339("2026-03-01T08:30:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = PendingVisitRecord::with_created_at(payload, created_at);
        let raw = serde_json::to_string(&record).unwrap();

        for key in MANAGEMENT_FIELDS {
            assert_eq!(raw.matches(&format!("\"{key}\":")).count(), 1, "{key} in {raw}");
        }
        assert!(raw.contains("\"created_at\":\"2026-03-01T08:30:00.123Z\""));
        assert!(raw.contains(&format!("\"local_id\":\"{}\"", record.local_id)));
        assert_eq!(record.visit.extra.len(), 1);
        assert_eq!(record.visit.extra["barangay"], "Jagna");
    }

    #[test]
    fn newer_schema_is_flagged_unsupported() {
        let mut record =
            PendingVisitRecord::new(VisitPayload::new("JAG-000126", VisitType::Education));
        record.queue_schema = QUEUE_SCHEMA_VERSION + 1;
        assert!(!record.is_supported_schema());
    }
}
