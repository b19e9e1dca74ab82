use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use healthhive_core::{
    ApiClient, ClientConfig, Database, LibSqlKeyValueStore, OfflineVisitQueue,
    PendingVisitRecord,
};
use serde::Serialize;

use crate::error::CliError;

pub type LocalQueue = OfflineVisitQueue<LibSqlKeyValueStore>;

/// Effective settings for one CLI invocation
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ClientConfig,
    pub db_path: PathBuf,
    pub offline: bool,
}

impl Context {
    /// Config file + environment, then command-line flags on top
    pub fn load(db_path: Option<PathBuf>, offline: bool) -> Result<Self, CliError> {
        let config = ClientConfig::load()?;
        Ok(Self::from_config(config, db_path, offline))
    }

    pub fn from_config(config: ClientConfig, db_path: Option<PathBuf>, offline: bool) -> Self {
        let db_path = db_path.unwrap_or_else(|| config.resolved_db_path());
        let offline = offline || config.force_offline;
        Self {
            config,
            db_path,
            offline,
        }
    }

    pub fn api_client(&self) -> Result<ApiClient, CliError> {
        self.config.validate()?;
        Ok(
            ApiClient::with_timeout(&self.config.api_base_url, self.config.request_timeout())?
                .with_access_token(self.config.access_token.clone()),
        )
    }
}

pub async fn open_queue(db_path: &Path) -> Result<LocalQueue, CliError> {
    let db = Database::open(db_path).await?;
    Ok(OfflineVisitQueue::open(LibSqlKeyValueStore::new(db)).await)
}

#[derive(Debug, Serialize)]
pub struct PendingVisitItem {
    pub position: usize,
    pub local_id: String,
    pub patient_id: String,
    pub visit_type: String,
    pub created_at: String,
    pub relative_time: String,
    pub flagged_for_follow_up: bool,
}

pub fn pending_to_item(position: usize, record: &PendingVisitRecord) -> PendingVisitItem {
    let now_ms = Utc::now().timestamp_millis();
    PendingVisitItem {
        position,
        local_id: record.local_id.to_string(),
        patient_id: record.visit.patient_id.clone(),
        visit_type: record.visit.visit_type.to_string(),
        created_at: format_timestamp(record.created_at),
        relative_time: format_relative_time(record.created_at.timestamp_millis(), now_ms),
        flagged_for_follow_up: record.visit.flagged_for_follow_up,
    }
}

pub fn format_pending_lines(records: &[PendingVisitRecord]) -> Vec<String> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let item = pending_to_item(index + 1, record);
            let short_id = item.local_id.chars().take(13).collect::<String>();
            let flag = if item.flagged_for_follow_up {
                "  follow-up"
            } else {
                ""
            };
            format!(
                "{:>3}. {short_id:<13}  {:<14}  {:<10}  {}{flag}",
                item.position, item.patient_id, item.visit_type, item.relative_time
            )
        })
        .collect()
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

/// Read a payload from `path`, or from piped stdin when no path is given.
pub fn read_payload_input(path: Option<&Path>) -> Result<String, CliError> {
    let raw = if let Some(path) = path {
        std::fs::read_to_string(path)?
    } else {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return Err(CliError::EmptyPayload);
        }
        let mut buffer = String::new();
        stdin.lock().read_to_string(&mut buffer)?;
        buffer
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyPayload)
    } else {
        Ok(trimmed.to_string())
    }
}
