//! HTTP client for the HealthHive visit API.
//!
//! Two endpoints matter to the offline queue: `POST /api/visits` records a
//! single visit and `POST /api/visits/bulk-sync` accepts the whole pending
//! batch and answers with aggregate `success` / `errors` / `conflicts` lists.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{PendingVisitRecord, VisitPayload};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const VISITS_PATH: &str = "/api/visits";
const BULK_SYNC_PATH: &str = "/api/visits/bulk-sync";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid API configuration: {0}")]
    InvalidConfiguration(String),
    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("API request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network unavailable: {0}")]
    Network(String),
    #[error("Invalid API response: {0}")]
    InvalidPayload(String),
}

impl SyncError {
    /// Whether the failure happened below HTTP semantics (no usable response).
    ///
    /// Only these failures justify keeping a visit in the offline queue;
    /// validation, auth, and server errors must reach the user instead.
    pub fn is_network_error(&self) -> bool {
        match self {
            Self::Http(error) => {
                error.is_connect() || error.is_timeout() || error.is_request()
            }
            Self::Timeout(_) | Self::Network(_) => true,
            Self::InvalidConfiguration(_) | Self::Api { .. } | Self::InvalidPayload(_) => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Aggregate result of a bulk-sync request.
///
/// Entries are kept as raw JSON: only the list lengths drive reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkSyncResponse {
    #[serde(default)]
    pub success: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub conflicts: Vec<Value>,
}

impl BulkSyncResponse {
    /// True when the server reported neither errors nor conflicts.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.conflicts.is_empty()
    }

    /// Records considered synced; falls back to the batch size when the
    /// server omitted `success`.
    pub fn synced_count(&self, batch_size: usize) -> usize {
        self.success.as_ref().map_or(batch_size, Vec::len)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Remote operations the queue and the visit workflow depend on.
#[allow(async_fn_in_trait)]
pub trait VisitSyncApi {
    /// Record a single visit
    async fn record_visit(&self, visit: &VisitPayload) -> SyncResult<Value>;

    /// Submit the full pending batch in one request
    async fn bulk_sync_visits(&self, visits: &[PendingVisitRecord]) -> SyncResult<BulkSyncResponse>;
}

/// reqwest-backed client for the visit API
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> SyncResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            access_token: None,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Attach a bearer access token to every request
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = normalize_text_option(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json");
        match self.access_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> SyncResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|error| SyncError::InvalidPayload(format!("{error}: {}", compact_text(&body))))
    }
}

impl VisitSyncApi for ApiClient {
    async fn record_visit(&self, visit: &VisitPayload) -> SyncResult<Value> {
        tracing::debug!(patient_id = %visit.patient_id, "Recording visit");
        let response = self.post(VISITS_PATH).json(visit).send().await?;
        Self::read_json(response).await
    }

    async fn bulk_sync_visits(
        &self,
        visits: &[PendingVisitRecord],
    ) -> SyncResult<BulkSyncResponse> {
        tracing::debug!(count = visits.len(), "Submitting bulk visit sync");
        let response = self.post(BULK_SYNC_PATH).json(visits).send().await?;
        Self::read_json(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Option<Value>,
    message: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        let detail = payload.detail.map(|detail| match detail {
            Value::String(text) => text,
            other => other.to_string(),
        });
        if let Some(message) = detail.or(payload.message).or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: String) -> SyncResult<String> {
    let url = normalize_text_option(Some(raw)).ok_or_else(|| {
        SyncError::InvalidConfiguration("api base url must not be empty".to_string())
    })?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(SyncError::InvalidConfiguration(
            "api base url must include http:// or https://".to_string(),
        ))
    }
}
