//! Client configuration.
//!
//! `ClientConfig` is stored as pretty JSON under the platform config
//! directory. Environment variables override file values so field devices can
//! be provisioned without editing the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option, parse_yes_no};

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "healthhive.db";
const APP_DIR_NAME: &str = "healthhive";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "HEALTHHIVE_API_URL";
pub const ENV_ACCESS_TOKEN: &str = "HEALTHHIVE_ACCESS_TOKEN";
pub const ENV_DB_PATH: &str = "HEALTHHIVE_DB_PATH";
pub const ENV_OFFLINE: &str = "HEALTHHIVE_OFFLINE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// Treat the device as offline and queue every visit
    #[serde(default)]
    pub force_offline: bool,
}

const fn default_config_version() -> u32 {
    1
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            api_base_url: default_api_base_url(),
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            db_path: None,
            force_offline: false,
        }
    }
}

/// `<config dir>/healthhive/config.json`, when the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// `<data dir>/healthhive/healthhive.db`, falling back to the working directory
pub fn default_db_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from(DATABASE_FILE_NAME),
        |dir| dir.join(APP_DIR_NAME).join(DATABASE_FILE_NAME),
    )
}

impl ClientConfig {
    /// Load the default config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("Failed to read config at {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    /// Write to the default config path and return it.
    pub fn save(&self) -> Result<PathBuf> {
        let path = default_config_path()
            .ok_or_else(|| Error::Config("Failed to resolve config directory".to_string()))?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        tracing::debug!(path = %path.display(), "Saved client config");
        Ok(())
    }

    /// Apply `HEALTHHIVE_*` overrides read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = url;
        }
        if let Some(token) = normalize_text_option(lookup(ENV_ACCESS_TOKEN)) {
            self.access_token = Some(token);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_OFFLINE)) {
            match parse_yes_no(&raw) {
                Some(offline) => self.force_offline = offline,
                None => tracing::warn!(value = %raw, "Ignoring unrecognized {ENV_OFFLINE} value"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(self.api_base_url.trim()) {
            return Err(Error::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured database path or the platform default
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    fn normalize(&mut self) {
        self.api_base_url = normalize_text_option(Some(self.api_base_url.clone()))
            .map_or_else(default_api_base_url, |url| {
                url.trim_end_matches('/').to_string()
            });
        self.access_token = normalize_text_option(self.access_token.take());
    }
}
