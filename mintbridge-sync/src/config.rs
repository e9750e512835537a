//! Configuration for the sync engine.
//!
//! Every component receives its configuration explicitly through its
//! constructor. Defaults live here and nowhere else; business logic never
//! falls back to hidden values.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How the source platform authenticates requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceAuthMode {
    /// OAuth2 client-credentials exchange for a bearer token.
    #[default]
    OAuth,
    /// HTTP Basic with client id and secret.
    Basic,
    /// Static API key presented as a bearer token.
    ApiKey,
}

/// Source (DSCO) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL for the DSCO v3 API (e.g. `https://api.dsco.io/api/v3`).
    pub api_base_url: String,
    /// OAuth2 token endpoint.
    pub auth_url: String,
    /// Authentication strategy.
    pub auth_mode: SourceAuthMode,
    /// OAuth2 / Basic client ID.
    pub client_id: String,
    /// OAuth2 / Basic client secret.
    pub client_secret: String,
    /// Static API key, used with `SourceAuthMode::ApiKey`.
    pub api_key: Option<String>,
    /// Records requested per page.
    pub page_size: u32,
    /// Upper bound on pages per traversal.
    pub max_pages: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.dsco.io/api/v3".to_string(),
            auth_url: "https://api.dsco.io/api/v3/oauth2/token".to_string(),
            auth_mode: SourceAuthMode::OAuth,
            client_id: String::new(),
            client_secret: String::new(),
            api_key: None,
            page_size: 100,
            max_pages: 200,
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> SyncResult<()> {
        require_url("source api_base_url", &self.api_base_url)?;
        match self.auth_mode {
            SourceAuthMode::OAuth => {
                require_url("source auth_url", &self.auth_url)?;
                require("source client_id", &self.client_id)?;
                require("source client_secret", &self.client_secret)?;
            }
            SourceAuthMode::Basic => {
                require("source client_id", &self.client_id)?;
                require("source client_secret", &self.client_secret)?;
            }
            SourceAuthMode::ApiKey => {
                require("source api_key", self.api_key.as_deref().unwrap_or_default())?;
            }
        }
        require_positive("source page_size", self.page_size)?;
        require_positive("source max_pages", self.max_pages)?;
        require_positive("source timeout_secs", self.timeout_secs)
    }
}

/// Destination (Mintsoft) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Base URL for the Mintsoft API (e.g. `https://api.mintsoft.co.uk`).
    pub api_base_url: String,
    /// Mintsoft account username.
    pub username: String,
    /// Mintsoft account password.
    pub password: String,
    /// Mintsoft client the listings are scoped to.
    pub client_id: i64,
    /// Records requested per listing page.
    pub page_size: u32,
    /// Upper bound on listing pages scanned per lookup.
    pub max_pages: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Build a run-scoped key index instead of scanning on every lookup.
    pub index_lookups: bool,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.mintsoft.co.uk".to_string(),
            username: String::new(),
            password: String::new(),
            client_id: 1,
            page_size: 100,
            max_pages: 100,
            timeout_secs: 30,
            index_lookups: true,
        }
    }
}

impl DestinationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> SyncResult<()> {
        require_url("destination api_base_url", &self.api_base_url)?;
        require("destination username", &self.username)?;
        require("destination password", &self.password)?;
        require_positive("destination page_size", self.page_size)?;
        require_positive("destination max_pages", self.max_pages)?;
        require_positive("destination timeout_secs", self.timeout_secs)
    }
}

/// Fixed values the mappers stamp onto destination payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub warehouse_id: i64,
    pub client_id: i64,
    /// Courier service used when the shipping method has no entry below.
    pub default_courier_service_id: i64,
    /// Shipping method name → Mintsoft courier service id.
    pub courier_services: HashMap<String, i64>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        let courier_services = [("UPS Ground", 1036), ("UPS", 1036), ("DHL", 1006), ("FEDEX", 1007)]
            .into_iter()
            .map(|(name, id)| (name.to_string(), id))
            .collect();

        Self {
            warehouse_id: 1,
            client_id: 1,
            default_courier_service_id: 1006,
            courier_services,
        }
    }
}

/// Full configuration for one sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub mapping: MappingConfig,
    /// Length of the default trailing window when the caller supplies none.
    pub default_window_hours: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
            mapping: MappingConfig::default(),
            default_window_hours: 1,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> SyncResult<()> {
        self.source.validate()?;
        self.destination.validate()?;
        if self.default_window_hours <= 0 {
            return Err(SyncError::Config(
                "default_window_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn require(name: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::Config(format!("{name} is required")));
    }
    Ok(())
}

fn require_url(name: &str, value: &str) -> SyncResult<()> {
    require(name, value)?;
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(SyncError::Config(format!("{name} must be an http(s) URL: {value}")));
    }
    Ok(())
}

fn require_positive<T: Into<u64>>(name: &str, value: T) -> SyncResult<()> {
    if value.into() == 0 {
        return Err(SyncError::Config(format!("{name} must be greater than zero")));
    }
    Ok(())
}
