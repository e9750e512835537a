//! Credential management for the remote APIs.
//!
//! Every API client asks a [`CredentialProvider`] for a credential before
//! each request. Providers differ in how they obtain one (OAuth2 client
//! credentials, a Mintsoft session key, or a static secret) and in how it is
//! presented on the wire, but call sites only ever see `get_credential()`.

use crate::config::{DestinationConfig, SourceAuthMode, SourceConfig};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Subtracted from every server-provided lifetime so a token never expires
/// in the middle of a request.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the identity endpoint does not state one.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Computes `now + ttl - margin`, using the default TTL when none is given.
pub fn expiry_from_ttl(now: DateTime<Utc>, ttl_secs: Option<i64>) -> DateTime<Utc> {
    let ttl = ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    now + Duration::seconds(ttl) - Duration::seconds(EXPIRY_SAFETY_MARGIN_SECS)
}

/// How a credential is attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: Basic <token>` (token already base64-encoded)
    Basic,
    /// A vendor header carrying the raw token, e.g. `ms-apikey`.
    Header(&'static str),
}

/// An access credential and the instant it stops being usable.
#[derive(Clone)]
pub struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
    scheme: AuthScheme,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>, scheme: AuthScheme) -> Self {
        Self {
            token: token.into(),
            expires_at,
            scheme,
        }
    }

    /// A credential that never expires (static keys).
    pub fn non_expiring(token: impl Into<String>, scheme: AuthScheme) -> Self {
        Self::new(token, DateTime::<Utc>::MAX_UTC, scheme)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Returns true while `now < expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Attaches this credential to an outgoing request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.scheme {
            AuthScheme::Bearer => request.bearer_auth(&self.token),
            AuthScheme::Basic => request.header(AUTHORIZATION, format!("Basic {}", self.token)),
            AuthScheme::Header(name) => request.header(name, &self.token),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Issues valid credentials on demand.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short name of the strategy, for logs.
    fn scheme_name(&self) -> &'static str;

    /// Returns a credential valid right now, re-authenticating if needed.
    async fn get_credential(&self) -> SyncResult<Credential>;

    /// Drops any cached credential so the next call re-authenticates.
    async fn invalidate(&self) {}

    /// Whether `invalidate` + `get_credential` can yield a different credential.
    fn is_refreshable(&self) -> bool {
        true
    }
}

/// Single-slot credential cache.
///
/// The slot stays locked for the whole exchange, so concurrent callers that
/// find it expired wait for one refresh instead of each starting their own.
#[derive(Default)]
struct CredentialCache {
    slot: Mutex<Option<Credential>>,
}

impl CredentialCache {
    async fn get_or_refresh<F, Fut>(&self, exchange: F) -> SyncResult<Credential>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<Credential>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(credential) = slot.as_ref() {
            if credential.is_valid_at(Utc::now()) {
                debug!("Using cached credential");
                return Ok(credential.clone());
            }
            debug!(expired_at = %credential.expires_at, "Cached credential expired");
        }

        let fresh = exchange().await?;
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    async fn clear(&self) {
        *self.slot.lock().await = None;
    }
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// OAuth2 client-credentials flow (DSCO orders API).
pub struct OAuthClientCredentials {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cache: CredentialCache,
}

impl OAuthClientCredentials {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: CredentialCache::default(),
        }
    }

    #[instrument(skip(self), fields(token_url = %self.token_url))]
    async fn exchange(&self) -> SyncResult<Credential> {
        debug!("Requesting OAuth2 access token");

        let response = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("failed to parse token response: {e}")))?;

        let expires_at = expiry_from_ttl(Utc::now(), token.expires_in);
        info!(%expires_at, "Acquired OAuth2 access token");

        Ok(Credential::new(token.access_token, expires_at, AuthScheme::Bearer))
    }
}

#[async_trait]
impl CredentialProvider for OAuthClientCredentials {
    fn scheme_name(&self) -> &'static str {
        "oauth2-client-credentials"
    }

    async fn get_credential(&self) -> SyncResult<Credential> {
        self.cache.get_or_refresh(|| self.exchange()).await
    }

    async fn invalidate(&self) {
        self.cache.clear().await;
    }
}

/// Mintsoft session key: username/password traded for an `ms-apikey`.
pub struct SessionKeyAuth {
    client: Client,
    auth_url: String,
    username: String,
    password: String,
    cache: CredentialCache,
}

impl SessionKeyAuth {
    pub const HEADER: &'static str = "ms-apikey";

    pub fn new(
        client: Client,
        auth_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            username: username.into(),
            password: password.into(),
            cache: CredentialCache::default(),
        }
    }

    #[instrument(skip(self), fields(auth_url = %self.auth_url))]
    async fn exchange(&self) -> SyncResult<Credential> {
        debug!("Requesting session API key");

        let response = self
            .client
            .post(&self.auth_url)
            .json(&serde_json::json!({
                "Username": self.username,
                "Password": self.password,
            }))
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("session login failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "session login failed with status {status}: {body}"
            )));
        }

        // The endpoint answers with the bare key as a JSON string.
        let key: String = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("failed to parse session key: {e}")))?;

        if key.trim().is_empty() {
            return Err(SyncError::Auth("session login returned an empty key".to_string()));
        }

        let expires_at = expiry_from_ttl(Utc::now(), None);
        info!(%expires_at, "Acquired session API key");

        Ok(Credential::new(key, expires_at, AuthScheme::Header(Self::HEADER)))
    }
}

#[async_trait]
impl CredentialProvider for SessionKeyAuth {
    fn scheme_name(&self) -> &'static str {
        "session-api-key"
    }

    async fn get_credential(&self) -> SyncResult<Credential> {
        self.cache.get_or_refresh(|| self.exchange()).await
    }

    async fn invalidate(&self) {
        self.cache.clear().await;
    }
}

/// A fixed credential that needs no exchange.
pub struct StaticCredential {
    name: &'static str,
    credential: Credential,
}

impl StaticCredential {
    /// Static API key sent as a bearer token.
    pub fn bearer(api_key: impl Into<String>) -> Self {
        Self {
            name: "static-bearer",
            credential: Credential::non_expiring(api_key, AuthScheme::Bearer),
        }
    }

    /// HTTP Basic from a client id and secret.
    pub fn basic(client_id: &str, client_secret: &str) -> Self {
        let encoded = STANDARD.encode(format!("{client_id}:{client_secret}"));
        Self {
            name: "basic",
            credential: Credential::non_expiring(encoded, AuthScheme::Basic),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    fn scheme_name(&self) -> &'static str {
        self.name
    }

    async fn get_credential(&self) -> SyncResult<Credential> {
        Ok(self.credential.clone())
    }

    fn is_refreshable(&self) -> bool {
        false
    }
}

/// Builds the source provider selected by `config.auth_mode`.
pub fn source_credentials(config: &SourceConfig, client: Client) -> Arc<dyn CredentialProvider> {
    match config.auth_mode {
        SourceAuthMode::OAuth => Arc::new(OAuthClientCredentials::new(
            client,
            config.auth_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )),
        SourceAuthMode::Basic => Arc::new(StaticCredential::basic(
            &config.client_id,
            &config.client_secret,
        )),
        SourceAuthMode::ApiKey => Arc::new(StaticCredential::bearer(
            config.api_key.clone().unwrap_or_default(),
        )),
    }
}

/// Builds the Mintsoft session-key provider.
pub fn destination_credentials(
    config: &DestinationConfig,
    client: Client,
) -> Arc<dyn CredentialProvider> {
    Arc::new(SessionKeyAuth::new(
        client,
        format!("{}/api/Auth", config.api_base_url.trim_end_matches('/')),
        config.username.clone(),
        config.password.clone(),
    ))
}
