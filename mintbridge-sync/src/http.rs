//! Authenticated HTTP plumbing shared by the source and destination clients.

use crate::auth::{Credential, CredentialProvider};
use crate::error::{SyncError, SyncResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds a reqwest client with an explicit per-request timeout.
pub fn build_client(timeout: Duration) -> SyncResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))
}

/// A base URL plus the credential provider that authorizes calls to it.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            credentials,
        }
    }

    /// Joins `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Obtains a credential without sending anything else.
    pub async fn authenticate(&self) -> SyncResult<()> {
        let credential = self.credentials.get_credential().await?;
        debug!(
            scheme = self.credentials.scheme_name(),
            expires_at = %credential.expires_at(),
            "Credential ready"
        );
        Ok(())
    }

    /// Sends an authorized request and returns the raw response.
    ///
    /// `build` is called once per attempt. A 401 answered to a refreshable
    /// credential drops the cached credential and replays the request once;
    /// a second 401 is reported as an authentication error. Other statuses
    /// are left to the caller.
    pub async fn send<F>(&self, context: &str, build: F) -> SyncResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let credential = self.credentials.get_credential().await?;
        let response = self.dispatch(context, &build, &credential).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if !self.credentials.is_refreshable() {
            return Err(SyncError::Auth(format!("{context}: credential rejected (401)")));
        }

        warn!(context, "Credential rejected, re-authenticating");
        self.credentials.invalidate().await;
        let fresh = self.credentials.get_credential().await?;
        let retried = self.dispatch(context, &build, &fresh).await?;

        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Auth(format!(
                "{context}: credential rejected after re-authentication (401)"
            )));
        }
        Ok(retried)
    }

    async fn dispatch<F>(
        &self,
        context: &str,
        build: &F,
        credential: &Credential,
    ) -> SyncResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        credential
            .apply(build(&self.client))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SyncError::from_transport(context, &e))
    }
}

/// Passes a 2xx response through; classifies anything else.
pub async fn ensure_success(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::from_status(status, &body))
}

/// Decodes a JSON body.
pub async fn read_json<T: DeserializeOwned>(response: Response, context: &str) -> SyncResult<T> {
    response
        .json()
        .await
        .map_err(|e| SyncError::Transient(format!("failed to parse {context} response: {e}")))
}

/// Decodes a JSON body that may legitimately be empty.
pub async fn read_optional_json(response: Response, context: &str) -> SyncResult<serde_json::Value> {
    let text = response
        .text()
        .await
        .map_err(|e| SyncError::from_transport(context, &e))?;

    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }

    serde_json::from_str(&text)
        .map_err(|e| SyncError::Transient(format!("failed to parse {context} response: {e}")))
}
