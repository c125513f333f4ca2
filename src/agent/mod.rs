//! The agent — the client-side half of the agentdoor protocol.
//!
//! An [`Agent`] owns a keypair and a [`CredentialStore`], and drives the
//! discovery → register → verify → auth lifecycle against a gate, caching
//! the resulting bearer token for reuse across calls.

pub mod credential;
pub mod discovery;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::crypto;
use crate::error::{Error, Result};
use credential::{Credential, CredentialStore};
use discovery::DiscoveryDocument;

/// Configuration for an [`Agent`], frozen at construction.
pub struct AgentConfig {
    /// Base URL of the gate, e.g. `"https://api.example.com"`.
    pub service_url: String,
    /// Well-known service tag used to locate the discovery document.
    pub service_tag: String,
    /// Display name presented at registration.
    pub agent_name: String,
    /// Scopes requested at registration.
    pub scopes: Vec<String>,
    /// Credential storage backend.
    pub credential_store: Arc<dyn CredentialStore>,
    /// HTTP client used for all requests.
    pub http_client: reqwest::Client,
}

impl AgentConfig {
    /// Start building a config for `service_url`, with sensible defaults:
    /// service tag `"agentdoor"`, no requested scopes, and an in-memory
    /// credential store.
    #[must_use]
    pub fn new(service_url: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            service_tag: "agentdoor".to_string(),
            agent_name: agent_name.into(),
            scopes: Vec::new(),
            credential_store: Arc::new(credential::MemoryCredentialStore::new()),
            http_client: reqwest::Client::new(),
        }
    }
}

/// Client-side state for one enrolled identity against one gate.
///
/// All mutation of cached credentials goes through an internal
/// `tokio::sync::Mutex` so that concurrent callers racing on
/// [`Agent::authenticate`] perform at most one network round trip: the
/// first caller to acquire the lock refreshes the token, and the rest
/// observe the refreshed, still-valid credential once they acquire it.
#[allow(clippy::struct_field_names)]
pub struct Agent {
    service_url: String,
    service_tag: String,
    agent_name: String,
    scopes: Vec<String>,
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    state: Mutex<()>,
}

impl Agent {
    /// Build an agent from configuration. Does not perform any network I/O.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self {
            service_url: credential::normalize_url(&config.service_url),
            service_tag: config.service_tag,
            agent_name: config.agent_name,
            scopes: config.scopes,
            store: config.credential_store,
            http: config.http_client,
            state: Mutex::new(()),
        }
    }

    /// Fetch the gate's discovery document.
    pub async fn connect(&self) -> Result<DiscoveryDocument> {
        discovery::discover(&self.http, &self.service_url, &self.service_tag).await
    }

    /// Enroll with the gate if no credential is already stored, performing
    /// the full discovery → register → verify round trip. A no-op if a
    /// credential already exists for this service.
    pub async fn register(&self) -> Result<Credential> {
        let _guard = self.state.lock().await;
        self.register_locked().await
    }

    async fn register_locked(&self) -> Result<Credential> {
        if let Some(existing) = self.store.get(&self.service_url) {
            debug!(service = %self.service_url, "already enrolled, skipping registration");
            return Ok(existing);
        }

        let doc = self.connect().await?;
        let (public_key, secret_key) = crypto::generate_keypair();

        let register_url = format!("{}{}", self.service_url, doc.registration_endpoint);
        let register_body = serde_json::json!({
            "agent_name": self.agent_name,
            "public_key": public_key,
            "scopes": self.scopes,
        });
        let register_resp: serde_json::Value = self
            .http
            .post(&register_url)
            .json(&register_body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let registration_id = register_resp["registration_id"]
            .as_str()
            .ok_or_else(|| Error::InvalidRequest("missing registration_id in response".into()))?;
        let challenge = register_resp["challenge"]
            .as_str()
            .ok_or_else(|| Error::InvalidRequest("missing challenge in response".into()))?;

        let signature = crypto::sign(challenge, &secret_key)
            .ok_or_else(|| Error::Config("failed to sign challenge: invalid secret key".into()))?;

        let verify_url = format!("{}{}", self.service_url, doc.verification_endpoint);
        let verify_body = serde_json::json!({
            "registration_id": registration_id,
            "challenge": challenge,
            "signature": signature,
        });
        let verify_resp: serde_json::Value = self
            .http
            .post(&verify_url)
            .json(&verify_body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let agent_id = verify_resp["agent_id"]
            .as_str()
            .ok_or_else(|| Error::InvalidRequest("missing agent_id in response".into()))?
            .to_string();
        let api_key = verify_resp["api_key"]
            .as_str()
            .ok_or_else(|| Error::InvalidRequest("missing api_key in response".into()))?
            .to_string();

        let credential = Credential {
            service_url: self.service_url.clone(),
            agent_id,
            public_key,
            secret_key,
            api_key,
            token: None,
            token_expires_at: None,
            scopes: self.scopes.clone(),
        };
        self.store.save(credential.clone())?;
        info!(service = %self.service_url, agent_id = %credential.agent_id, "enrolled");
        Ok(credential)
    }

    /// Return a valid bearer token, registering and/or refreshing as needed.
    ///
    /// Applies a 30-second safety margin before the server-side expiry, so
    /// a token handed to the caller is never within 30 seconds of being
    /// rejected by the gate.
    pub async fn authenticate(&self) -> Result<String> {
        let _guard = self.state.lock().await;

        let credential = match self.store.get(&self.service_url) {
            Some(c) => c,
            None => self.register_locked().await?,
        };

        let now = crate::clock::system().now();
        if credential.is_token_valid(now) {
            return Ok(credential.token.clone().expect("checked by is_token_valid"));
        }

        self.refresh_locked(credential).await
    }

    async fn refresh_locked(&self, credential: Credential) -> Result<String> {
        let doc = self.connect().await?;
        let timestamp = crate::clock::system().now().to_string();
        let signature = crypto::sign(&timestamp, &credential.secret_key)
            .ok_or_else(|| Error::Config("failed to sign timestamp: invalid secret key".into()))?;

        let auth_url = format!("{}{}", self.service_url, doc.auth_endpoint);
        let auth_body = serde_json::json!({
            "agent_id": credential.agent_id,
            "api_key": credential.api_key,
            "timestamp": timestamp,
            "signature": signature,
        });
        let auth_resp: serde_json::Value = self
            .http
            .post(&auth_url)
            .json(&auth_body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let token = auth_resp["token"]
            .as_str()
            .ok_or_else(|| Error::InvalidRequest("missing token in response".into()))?
            .to_string();
        let expires_in = auth_resp["expires_in"]
            .as_u64()
            .ok_or_else(|| Error::InvalidRequest("missing expires_in in response".into()))?;

        let mut updated = credential;
        updated.token = Some(token.clone());
        updated.token_expires_at = Some(crate::clock::system().now() + expires_in);
        self.store.save(updated)?;

        debug!(service = %self.service_url, "refreshed bearer token");
        Ok(token)
    }

    /// Perform an authenticated request, retrying exactly once on a 401
    /// by forcing a fresh token — covers a token revoked or expired
    /// server-side between our freshness check and the actual call.
    pub async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> Result<reqwest::Response> {
        let token = self.authenticate().await?;
        let response = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(url, "request rejected with 401, forcing token refresh and retrying once");
        let credential = self
            .store
            .get(&self.service_url)
            .ok_or_else(|| Error::Config("no credential to refresh".into()))?;
        let token = {
            let _guard = self.state.lock().await;
            self.refresh_locked(credential).await?
        };

        let response = self
            .http
            .request(method, url)
            .bearer_auth(&token)
            .send()
            .await?;
        Ok(response)
    }

    /// Drop cached credentials for this service, forcing re-enrollment on
    /// the next call. Does not notify the gate.
    pub fn close(&self) -> Result<()> {
        self.store.delete(&self.service_url)
    }
}
