//! The gate — the server-side half of the agentdoor protocol.
//!
//! A gate is mounted onto a host's `axum::Router` and publishes:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET` | `/.well-known/<tag>.json` | Discovery document |
//! | `POST` | `<prefix>/register` | Begin enrollment, mint a challenge |
//! | `POST` | `<prefix>/register/verify` | Verify the signed challenge |
//! | `POST` | `<prefix>/auth` | Exchange `api_key` + signed timestamp for a token |
//!
//! Protected routes call [`Gate::agent_required`] directly rather than
//! going through a framework-specific middleware layer, keeping the seam
//! between this crate and the host's router a plain function call.

pub mod discovery;
pub mod handler;
pub mod store;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::Router;

use crate::clock::SharedClock;
use crate::error::{Error, Result};
use discovery::DiscoveryDocument;
use store::{ScopeDefinition, Store, TokenRecord};

/// Configuration for a [`Gate`], frozen at construction.
///
/// There is no hot reload: a gate observes no configuration changes after
/// it is built.
pub struct GateConfig {
    /// Human-readable name shown in the discovery document.
    pub service_name: String,
    /// Ordered list of scopes this service offers. An empty list means
    /// any scope name is accepted at registration.
    pub scopes: Vec<ScopeDefinition>,
    /// Lifetime of issued bearer tokens, in seconds.
    pub token_ttl_seconds: u64,
    /// Maximum allowed clock drift for signed timestamps, in seconds.
    pub max_timestamp_drift: u64,
    /// URL prefix for the non-discovery endpoints (default `/agentdoor`).
    pub route_prefix: String,
    /// The well-known service tag, used in the discovery path and the
    /// `<tag>_version` field (default `agentdoor`).
    pub service_tag: String,
    /// Storage backend. Defaults to an in-process `InMemoryStore`.
    pub store: Arc<dyn Store>,
    /// Clock used for all expiry and freshness comparisons.
    pub clock: SharedClock,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            service_name: "agentdoor service".to_string(),
            scopes: Vec::new(),
            token_ttl_seconds: 3600,
            max_timestamp_drift: 300,
            route_prefix: "/agentdoor".to_string(),
            service_tag: "agentdoor".to_string(),
            store: store::in_memory(),
            clock: crate::clock::system(),
        }
    }
}

/// Principal yielded to a downstream handler by [`Gate::agent_required`].
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// The authenticated agent's id.
    pub agent_id: String,
    /// The authenticated agent's display name.
    pub agent_name: String,
    /// Scopes granted to the presented token.
    pub scopes: Vec<String>,
}

/// The gate itself: configuration plus the store it was built with.
pub struct Gate {
    config: GateConfig,
    discovery_doc: DiscoveryDocument,
}

impl Gate {
    /// Build a gate from configuration.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        let discovery_doc = DiscoveryDocument {
            agentdoor_version: discovery::PROTOCOL_VERSION.to_string(),
            service_name: config.service_name.clone(),
            registration_endpoint: format!("{}/register", config.route_prefix),
            verification_endpoint: format!("{}/register/verify", config.route_prefix),
            auth_endpoint: format!("{}/auth", config.route_prefix),
            scopes: config.scopes.clone(),
            token_ttl_seconds: config.token_ttl_seconds,
        };
        Self {
            config,
            discovery_doc,
        }
    }

    /// The frozen configuration this gate was built with.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The storage backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.config.store
    }

    /// The discovery document, precomputed at construction time.
    #[must_use]
    pub fn discovery_document(&self) -> &DiscoveryDocument {
        &self.discovery_doc
    }

    /// Build the `axum::Router` exposing this gate's four endpoints.
    ///
    /// The well-known discovery path is always `/.well-known/<tag>.json`;
    /// `route_prefix` only scopes the other three.
    #[must_use = "the router must be mounted to serve requests"]
    pub fn router(self: Arc<Self>) -> Router {
        handler::routes(self)
    }

    /// Validate a bearer token from an incoming request's headers,
    /// enforcing `required_scopes` if non-empty.
    ///
    /// This is the seam a host framework's route handler calls directly:
    /// extract the headers, call this, use the resulting [`AgentContext`]
    /// or propagate the [`Error`] as the handler's rejection.
    pub async fn agent_required(
        &self,
        headers: &HeaderMap,
        required_scopes: &[&str],
    ) -> Result<AgentContext> {
        let token = extract_bearer(headers)
            .ok_or_else(|| Error::Unauthorized("missing or invalid Authorization header".into()))?;

        let token_record = self
            .config
            .store
            .get_token(token)
            .await
            .ok_or_else(|| Error::Unauthorized("invalid or expired token".into()))?;

        if !required_scopes.is_empty() {
            check_scopes(&token_record, required_scopes)?;
        }

        let agent = self
            .config
            .store
            .get_agent(&token_record.agent_id)
            .await
            .ok_or_else(|| Error::Unauthorized("agent not found".into()))?;

        Ok(AgentContext {
            agent_id: agent.agent_id,
            agent_name: agent.agent_name,
            scopes: token_record.scopes,
        })
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn check_scopes(token: &TokenRecord, required: &[&str]) -> Result<()> {
    let mut missing: Vec<&str> = required
        .iter()
        .filter(|s| !token.scopes.iter().any(|have| have == *s))
        .copied()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort_unstable();
    Err(Error::Forbidden(format!(
        "missing required scopes: {}",
        missing.join(", ")
    )))
}

/// Validate requested scope names against the configured whitelist.
///
/// An empty whitelist accepts any scope name. Returns the sorted list of
/// offending names on failure.
pub(crate) fn validate_scopes(requested: &[String], whitelist: &[ScopeDefinition]) -> std::result::Result<(), Vec<String>> {
    if whitelist.is_empty() {
        return Ok(());
    }
    let mut invalid: Vec<String> = requested
        .iter()
        .filter(|name| !whitelist.iter().any(|s| &s.name == *name))
        .cloned()
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    invalid.sort();
    Err(invalid)
}

pub(crate) use validate_scopes as validate_requested_scopes;
pub use discovery::DiscoveryDocument as GateDiscoveryDocument;
pub use store::{AgentRecord as GateAgentRecord, PendingRegistration, TokenRecord as GateTokenRecord};
