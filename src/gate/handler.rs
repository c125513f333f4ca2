//! HTTP handlers for the gate's four endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::discovery::DiscoveryDocument;
use super::store::{PendingRegistration, TokenRecord};
use super::{validate_requested_scopes, Gate};
use crate::crypto;
use crate::error::{Error, Result};

/// `POST <prefix>/register` request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Agent-supplied display name.
    pub agent_name: String,
    /// The agent's freshly generated Ed25519 public key, base64-encoded.
    pub public_key: String,
    /// Requested scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// `POST <prefix>/register` response body.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// Opaque registration identifier, carried forward to `/register/verify`.
    pub registration_id: String,
    /// Challenge the agent must sign.
    pub challenge: String,
}

/// `POST <prefix>/register/verify` request body.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Registration id returned by `/register`.
    pub registration_id: String,
    /// The challenge, echoed back byte-for-byte.
    pub challenge: String,
    /// Signature over `challenge`, made with the registration's secret key.
    pub signature: String,
}

/// `POST <prefix>/register/verify` response body.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// The newly minted agent id.
    pub agent_id: String,
    /// The API key to present on future `/auth` calls.
    pub api_key: String,
}

/// `POST <prefix>/auth` request body.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    /// The enrolled agent's id.
    pub agent_id: String,
    /// The enrolled agent's api key.
    pub api_key: String,
    /// Current Unix time, as a signed decimal string.
    pub timestamp: String,
    /// Signature over `timestamp`, made with the agent's secret key.
    pub signature: String,
}

/// `POST <prefix>/auth` response body.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// The opaque bearer token.
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

/// Build the gate's router: the well-known discovery path plus the three
/// `route_prefix`-scoped endpoints.
pub(super) fn routes(gate: Arc<Gate>) -> Router {
    let discovery_path = format!("/.well-known/{}.json", gate.config().service_tag);
    let register_path = format!("{}/register", gate.config().route_prefix);
    let verify_path = format!("{}/register/verify", gate.config().route_prefix);
    let auth_path = format!("{}/auth", gate.config().route_prefix);

    Router::new()
        .route(&discovery_path, get(handle_discovery))
        .route(&register_path, post(handle_register))
        .route(&verify_path, post(handle_verify))
        .route(&auth_path, post(handle_auth))
        .with_state(gate)
}

async fn handle_discovery(State(gate): State<Arc<Gate>>) -> Json<DiscoveryDocument> {
    Json(gate.discovery_document().clone())
}

async fn handle_register(
    State(gate): State<Arc<Gate>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    validate_requested_scopes(&body.scopes, &gate.config().scopes).map_err(|invalid| {
        Error::InvalidRequest(format!("unknown scopes: {}", invalid.join(", ")))
    })?;

    let pending: PendingRegistration = gate
        .store()
        .create_pending_registration(body.agent_name, body.public_key, body.scopes)
        .await;

    tracing::info!(registration_id = %pending.registration_id, "registration.created");

    Ok(Json(RegisterResponse {
        registration_id: pending.registration_id,
        challenge: pending.challenge,
    }))
}

async fn handle_verify(
    State(gate): State<Arc<Gate>>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let pending = gate
        .store()
        .get_pending_registration(&body.registration_id)
        .await
        .ok_or_else(|| Error::NotFound("registration not found or expired".into()))?;

    if body.challenge != pending.challenge {
        return Err(Error::InvalidRequest("challenge mismatch".into()));
    }

    if !crypto::verify(&body.challenge, &body.signature, &pending.public_key) {
        tracing::warn!(registration_id = %body.registration_id, "registration.signature_rejected");
        return Err(Error::Unauthorized("invalid signature".into()));
    }

    // The pending entry may have been consumed by a concurrent verify
    // between the lookup above and this call — the race-loser sees 404.
    let agent = gate
        .store()
        .complete_registration(&body.registration_id)
        .await
        .ok_or_else(|| Error::NotFound("registration not found or expired".into()))?;

    tracing::info!(agent_id = %agent.agent_id, "registration.verified");

    Ok(Json(VerifyResponse {
        agent_id: agent.agent_id,
        api_key: agent.api_key,
    }))
}

async fn handle_auth(
    State(gate): State<Arc<Gate>>,
    Json(body): Json<AuthRequest>,
) -> Result<Json<AuthResponse>> {
    let agent = gate
        .store()
        .get_agent(&body.agent_id)
        .await
        .ok_or_else(|| Error::Unauthorized("unknown agent".into()))?;

    if !constant_time_eq(agent.api_key.as_bytes(), body.api_key.as_bytes()) {
        return Err(Error::Unauthorized("invalid api key".into()));
    }

    let now = gate.config().clock.now();
    if !crypto::is_timestamp_valid(&body.timestamp, now, gate.config().max_timestamp_drift) {
        return Err(Error::Unauthorized("timestamp outside acceptable range".into()));
    }

    if !crypto::verify(&body.timestamp, &body.signature, &agent.public_key) {
        tracing::warn!(agent_id = %agent.agent_id, "auth.signature_rejected");
        return Err(Error::Unauthorized("invalid signature".into()));
    }

    let token = TokenRecord {
        token: crypto::prefixed_id("agt_", 32),
        agent_id: agent.agent_id.clone(),
        expires_at: now + gate.config().token_ttl_seconds,
        scopes: agent.scopes.clone(),
    };
    let expires_in = gate.config().token_ttl_seconds;
    gate.store().store_token(token.clone()).await;

    tracing::info!(agent_id = %agent.agent_id, "auth.issued");

    Ok(Json(AuthResponse {
        token: token.token,
        expires_in,
    }))
}

/// Constant-time byte comparison, required for the `api_key` check.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
