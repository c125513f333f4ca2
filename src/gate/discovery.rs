//! Discovery document — the JSON object a gate publishes at
//! `/.well-known/<service-tag>.json` advertising its endpoints and scopes.

use serde::{Deserialize, Serialize};

use super::store::ScopeDefinition;

/// The fixed discovery document derived from [`super::GateConfig`] at
/// construction time. Always served with 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Always `"0.1"` for this protocol version.
    #[serde(rename = "agentdoor_version")]
    pub agentdoor_version: String,
    /// Human-readable service name.
    pub service_name: String,
    /// Path to the registration endpoint.
    #[serde(default = "default_registration_endpoint")]
    pub registration_endpoint: String,
    /// Path to the verification endpoint.
    #[serde(default = "default_verification_endpoint")]
    pub verification_endpoint: String,
    /// Path to the auth endpoint.
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,
    /// Scopes offered by this service.
    #[serde(default)]
    pub scopes: Vec<ScopeDefinition>,
    /// Lifetime of issued bearer tokens, in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

fn default_registration_endpoint() -> String {
    "/agentdoor/register".to_string()
}
fn default_verification_endpoint() -> String {
    "/agentdoor/register/verify".to_string()
}
fn default_auth_endpoint() -> String {
    "/agentdoor/auth".to_string()
}
const fn default_token_ttl() -> u64 {
    3600
}

/// Protocol version this crate implements.
pub const PROTOCOL_VERSION: &str = "0.1";
