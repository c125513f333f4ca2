//! Client-side discovery: fetching and parsing a gate's well-known document.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scope advertised by a gate's discovery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeInfo {
    /// Scope name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// Parsed discovery document. Only `agentdoor_version` and `service_name`
/// are mandatory; the three endpoints fall back to their well-known
/// defaults when absent. Fields this client doesn't recognize are
/// preserved in `raw` rather than dropped, so a caller needing a
/// not-yet-modeled field can still reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Protocol version string advertised by the gate.
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
    /// Scopes offered by the service.
    #[serde(default)]
    pub scopes: Vec<ScopeInfo>,
    /// Lifetime of issued bearer tokens, in seconds.
    #[serde(default)]
    pub token_ttl_seconds: u64,
    /// Fields not modeled above, preserved verbatim.
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
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

/// Fetch and parse the discovery document at `<service_url>/.well-known/<tag>.json`.
///
/// # Errors
///
/// Returns [`Error::Transport`] on network failure or non-2xx response, or
/// [`Error::InvalidRequest`] if the response body doesn't parse.
pub async fn discover(
    client: &reqwest::Client,
    service_url: &str,
    service_tag: &str,
) -> Result<DiscoveryDocument> {
    let url = format!(
        "{}/.well-known/{}.json",
        service_url.trim_end_matches('/'),
        service_tag
    );
    let response = client.get(&url).send().await?.error_for_status()?;
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| Error::InvalidRequest(format!("malformed discovery document: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let raw = r#"{
            "agentdoor_version": "0.1",
            "service_name": "demo",
            "registration_endpoint": "/agentdoor/register",
            "verification_endpoint": "/agentdoor/register/verify",
            "auth_endpoint": "/agentdoor/auth",
            "scopes": [],
            "token_ttl_seconds": 3600
        }"#;
        let doc: DiscoveryDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.auth_endpoint, "/agentdoor/auth");
    }

    #[test]
    fn tolerates_unknown_fields_and_preserves_them() {
        let raw = r#"{
            "agentdoor_version": "0.1",
            "service_name": "demo",
            "registration_endpoint": "/r",
            "verification_endpoint": "/v",
            "auth_endpoint": "/a",
            "future_field": {"nested": true}
        }"#;
        let doc: DiscoveryDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.token_ttl_seconds, 0);
        assert!(doc.scopes.is_empty());
        assert_eq!(doc.raw.get("future_field").unwrap()["nested"], true);
    }

    #[test]
    fn endpoints_default_when_absent() {
        let raw = r#"{
            "agentdoor_version": "0.1",
            "service_name": "demo"
        }"#;
        let doc: DiscoveryDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.registration_endpoint, "/agentdoor/register");
        assert_eq!(doc.verification_endpoint, "/agentdoor/register/verify");
        assert_eq!(doc.auth_endpoint, "/agentdoor/auth");
    }

    #[test]
    fn missing_version_or_service_name_fails_to_parse() {
        let raw = r#"{"service_name": "demo"}"#;
        assert!(serde_json::from_str::<DiscoveryDocument>(raw).is_err());

        let raw = r#"{"agentdoor_version": "0.1"}"#;
        assert!(serde_json::from_str::<DiscoveryDocument>(raw).is_err());
    }
}
