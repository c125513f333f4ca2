//! End-to-end tests driving a real gate and agent against each other over
//! an ephemeral TCP listener, including a protected route mounted by the
//! embedding host via `Gate::agent_required`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::Json;
use tokio::net::TcpListener;

use agentdoor::gate::store::ScopeDefinition;
use agentdoor::{Agent, AgentConfig, Gate, GateConfig};

async fn whoami(
    State(gate): State<Arc<Gate>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, agentdoor::Error> {
    let ctx = gate.agent_required(&headers, &["read"]).await?;
    Ok(Json(serde_json::json!({
        "agent_id": ctx.agent_id,
        "agent_name": ctx.agent_name,
        "scopes": ctx.scopes,
    })))
}

async fn spawn_host() -> String {
    let gate = Arc::new(Gate::new(GateConfig {
        scopes: vec![
            ScopeDefinition {
                name: "read".to_string(),
                description: String::new(),
            },
            ScopeDefinition {
                name: "write".to_string(),
                description: String::new(),
            },
        ],
        ..GateConfig::default()
    }));

    let whoami_routes = axum::Router::new()
        .route("/whoami", get(whoami))
        .with_state(gate.clone());
    let router = gate.router().merge(whoami_routes);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn full_lifecycle_reaches_protected_route() {
    let base = spawn_host().await;

    let mut config = AgentConfig::new(&base, "integration-agent");
    config.scopes = vec!["read".to_string()];
    let agent = Agent::new(config);

    let credential = agent.register().await.unwrap();
    assert!(credential.agent_id.starts_with("agent_"));
    assert!(credential.api_key.starts_with("ak_"));

    let token = agent.authenticate().await.unwrap();

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["agent_id"], credential.agent_id);
    assert_eq!(body["scopes"], serde_json::json!(["read"]));
}

#[tokio::test]
async fn protected_route_rejects_missing_token() {
    let base = spawn_host().await;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{base}/whoami")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_rejects_missing_scope() {
    let base = spawn_host().await;

    // No scopes requested at enrollment -> token lacks "read".
    let agent = Agent::new(AgentConfig::new(&base, "scopeless-agent"));
    agent.register().await.unwrap();
    let token = agent.authenticate().await.unwrap();

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn discovery_document_advertises_configured_scopes() {
    let base = spawn_host().await;
    let client = reqwest::Client::new();
    let doc: serde_json::Value = client
        .get(format!("{base}/.well-known/agentdoor.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let names: Vec<&str> = doc["scopes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"read"));
    assert!(names.contains(&"write"));
}
