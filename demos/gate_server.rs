//! Stand up a bare agentdoor gate and serve it over HTTP.
//!
//! This is a manual smoke-test binary, not a library entry point — run it,
//! then point `demos/agent_client.rs` or `curl` at it.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use agentdoor::gate::store::ScopeDefinition;
use agentdoor::{setup_tracing, Gate, GateConfig};

/// Run a bare agentdoor gate.
#[derive(Parser, Debug)]
#[command(name = "gate-server", version, about)]
struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "AGENTDOOR_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Human-readable service name advertised in the discovery document.
    #[arg(long, default_value = "agentdoor demo gate")]
    service_name: String,

    /// Bearer token lifetime, in seconds.
    #[arg(long, default_value_t = 3600)]
    token_ttl_seconds: u64,

    /// Log level, honored unless `RUST_LOG` is set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format: "pretty" (default) or "json".
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("failed to set up tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = GateConfig {
        service_name: cli.service_name,
        scopes: vec![
            ScopeDefinition {
                name: "read".to_string(),
                description: "read-only access".to_string(),
            },
            ScopeDefinition {
                name: "write".to_string(),
                description: "read-write access".to_string(),
            },
        ],
        token_ttl_seconds: cli.token_ttl_seconds,
        ..GateConfig::default()
    };

    let gate = Arc::new(Gate::new(config));
    let router = gate.router();

    let listener = match tokio::net::TcpListener::bind(&cli.bind).await {
        Ok(l) => l,
        Err(e) => {
            error!(bind = %cli.bind, error = %e, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    info!(bind = %cli.bind, "agentdoor gate listening");
    if let Err(e) = axum::serve(listener, router).await {
        error!(error = %e, "gate server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
