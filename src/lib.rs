//! agentdoor — a lightweight authentication protocol for non-human agents.
//!
//! This crate implements both halves of the protocol:
//!
//! - [`gate`]: the server-side component a host mounts onto its own
//!   `axum::Router`, publishing discovery, enrollment, and token-issuance
//!   endpoints and guarding protected routes.
//! - [`agent`]: the client-side component that discovers a gate, enrolls,
//!   and maintains a short-lived bearer token across calls.
//!
//! Both sides share [`crypto`] (Ed25519 signing/verification and opaque
//! identifier generation) and [`clock`] (an injectable time source so
//! expiry logic is deterministic under test).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod gate;

pub use agent::{Agent, AgentConfig};
pub use error::{Error, Result};
pub use gate::{Gate, GateConfig};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Protocol version this crate implements.
pub const AGENTDOOR_PROTOCOL_VERSION: &str = "0.1";

/// Initialize global tracing, honoring `RUST_LOG` if set and falling back
/// to `level` otherwise. `format` of `Some("json")` emits structured JSON
/// events; anything else uses the default human-readable formatter.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
