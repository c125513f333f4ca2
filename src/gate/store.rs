//! Gate store — persistence layer for pending registrations, agent
//! records, and issued tokens.
//!
//! The [`Store`] trait abstracts over storage backends. The only current
//! implementation is [`InMemoryStore`], backed by `DashMap`.
//!
//! # Design
//!
//! Agent records are indexed by `agent_id` *and* by `api_key` for O(1)
//! lookup on both the `/register/verify` and `/auth` paths. Tokens are
//! indexed by their opaque bearer value.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;

/// A scope offered by the service, declared at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeDefinition {
    /// Scope name, e.g. `"read"`.
    pub name: String,
    /// Human-readable description shown in the discovery document.
    #[serde(default)]
    pub description: String,
}

/// A registration awaiting challenge verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    /// Opaque registration identifier.
    pub registration_id: String,
    /// Agent-supplied display name.
    pub agent_name: String,
    /// The agent's Ed25519 public key, base64-encoded.
    pub public_key: String,
    /// Random challenge the agent must sign to prove key possession.
    pub challenge: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Creation time (Unix epoch seconds).
    pub created_at: u64,
}

/// A fully enrolled agent. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Opaque agent identifier.
    pub agent_id: String,
    /// Agent-supplied display name.
    pub agent_name: String,
    /// The agent's Ed25519 public key, base64-encoded.
    pub public_key: String,
    /// API key used to authenticate future token requests.
    pub api_key: String,
    /// Scopes granted at enrollment (a subset of the service whitelist).
    pub scopes: Vec<String>,
    /// Creation time (Unix epoch seconds).
    pub created_at: u64,
}

/// A short-lived bearer token issued after a successful `/auth` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// The opaque bearer token value.
    pub token: String,
    /// The agent this token was issued to.
    pub agent_id: String,
    /// Expiry time (Unix epoch seconds).
    pub expires_at: u64,
    /// Scopes snapshotted from the `AgentRecord` at issue time.
    pub scopes: Vec<String>,
}

impl TokenRecord {
    /// Whether this token is past its expiry, relative to `now`.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Trait abstracting the gate's storage backend.
///
/// Implementations must be `Send + Sync` because the store is shared
/// across concurrent request handlers. All seven operations are logically
/// atomic with respect to each other; [`Store::complete_registration`] in
/// particular must be an atomic check-and-consume so that two concurrent
/// callers racing on the same `registration_id` produce at most one
/// [`AgentRecord`].
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Mint a challenge and persist a new pending registration.
    async fn create_pending_registration(
        &self,
        agent_name: String,
        public_key: String,
        scopes: Vec<String>,
    ) -> PendingRegistration;

    /// Look up a pending registration without consuming it.
    async fn get_pending_registration(&self, registration_id: &str) -> Option<PendingRegistration>;

    /// Atomically remove the pending registration and mint an [`AgentRecord`].
    ///
    /// Returns `None` if `registration_id` is unknown (already consumed,
    /// never existed, or evicted) — the caller's race-loser sees this.
    async fn complete_registration(&self, registration_id: &str) -> Option<AgentRecord>;

    /// Look up an agent by `agent_id`.
    async fn get_agent(&self, agent_id: &str) -> Option<AgentRecord>;

    /// Look up an agent by `api_key`.
    async fn get_agent_by_api_key(&self, api_key: &str) -> Option<AgentRecord>;

    /// Persist a newly issued token.
    async fn store_token(&self, token: TokenRecord);

    /// Look up a token by its bearer value. Past-expiry tokens are evicted
    /// on lookup and reported as absent.
    async fn get_token(&self, token: &str) -> Option<TokenRecord>;

    /// Remove all pending registrations created before `older_than`
    /// (Unix epoch seconds). Not called automatically by this crate —
    /// see the open question on pending-registration TTL sweeping.
    async fn sweep_pending(&self, older_than: u64) -> usize;
}

/// In-memory [`Store`] backed by `DashMap`s, guarded implicitly by their
/// per-shard locking.
pub struct InMemoryStore {
    pending: DashMap<String, PendingRegistration>,
    agents_by_id: DashMap<String, AgentRecord>,
    agents_by_api_key: DashMap<String, String>,
    tokens: DashMap<String, TokenRecord>,
    clock: SharedClock,
}

impl InMemoryStore {
    /// Create an empty store using the real wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(crate::clock::system())
    }

    /// Create an empty store using the given clock (for deterministic tests).
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            pending: DashMap::new(),
            agents_by_id: DashMap::new(),
            agents_by_api_key: DashMap::new(),
            tokens: DashMap::new(),
            clock,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn create_pending_registration(
        &self,
        agent_name: String,
        public_key: String,
        scopes: Vec<String>,
    ) -> PendingRegistration {
        let pending = PendingRegistration {
            registration_id: crate::crypto::prefixed_id("reg_", 32),
            agent_name,
            public_key,
            challenge: crate::crypto::prefixed_id("", 32),
            scopes,
            created_at: self.clock.now(),
        };
        self.pending
            .insert(pending.registration_id.clone(), pending.clone());
        pending
    }

    async fn get_pending_registration(&self, registration_id: &str) -> Option<PendingRegistration> {
        self.pending.get(registration_id).map(|e| e.clone())
    }

    async fn complete_registration(&self, registration_id: &str) -> Option<AgentRecord> {
        let (_, pending) = self.pending.remove(registration_id)?;

        let record = AgentRecord {
            agent_id: crate::crypto::prefixed_id("agent_", 32),
            agent_name: pending.agent_name,
            public_key: pending.public_key,
            api_key: crate::crypto::prefixed_id("ak_", 32),
            scopes: pending.scopes,
            created_at: self.clock.now(),
        };

        self.agents_by_api_key
            .insert(record.api_key.clone(), record.agent_id.clone());
        self.agents_by_id.insert(record.agent_id.clone(), record.clone());
        Some(record)
    }

    async fn get_agent(&self, agent_id: &str) -> Option<AgentRecord> {
        self.agents_by_id.get(agent_id).map(|e| e.clone())
    }

    async fn get_agent_by_api_key(&self, api_key: &str) -> Option<AgentRecord> {
        let agent_id = self.agents_by_api_key.get(api_key)?.clone();
        self.get_agent(&agent_id).await
    }

    async fn store_token(&self, token: TokenRecord) {
        self.tokens.insert(token.token.clone(), token);
    }

    async fn get_token(&self, token: &str) -> Option<TokenRecord> {
        let entry = self.tokens.get(token)?;
        let record = entry.clone();
        drop(entry);

        if record.is_expired(self.clock.now()) {
            self.tokens.remove(token);
            return None;
        }
        Some(record)
    }

    async fn sweep_pending(&self, older_than: u64) -> usize {
        let stale: Vec<String> = self
            .pending
            .iter()
            .filter(|e| e.value().created_at < older_than)
            .map(|e| e.key().clone())
            .collect();
        let count = stale.len();
        for id in stale {
            self.pending.remove(&id);
        }
        count
    }
}

/// Wrap an [`InMemoryStore`] in an `Arc<dyn Store>` — the shape every
/// [`crate::gate::Gate`] holds its store as.
#[must_use]
pub fn in_memory() -> Arc<dyn Store> {
    Arc::new(InMemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[tokio::test]
    async fn create_then_get_pending() {
        let store = InMemoryStore::new();
        let pending = store
            .create_pending_registration("a1".into(), "pk".into(), vec!["read".into()])
            .await;

        let found = store.get_pending_registration(&pending.registration_id).await;
        assert!(found.is_some());
        assert_eq!(found.unwrap().challenge, pending.challenge);
    }

    #[tokio::test]
    async fn challenge_has_enough_entropy() {
        let store = InMemoryStore::new();
        let pending = store
            .create_pending_registration("a1".into(), "pk".into(), vec![])
            .await;
        // 32 raw bytes -> 43 base64url chars minimum
        assert!(pending.challenge.len() >= 32);
        assert!(pending.registration_id.len() > 40);
    }

    #[tokio::test]
    async fn complete_registration_is_consume_once() {
        let store = InMemoryStore::new();
        let pending = store
            .create_pending_registration("a1".into(), "pk".into(), vec!["read".into()])
            .await;

        let record = store.complete_registration(&pending.registration_id).await;
        assert!(record.is_some());

        // Second completion on the same id fails: consumed exactly once.
        let second = store.complete_registration(&pending.registration_id).await;
        assert!(second.is_none());

        // And it's no longer retrievable as pending either.
        assert!(
            store
                .get_pending_registration(&pending.registration_id)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn agent_lookup_by_id_and_api_key() {
        let store = InMemoryStore::new();
        let pending = store
            .create_pending_registration("a1".into(), "pk".into(), vec![])
            .await;
        let record = store
            .complete_registration(&pending.registration_id)
            .await
            .unwrap();

        assert!(store.get_agent(&record.agent_id).await.is_some());
        assert!(
            store
                .get_agent_by_api_key(&record.api_key)
                .await
                .is_some()
        );
        assert!(store.get_agent_by_api_key("bogus").await.is_none());
    }

    #[tokio::test]
    async fn token_lazy_eviction_on_expiry() {
        let clock = Arc::new(FixedClock(1_000));
        let store = InMemoryStore::with_clock(clock.clone());
        store
            .store_token(TokenRecord {
                token: "agt_x".into(),
                agent_id: "agent_1".into(),
                expires_at: 1_000,
                scopes: vec![],
            })
            .await;

        // now == expires_at -> expired
        assert!(store.get_token("agt_x").await.is_none());
    }

    #[tokio::test]
    async fn token_valid_before_expiry() {
        let clock = Arc::new(FixedClock(1_000));
        let store = InMemoryStore::with_clock(clock);
        store
            .store_token(TokenRecord {
                token: "agt_x".into(),
                agent_id: "agent_1".into(),
                expires_at: 1_001,
                scopes: vec!["read".into()],
            })
            .await;

        assert!(store.get_token("agt_x").await.is_some());
    }

    #[tokio::test]
    async fn sweep_pending_removes_only_stale() {
        let clock = Arc::new(FixedClock(1_000));
        let store = InMemoryStore::with_clock(clock);
        store
            .create_pending_registration("old".into(), "pk".into(), vec![])
            .await;

        let swept = store.sweep_pending(2_000).await;
        assert_eq!(swept, 1);
    }
}
