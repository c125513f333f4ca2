//! Client-side credential storage.
//!
//! [`CredentialStore`] abstracts over backends the same way the gate's
//! [`crate::gate::store::Store`] does on the server side: a `Memory`
//! variant for tests and short-lived programs, a `File` variant for
//! persistence across process restarts.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// A stored credential for one enrolled agent identity on one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Normalized base URL of the service (trailing slash stripped).
    pub service_url: String,
    /// Agent id assigned at enrollment.
    pub agent_id: String,
    /// The agent's Ed25519 public key, base64-encoded.
    pub public_key: String,
    /// The agent's Ed25519 secret key, base64-encoded.
    pub secret_key: String,
    /// API key assigned at enrollment.
    pub api_key: String,
    /// Cached bearer token, if any.
    #[serde(default)]
    pub token: Option<String>,
    /// Expiry of the cached token (Unix epoch seconds).
    #[serde(default)]
    pub token_expires_at: Option<u64>,
    /// Scopes requested at enrollment.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Whether the cached token is still usable, applying the mandatory
    /// 30-second safety margin before the server-side expiry.
    #[must_use]
    pub fn is_token_valid(&self, now: u64) -> bool {
        match (&self.token, self.token_expires_at) {
            (Some(_), Some(expires_at)) => now + 30 < expires_at,
            _ => false,
        }
    }
}

/// Normalize a service URL by stripping any trailing slash.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Trait abstracting the client-side credential storage backend.
pub trait CredentialStore: Send + Sync {
    /// Look up the credential for a (normalized) service URL.
    fn get(&self, service_url: &str) -> Option<Credential>;
    /// Persist a credential, keyed by its `service_url`.
    fn save(&self, credential: Credential) -> Result<()>;
    /// Remove a stored credential.
    fn delete(&self, service_url: &str) -> Result<()>;
    /// List all service URLs with a stored credential.
    fn list_services(&self) -> Vec<String>;
}

/// In-memory credential store. Data is lost when the process exits.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, service_url: &str) -> Option<Credential> {
        self.inner
            .lock()
            .unwrap()
            .get(&normalize_url(service_url))
            .cloned()
    }

    fn save(&self, credential: Credential) -> Result<()> {
        let key = normalize_url(&credential.service_url);
        self.inner.lock().unwrap().insert(key, credential);
        Ok(())
    }

    fn delete(&self, service_url: &str) -> Result<()> {
        self.inner.lock().unwrap().remove(&normalize_url(service_url));
        Ok(())
    }

    fn list_services(&self) -> Vec<String> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }
}

/// File-backed credential store.
///
/// Persists all credentials as a single JSON object keyed by normalized
/// service URL, at `~/.<tag>/credentials.json` by default. The file is
/// restricted to owner read/write (0600) best-effort on Unix; callers are
/// responsible for not sharing the path across concurrent processes.
pub struct FileCredentialStore {
    path: PathBuf,
    cache: Mutex<Option<HashMap<String, Credential>>>,
}

impl FileCredentialStore {
    /// Create a file credential store at an explicit path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cache: Mutex::new(None),
        }
    }

    /// Create a file credential store at `~/.<tag>/credentials.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_location(tag: &str) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
        Ok(Self::new(home.join(format!(".{tag}")).join("credentials.json")))
    }

    fn load(&self) -> HashMap<String, Credential> {
        let mut cache = self.cache.lock().unwrap();
        if let Some(data) = cache.as_ref() {
            return data.clone();
        }

        let data = if self.path.exists() {
            match fs::read_to_string(&self.path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    warn!(error = %e, "failed to parse credentials file, starting empty");
                    HashMap::new()
                }),
                Err(e) => {
                    warn!(error = %e, "failed to read credentials file, starting empty");
                    HashMap::new()
                }
            }
        } else {
            debug!(path = %self.path.display(), "no credentials file found");
            HashMap::new()
        };

        *cache = Some(data.clone());
        data
    }

    fn flush(&self, data: HashMap<String, Credential>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&data)?;
        fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        info!(path = %self.path.display(), "saved credentials");
        *self.cache.lock().unwrap() = Some(data);
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, service_url: &str) -> Option<Credential> {
        self.load().get(&normalize_url(service_url)).cloned()
    }

    fn save(&self, credential: Credential) -> Result<()> {
        let mut data = self.load();
        data.insert(normalize_url(&credential.service_url), credential);
        self.flush(data)
    }

    fn delete(&self, service_url: &str) -> Result<()> {
        let mut data = self.load();
        data.remove(&normalize_url(service_url));
        self.flush(data)
    }

    fn list_services(&self) -> Vec<String> {
        self.load().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential(url: &str) -> Credential {
        Credential {
            service_url: url.to_string(),
            agent_id: "agent_x".to_string(),
            public_key: "pk".to_string(),
            secret_key: "sk".to_string(),
            api_key: "ak".to_string(),
            token: None,
            token_expires_at: None,
            scopes: vec!["read".to_string()],
        }
    }

    #[test]
    fn normalize_strips_trailing_slash() {
        assert_eq!(normalize_url("http://x.com/"), "http://x.com");
        assert_eq!(normalize_url("http://x.com"), "http://x.com");
    }

    #[test]
    fn is_token_valid_respects_30s_margin() {
        let mut cred = sample_credential("http://x.com");
        cred.token = Some("t".into());
        cred.token_expires_at = Some(1_000);
        assert!(cred.is_token_valid(969)); // 969 + 30 < 1000
        assert!(!cred.is_token_valid(970)); // 970 + 30 == 1000, not <
        assert!(!cred.is_token_valid(990));
    }

    #[test]
    fn is_token_valid_false_without_token() {
        let cred = sample_credential("http://x.com");
        assert!(!cred.is_token_valid(0));
    }

    #[test]
    fn memory_store_save_get_delete() {
        let store = MemoryCredentialStore::new();
        store.save(sample_credential("http://x.com/")).unwrap();

        assert!(store.get("http://x.com").is_some());
        assert!(store.get("http://x.com/").is_some());

        store.delete("http://x.com").unwrap();
        assert!(store.get("http://x.com").is_none());
    }

    #[test]
    fn memory_store_list_services() {
        let store = MemoryCredentialStore::new();
        store.save(sample_credential("http://a.com")).unwrap();
        store.save(sample_credential("http://b.com")).unwrap();
        let mut services = store.list_services();
        services.sort();
        assert_eq!(services, vec!["http://a.com", "http://b.com"]);
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        store.save(sample_credential("http://x.com")).unwrap();

        let loaded = store.get("http://x.com").unwrap();
        assert_eq!(loaded.agent_id, "agent_x");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.path().join("credentials.json"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn file_store_tolerates_extra_fields_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(
            &path,
            r#"{"http://x.com": {"service_url": "http://x.com", "agent_id": "a", "public_key": "pk", "secret_key": "sk", "api_key": "ak", "scopes": [], "unknown_field": 42}}"#,
        )
        .unwrap();
        let store = FileCredentialStore::new(path);
        let cred = store.get("http://x.com").unwrap();
        assert_eq!(cred.agent_id, "a");
    }

    #[test]
    fn file_store_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.json"));
        assert!(store.get("http://x.com").is_none());
        assert!(store.list_services().is_empty());
    }
}
