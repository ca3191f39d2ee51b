//! Credential store contract.
//!
//! Credential lifecycle (signup, rotation, encryption at rest) lives
//! outside the core; this module defines only the lookup the pipeline
//! consumes. Credentials are read at each phase entry, held in the
//! executing worker's memory, and never written into job records.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The four credentialed capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Text,
    Image,
    Video,
    Compile,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Image => "image",
            Capability::Video => "video",
            Capability::Compile => "compile",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credential material for one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Base URL override; adapters fall back to their default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API token
    pub token: String,

    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Quality tier hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    /// Vendor-specific extras
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl Credential {
    /// A bare token credential.
    pub fn token_only(token: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            token: token.into(),
            model: None,
            quality: None,
            extra: None,
        }
    }
}

/// Lookup contract the core consumes at each phase entry.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the owner's credential for a capability, if any.
    async fn lookup(&self, owner_id: &str, capability: Capability) -> Option<Credential>;
}

/// In-memory credential store for tests and seeding.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: RwLock<HashMap<(String, Capability), Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a credential.
    pub fn insert(&self, owner_id: impl Into<String>, capability: Capability, credential: Credential) {
        self.entries
            .write()
            .expect("credential store lock poisoned")
            .insert((owner_id.into(), capability), credential);
    }

    /// Remove a credential.
    pub fn remove(&self, owner_id: &str, capability: Capability) {
        self.entries
            .write()
            .expect("credential store lock poisoned")
            .remove(&(owner_id.to_string(), capability));
    }

    /// Seed all four capabilities for an owner with bare tokens.
    pub fn seed_all(&self, owner_id: &str, token: &str) {
        for capability in [
            Capability::Text,
            Capability::Image,
            Capability::Video,
            Capability::Compile,
        ] {
            self.insert(owner_id, capability, Credential::token_only(token));
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn lookup(&self, owner_id: &str, capability: Capability) -> Option<Credential> {
        self.entries
            .read()
            .expect("credential store lock poisoned")
            .get(&(owner_id.to_string(), capability))
            .cloned()
    }
}

/// Env-backed credential store for single-tenant development.
///
/// Reads `REEL_<CAP>_TOKEN`, `REEL_<CAP>_ENDPOINT`, and `REEL_<CAP>_MODEL`
/// for every owner, e.g. `REEL_TEXT_TOKEN` or `REEL_VIDEO_ENDPOINT`.
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self
    }

    fn var(capability: Capability, suffix: &str) -> Option<String> {
        let key = format!("REEL_{}_{}", capability.as_str().to_uppercase(), suffix);
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn lookup(&self, _owner_id: &str, capability: Capability) -> Option<Credential> {
        let token = Self::var(capability, "TOKEN")?;
        Some(Credential {
            endpoint: Self::var(capability, "ENDPOINT"),
            token,
            model: Self::var(capability, "MODEL"),
            quality: None,
            extra: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let store = InMemoryCredentialStore::new();
        store.insert("user-1", Capability::Image, Credential::token_only("tok"));

        let found = store.lookup("user-1", Capability::Image).await;
        assert_eq!(found.unwrap().token, "tok");

        assert!(store.lookup("user-1", Capability::Video).await.is_none());
        assert!(store.lookup("user-2", Capability::Image).await.is_none());
    }

    #[tokio::test]
    async fn test_seed_all() {
        let store = InMemoryCredentialStore::new();
        store.seed_all("user-1", "tok");
        for capability in [
            Capability::Text,
            Capability::Image,
            Capability::Video,
            Capability::Compile,
        ] {
            assert!(store.lookup("user-1", capability).await.is_some());
        }
    }
}
