// ── Credential repository ──
//
// The core never owns secrets. Whoever builds a `GatewayClient` injects a
// repository; the CLI uses the OS keyring, tests use the in-memory store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use lumigate_api::Credentials;

use crate::error::CoreError;

/// Get/set/delete credentials keyed by bridge id.
pub trait CredentialRepository: Send + Sync {
    fn get(&self, bridge_id: &str) -> Result<Option<Credentials>, CoreError>;

    fn set(&self, bridge_id: &str, credentials: &Credentials) -> Result<(), CoreError>;

    /// Removing an absent entry is not an error.
    fn delete(&self, bridge_id: &str) -> Result<(), CoreError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, bridge_id: &str, credentials: Credentials) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_key(bridge_id), credentials);
        self
    }
}

impl CredentialRepository for MemoryCredentialStore {
    fn get(&self, bridge_id: &str) -> Result<Option<Credentials>, CoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&normalize_key(bridge_id)).cloned())
    }

    fn set(&self, bridge_id: &str, credentials: &Credentials) -> Result<(), CoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_key(bridge_id), credentials.clone());
        Ok(())
    }

    fn delete(&self, bridge_id: &str) -> Result<(), CoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize_key(bridge_id));
        Ok(())
    }
}

/// Bridge ids are case-insensitive hex; store them uppercased.
pub fn normalize_key(bridge_id: &str) -> String {
    bridge_id.trim().to_ascii_uppercase()
}
