// ── OS keyring credential store ──
//
// One keyring entry per secret: `{BRIDGE_ID}/token` and, when the bridge
// issued one, `{BRIDGE_ID}/client-key`.

use secrecy::ExposeSecret;
use tracing::debug;

use lumigate_core::credentials::normalize_key;
use lumigate_core::{CoreError, CredentialRepository, Credentials};

pub const KEYRING_SERVICE: &str = "lumigate";

/// [`CredentialRepository`] backed by the platform keyring.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, bridge_id: &str, secret: &str) -> Result<keyring::Entry, CoreError> {
        keyring::Entry::new(&self.service, &format!("{}/{secret}", normalize_key(bridge_id)))
            .map_err(store_error)
    }

    fn read(&self, bridge_id: &str, secret: &str) -> Result<Option<String>, CoreError> {
        match self.entry(bridge_id, secret)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(store_error(e)),
        }
    }

    fn remove(&self, bridge_id: &str, secret: &str) -> Result<(), CoreError> {
        match self.entry(bridge_id, secret)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(store_error(e)),
        }
    }
}

fn store_error(err: keyring::Error) -> CoreError {
    CoreError::CredentialStore {
        message: err.to_string(),
    }
}

impl CredentialRepository for KeyringCredentialStore {
    fn get(&self, bridge_id: &str) -> Result<Option<Credentials>, CoreError> {
        let Some(token) = self.read(bridge_id, "token")? else {
            return Ok(None);
        };
        let mut credentials = Credentials::new(token);
        if let Some(key) = self.read(bridge_id, "client-key")? {
            credentials = credentials.with_client_key(key);
        }
        Ok(Some(credentials))
    }

    fn set(&self, bridge_id: &str, credentials: &Credentials) -> Result<(), CoreError> {
        self.entry(bridge_id, "token")?
            .set_password(credentials.token.expose_secret())
            .map_err(store_error)?;
        match &credentials.client_key {
            Some(key) => self
                .entry(bridge_id, "client-key")?
                .set_password(key.expose_secret())
                .map_err(store_error)?,
            None => self.remove(bridge_id, "client-key")?,
        }
        debug!(bridge = %normalize_key(bridge_id), "credentials stored in keyring");
        Ok(())
    }

    fn delete(&self, bridge_id: &str) -> Result<(), CoreError> {
        self.remove(bridge_id, "token")?;
        self.remove(bridge_id, "client-key")
    }
}
