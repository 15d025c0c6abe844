// Bridge validation
//
// One unauthenticated GET against the status path decides whether a host
// is a gateway. Discovery strategies funnel every candidate through here
// before it can count as found.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::session::url_host;

/// Unauthenticated status path exposed by every bridge.
pub const STATUS_PATH: &str = "api/0/config";

/// Substrings accepted in `modelid` (case-insensitive).
pub const DEFAULT_MODEL_KEYWORDS: &[&str] = &["bsb", "hue", "bridge"];

/// Public subset of the bridge config returned without authentication.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bridgeid: Option<String>,
    #[serde(default)]
    pub modelid: Option<String>,
    #[serde(default)]
    pub swversion: Option<String>,
    #[serde(default)]
    pub apiversion: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
}

/// A host that answered the status probe like a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeIdentity {
    /// Vendor-issued id, uppercased.
    pub id: String,
    pub address: String,
    pub port: u16,
    pub name: Option<String>,
    pub model: Option<String>,
    pub api_version: Option<String>,
}

/// Confirms that a network host is a genuine bridge.
#[derive(Debug, Clone)]
pub struct BridgeValidator {
    http: reqwest::Client,
    timeout: Duration,
    keywords: Vec<String>,
}

impl BridgeValidator {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http,
            timeout,
            keywords: DEFAULT_MODEL_KEYWORDS
                .iter()
                .map(|k| (*k).to_owned())
                .collect(),
        }
    }

    /// Replace the accepted model keywords.
    #[must_use]
    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = String>) -> Self {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.to_ascii_lowercase())
            .collect();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the unauthenticated status document.
    pub async fn fetch_status(&self, address: &str, port: u16) -> Result<BridgeStatus, Error> {
        let url = status_url(address, port)?;
        debug!("GET {url}");

        let resp = self.http.get(url).timeout(self.timeout).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| Error::decode(&e, body))
    }

    /// Probe `address` once. `None` for anything that isn't a bridge.
    pub async fn validate(&self, address: &str, port: u16) -> Option<BridgeIdentity> {
        match self.fetch_status(address, port).await {
            Ok(status) => self.identify(address, port, status),
            Err(e) => {
                trace!(address, error = %e, "status probe failed");
                None
            }
        }
    }

    /// Probe with `retries` extra attempts after a failed first try.
    pub async fn validate_with_retry(
        &self,
        address: &str,
        port: u16,
        retries: u32,
    ) -> Option<BridgeIdentity> {
        for attempt in 0..=retries {
            match self.fetch_status(address, port).await {
                Ok(status) => return self.identify(address, port, status),
                // A clean non-bridge answer won't change on retry.
                Err(Error::HttpStatus { .. } | Error::NotFound { .. } | Error::Decode { .. }) => {
                    return None;
                }
                Err(e) => trace!(address, attempt, error = %e, "status probe failed"),
            }
        }
        None
    }

    /// Apply the identity rules to a status document.
    pub fn identify(&self, address: &str, port: u16, status: BridgeStatus) -> Option<BridgeIdentity> {
        let id = status
            .bridgeid
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())?
            .to_ascii_uppercase();

        if let Some(model) = status.modelid.as_deref() {
            let model_lower = model.to_ascii_lowercase();
            if !self.keywords.iter().any(|k| model_lower.contains(k.as_str())) {
                debug!(address, model, "model does not look like a bridge");
                return None;
            }
        }

        Some(BridgeIdentity {
            id,
            address: address.to_owned(),
            port,
            name: status.name,
            model: status.modelid,
            api_version: status.apiversion,
        })
    }
}

fn status_url(address: &str, port: u16) -> Result<Url, Error> {
    let host = url_host(address)?;
    Ok(Url::parse(&format!("http://{host}:{port}/{STATUS_PATH}"))?)
}
