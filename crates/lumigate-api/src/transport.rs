// Shared transport configuration for building reqwest::Client instances.
//
// A session owns exactly two clients: a plain one for legacy endpoints and
// a secured one whose certificate checks go through a TrustEvaluator.
// Neither client carries a global timeout; callers apply per-request
// timeouts so the event stream can stay open indefinitely on the same
// secured client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::trust::{GatewayCertVerifier, GatewayTrust, TrustEvaluator};

const USER_AGENT: &str = concat!("lumigate/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Optional PEM bundle with the vendor root to pin.
    pub pinned_root: Option<PathBuf>,
    /// Per-request timeout for ordinary (non-streaming) calls.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pinned_root: None,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    /// The evaluator implied by this config: pinned root if configured,
    /// private-range acceptance otherwise.
    pub fn trust_evaluator(&self) -> Result<Arc<dyn TrustEvaluator>, Error> {
        let trust = match &self.pinned_root {
            Some(path) => GatewayTrust::from_pem_file(path)?,
            None => GatewayTrust::new(),
        };
        Ok(Arc::new(trust))
    }

    /// Build the plaintext client used for legacy endpoints and probes.
    pub fn build_plain_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Build the secured client whose certificate checks are delegated to
    /// `evaluator`.
    pub fn build_secure_client(
        &self,
        evaluator: Arc<dyn TrustEvaluator>,
    ) -> Result<reqwest::Client, Error> {
        let tls = GatewayCertVerifier::new(evaluator)?.into_client_config()?;

        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .use_preconfigured_tls(tls)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTPS client: {e}")))
    }

    /// Build a short-timeout client for discovery probes.
    pub fn build_probe_client(&self, timeout: Duration) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build probe client: {e}")))
    }
}
