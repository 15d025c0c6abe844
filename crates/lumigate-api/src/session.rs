// Long-lived channels to one bridge.
//
// A Session is built once per gateway client and cloned into every
// component that talks to the bridge. reqwest clients are reference
// counted, so clones share the same connection pools and TLS state.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::trust::TrustEvaluator;

pub const DEFAULT_HTTP_PORT: u16 = 80;

/// The two channels to a bridge: plaintext (legacy) and secured (modern,
/// pairing, event stream).
#[derive(Debug, Clone)]
pub struct Session {
    plain: reqwest::Client,
    secure: reqwest::Client,
    plain_base: Url,
    secure_base: Url,
    request_timeout: Duration,
}

impl Session {
    /// Open a session to `address` (IP or hostname).
    ///
    /// `port` is the plaintext HTTP port; the secured channel always uses 443.
    pub fn open(
        address: &str,
        port: u16,
        transport: &TransportConfig,
        evaluator: Arc<dyn TrustEvaluator>,
    ) -> Result<Self, Error> {
        let host = url_host(address)?;
        let plain_base = Url::parse(&format!("http://{host}:{port}/"))?;
        let secure_base = Url::parse(&format!("https://{host}/"))?;

        debug!(%plain_base, %secure_base, "opening bridge session");

        Ok(Self {
            plain: transport.build_plain_client()?,
            secure: transport.build_secure_client(evaluator)?,
            plain_base,
            secure_base,
            request_timeout: transport.request_timeout,
        })
    }

    /// Assemble a session from pre-built clients and explicit base URLs.
    ///
    /// Useful when both channels should point at the same test server.
    pub fn with_clients(
        plain: reqwest::Client,
        secure: reqwest::Client,
        plain_base: Url,
        secure_base: Url,
        request_timeout: Duration,
    ) -> Self {
        Self {
            plain,
            secure,
            plain_base,
            secure_base,
            request_timeout,
        }
    }

    pub fn plain(&self) -> &reqwest::Client {
        &self.plain
    }

    pub fn secure(&self) -> &reqwest::Client {
        &self.secure
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn plain_base(&self) -> &Url {
        &self.plain_base
    }

    pub fn secure_base(&self) -> &Url {
        &self.secure_base
    }

    /// `{plain_base}{path}`, path given without a leading slash.
    pub(crate) fn plain_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.plain_base.join(path.trim_start_matches('/'))?)
    }

    /// `{secure_base}{path}`, path given without a leading slash.
    pub(crate) fn secure_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.secure_base.join(path.trim_start_matches('/'))?)
    }
}

/// Turn an address into the host part of a URL, bracketing IPv6.
pub fn url_host(address: &str) -> Result<String, Error> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidAddress("empty address".into()));
    }

    if let Ok(ip) = trimmed.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(match ip {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        });
    }

    let valid_hostname = trimmed.len() <= 253
        && trimmed
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                    && !label.starts_with('-')
            });

    if valid_hostname {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(Error::InvalidAddress(trimmed.to_owned()))
    }
}
