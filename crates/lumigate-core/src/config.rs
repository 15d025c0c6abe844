// ── Runtime configuration ──
//
// These types describe how to discover and talk to a bridge. They never
// touch disk: the CLI builds them from `lumigate-config` and hands them in.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use lumigate_api::TransportConfig;
use lumigate_api::validator::DEFAULT_MODEL_KEYWORDS;

pub const DEFAULT_CLOUD_URL: &str = "https://discovery.meethue.com/";

/// Allowed range for the global discovery timeout, in seconds.
pub const DISCOVERY_TIMEOUT_RANGE: RangeInclusive<u64> = 10..=40;

/// Oldest legacy API version the client supports.
pub const MIN_API_VERSION: &str = "1.46.0";

// ── Discovery ───────────────────────────────────────────────────────

/// Tuning for [`Discovery`](crate::discovery::Discovery).
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Global deadline. Clamped to [`DISCOVERY_TIMEOUT_RANGE`].
    pub timeout: Duration,
    /// Per-probe timeout for the status request.
    pub probe_timeout: Duration,
    /// Extra attempts after a failed probe.
    pub probe_retries: u32,
    /// Concurrent probes during the IP scan.
    pub scan_concurrency: usize,
    /// Addresses probed before the local /24. `host` or `host:port`.
    pub scan_addresses: Vec<String>,
    /// Also probe every host of the local /24.
    pub scan_local_subnet: bool,
    pub cloud_url: String,
    pub cloud_retries: u32,
    pub cloud_backoff: Duration,
    /// How long to listen for multicast/mDNS answers.
    pub listen_window: Duration,
    /// Stop early once this many bridges are confirmed. `None` waits for
    /// every strategy or the deadline.
    pub sufficient_results: Option<usize>,
    pub model_keywords: Vec<String>,
    pub cloud: bool,
    pub ip_scan: bool,
    pub service_browse: bool,
    pub multicast: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(2),
            probe_retries: 1,
            scan_concurrency: 32,
            scan_addresses: [
                "192.168.1.2",
                "192.168.1.10",
                "192.168.0.2",
                "192.168.0.10",
                "192.168.178.2",
                "10.0.0.2",
                "10.0.1.2",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            scan_local_subnet: true,
            cloud_url: DEFAULT_CLOUD_URL.to_owned(),
            cloud_retries: 3,
            cloud_backoff: Duration::from_millis(500),
            listen_window: Duration::from_secs(5),
            sufficient_results: None,
            model_keywords: DEFAULT_MODEL_KEYWORDS.iter().map(|k| (*k).to_owned()).collect(),
            cloud: true,
            ip_scan: true,
            service_browse: true,
            multicast: true,
        }
    }
}

impl DiscoverySettings {
    /// The global timeout, forced into the allowed range.
    pub fn effective_timeout(&self) -> Duration {
        let secs = self
            .timeout
            .as_secs()
            .clamp(*DISCOVERY_TIMEOUT_RANGE.start(), *DISCOVERY_TIMEOUT_RANGE.end());
        Duration::from_secs(secs)
    }
}

// ── Gateway client ──────────────────────────────────────────────────

/// Tuning for [`GatewayClient`](crate::gateway::GatewayClient).
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Minimum spacing between per-resource mutations.
    pub resource_interval: Duration,
    /// Minimum spacing between group and bulk mutations.
    pub group_interval: Duration,
    pub request_timeout: Duration,
    /// Attempts for idempotent requests, first try included.
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    /// How long a blink holds the transient state.
    pub blink_interval: Duration,
    pub pairing_poll_interval: Duration,
    /// Budget for the serial search before falling back to existing lights.
    pub serial_search_timeout: Duration,
    pub serial_poll_interval: Duration,
    /// PEM bundle with a vendor root to pin.
    pub pinned_root: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            resource_interval: Duration::from_millis(100),
            group_interval: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(250),
            blink_interval: Duration::from_secs(1),
            pairing_poll_interval: Duration::from_secs(2),
            serial_search_timeout: Duration::from_secs(40),
            serial_poll_interval: Duration::from_secs(1),
            pinned_root: None,
        }
    }
}

impl ClientSettings {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            pinned_root: self.pinned_root.clone(),
            request_timeout: self.request_timeout,
            ..TransportConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_timeout_is_clamped() {
        let mut settings = DiscoverySettings::default();
        assert_eq!(settings.effective_timeout(), Duration::from_secs(15));

        settings.timeout = Duration::from_secs(2);
        assert_eq!(settings.effective_timeout(), Duration::from_secs(10));

        settings.timeout = Duration::from_secs(600);
        assert_eq!(settings.effective_timeout(), Duration::from_secs(40));
    }
}
