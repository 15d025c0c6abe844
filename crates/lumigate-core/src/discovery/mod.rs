// ── Discovery orchestrator ──
//
// Runs every enabled strategy concurrently and merges what they confirm
// into one accumulator keyed by bridge id. Completion is whichever comes
// first: all strategies reported, the global deadline, or the
// "sufficient results" latch. Strategy failures are logged and never
// surface to the caller; partial results are always returned.

pub mod browse;
pub mod cloud;
pub mod scan;
pub mod ssdp;
pub mod subnet;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use lumigate_api::{BridgeValidator, TransportConfig};

use crate::config::DiscoverySettings;
use crate::error::CoreError;
use crate::model::{Bridge, DiscoverySource};

pub use browse::ServiceBrowse;
pub use cloud::CloudDiscovery;
pub use scan::IpScan;
pub use ssdp::MulticastDiscovery;

// ── Strategy seam ───────────────────────────────────────────────────

/// One way of finding bridges.
///
/// Implementations push each confirmed bridge into the sink as soon as it
/// is confirmed and resolve once they have nothing more to report. They
/// should stop early when [`ResultSink::is_satisfied`] turns true.
pub trait DiscoveryStrategy: Send + Sync {
    fn source(&self) -> DiscoverySource;

    fn run<'a>(&'a self, sink: &'a ResultSink) -> BoxFuture<'a, ()>;
}

// ── Accumulator ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Accumulated {
    bridges: IndexMap<String, Bridge>,
    satisfied: bool,
}

/// Shared, mutex-guarded merge point for all strategies.
#[derive(Debug, Clone)]
pub struct ResultSink {
    state: Arc<Mutex<Accumulated>>,
    notify: Arc<Notify>,
    sufficient: Option<usize>,
}

impl ResultSink {
    pub fn new(sufficient: Option<usize>) -> Self {
        Self {
            state: Arc::new(Mutex::new(Accumulated::default())),
            notify: Arc::new(Notify::new()),
            sufficient: sufficient.filter(|n| *n > 0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Accumulated> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a confirmed bridge. Returns `false` when it was discarded:
    /// already known, or the sink has latched.
    pub fn offer(&self, bridge: Bridge) -> bool {
        let mut state = self.lock();
        if state.satisfied {
            debug!(id = %bridge.id, "discarding result after latch");
            return false;
        }
        if state.bridges.contains_key(&bridge.id) {
            debug!(id = %bridge.id, source = %bridge.source, "duplicate bridge");
            return false;
        }

        info!(id = %bridge.id, address = %bridge.address, source = %bridge.source, "bridge found");
        state.bridges.insert(bridge.id.clone(), bridge);

        if self.sufficient.is_some_and(|n| state.bridges.len() >= n) {
            state.satisfied = true;
            self.notify.notify_one();
        }
        true
    }

    pub fn is_satisfied(&self) -> bool {
        self.lock().satisfied
    }

    pub fn len(&self) -> usize {
        self.lock().bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Bridge> {
        self.lock().bridges.values().cloned().collect()
    }

    async fn satisfied(&self) {
        if self.is_satisfied() {
            return;
        }
        self.notify.notified().await;
    }
}

// ── Discovery ───────────────────────────────────────────────────────

pub struct Discovery {
    timeout: Duration,
    sufficient: Option<usize>,
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl Discovery {
    /// Build the strategies enabled in `settings`.
    pub fn new(settings: &DiscoverySettings) -> Result<Self, CoreError> {
        let probe_http = TransportConfig::default().build_probe_client(settings.probe_timeout)?;
        let validator = BridgeValidator::new(probe_http.clone(), settings.probe_timeout)
            .with_keywords(settings.model_keywords.iter().cloned());

        let mut strategies: Vec<Box<dyn DiscoveryStrategy>> = Vec::new();
        if settings.cloud {
            strategies.push(Box::new(CloudDiscovery::new(
                probe_http.clone(),
                validator.clone(),
                settings,
            )));
        }
        if settings.ip_scan {
            strategies.push(Box::new(IpScan::new(validator.clone(), settings)));
        }
        if settings.service_browse {
            strategies.push(Box::new(ServiceBrowse::new(validator.clone(), settings)));
        }
        if settings.multicast {
            strategies.push(Box::new(MulticastDiscovery::new(probe_http, settings)));
        }

        Ok(Self::with_strategies(settings, strategies))
    }

    pub fn with_strategies(
        settings: &DiscoverySettings,
        strategies: Vec<Box<dyn DiscoveryStrategy>>,
    ) -> Self {
        Self {
            timeout: settings.effective_timeout(),
            sufficient: settings.sufficient_results,
            strategies,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every strategy and return the merged, deduplicated bridges.
    ///
    /// Resolves exactly once, within the global timeout.
    pub async fn discover(&self) -> Vec<Bridge> {
        let sink = ResultSink::new(self.sufficient);
        info!(
            strategies = self.strategies.len(),
            timeout_secs = self.timeout.as_secs(),
            "starting discovery"
        );

        let all = join_all(self.strategies.iter().map(|strategy| {
            let sink = &sink;
            async move {
                strategy.run(sink).await;
                debug!(source = %strategy.source(), total = sink.len(), "strategy finished");
            }
        }));

        tokio::select! {
            _ = all => debug!("all strategies reported"),
            () = sink.satisfied() => info!("sufficient results, stopping early"),
            () = tokio::time::sleep(self.timeout) => {
                warn!(found = sink.len(), "discovery deadline reached");
            }
        }

        let bridges = sink.snapshot();
        info!(count = bridges.len(), "discovery complete");
        bridges
    }
}
