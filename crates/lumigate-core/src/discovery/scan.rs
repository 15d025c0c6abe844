// ── IP scan ──
//
// Probes a list of well-known addresses followed by every host on the
// local /24. Probes run with bounded concurrency and stop being issued
// once the sink has latched.

use std::collections::HashSet;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt, stream};
use tracing::debug;

use lumigate_api::BridgeValidator;
use lumigate_api::session::DEFAULT_HTTP_PORT;

use super::subnet::{local_ipv4, subnet_hosts};
use super::{DiscoveryStrategy, ResultSink};
use crate::config::DiscoverySettings;
use crate::convert::bridge_from_identity;
use crate::model::DiscoverySource;

pub struct IpScan {
    validator: BridgeValidator,
    addresses: Vec<String>,
    local_subnet: bool,
    concurrency: usize,
    retries: u32,
}

impl IpScan {
    pub fn new(validator: BridgeValidator, settings: &DiscoverySettings) -> Self {
        Self {
            validator,
            addresses: settings.scan_addresses.clone(),
            local_subnet: settings.scan_local_subnet,
            concurrency: settings.scan_concurrency.max(1),
            retries: settings.probe_retries,
        }
    }

    async fn candidates(&self) -> Vec<(String, u16)> {
        let mut all: Vec<(String, u16)> = self
            .addresses
            .iter()
            .map(String::as_str)
            .filter_map(split_target)
            .collect();

        let own = if self.local_subnet { local_ipv4().await } else { None };
        if let Some(own) = own {
            all.extend(
                subnet_hosts(own)
                    .into_iter()
                    .map(|ip| (ip.to_string(), DEFAULT_HTTP_PORT)),
            );
        }

        let mut seen = HashSet::new();
        all.retain(|target| seen.insert(target.clone()));
        all
    }
}

/// Split `host` or `host:port`. Bare IPv6 literals keep the default port.
pub fn split_target(target: &str) -> Option<(String, u16)> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().ok()?,
            None => DEFAULT_HTTP_PORT,
        };
        return Some((host.to_owned(), port));
    }
    match target.split_once(':') {
        Some((host, port)) if !port.contains(':') => Some((host.to_owned(), port.parse().ok()?)),
        _ => Some((target.to_owned(), DEFAULT_HTTP_PORT)),
    }
}

impl DiscoveryStrategy for IpScan {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::IpScan
    }

    fn run<'a>(&'a self, sink: &'a ResultSink) -> BoxFuture<'a, ()> {
        async move {
            let targets = self.candidates().await;
            debug!(count = targets.len(), concurrency = self.concurrency, "scanning");

            let mut probes = stream::iter(targets)
                .map(|(host, port)| async move {
                    if sink.is_satisfied() {
                        return None;
                    }
                    self.validator.validate_with_retry(&host, port, self.retries).await
                })
                .buffer_unordered(self.concurrency);

            while let Some(found) = probes.next().await {
                if let Some(identity) = found {
                    sink.offer(bridge_from_identity(identity, DiscoverySource::IpScan));
                }
                if sink.is_satisfied() {
                    debug!("scan stopped, enough results");
                    break;
                }
            }
        }
        .boxed()
    }
}
