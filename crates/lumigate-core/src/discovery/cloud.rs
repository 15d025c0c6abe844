// ── Cloud lookup ──
//
// Asks the vendor's discovery endpoint which bridges last phoned home from
// this public address, then confirms each one locally. The cloud never
// counts as proof: an entry that does not answer the status probe is
// dropped.

use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use serde::Deserialize;
use tracing::{debug, warn};

use lumigate_api::session::DEFAULT_HTTP_PORT;
use lumigate_api::{BridgeValidator, Error};

use super::{DiscoveryStrategy, ResultSink};
use crate::config::DiscoverySettings;
use crate::convert::bridge_from_identity;
use crate::model::DiscoverySource;

/// One entry of the discovery endpoint's answer.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "address")]
    pub internalipaddress: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl CloudEntry {
    /// The port the status probe should use. The endpoint reports the TLS
    /// port, but the probe speaks plain HTTP.
    pub fn probe_port(&self) -> u16 {
        match self.port {
            None | Some(443) => DEFAULT_HTTP_PORT,
            Some(port) => port,
        }
    }
}

pub struct CloudDiscovery {
    http: reqwest::Client,
    validator: BridgeValidator,
    url: String,
    retries: u32,
    backoff: Duration,
}

impl CloudDiscovery {
    pub fn new(http: reqwest::Client, validator: BridgeValidator, settings: &DiscoverySettings) -> Self {
        Self {
            http,
            validator,
            url: settings.cloud_url.clone(),
            retries: settings.cloud_retries,
            backoff: settings.cloud_backoff,
        }
    }

    /// Fetch the entry list, retrying server errors and transport hiccups.
    /// Anything else yields an empty list.
    pub async fn fetch_entries(&self) -> Vec<CloudEntry> {
        for attempt in 0..=self.retries {
            match self.fetch_once().await {
                Ok(entries) => return entries,
                Err(e) if attempt < self.retries && retryable(&e) => {
                    let delay = self.backoff * (attempt + 1);
                    debug!(attempt, error = %e, delay_ms = delay.as_millis(), "cloud lookup failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(error = %e, "cloud lookup failed");
                    return Vec::new();
                }
            }
        }
        Vec::new()
    }

    async fn fetch_once(&self) -> Result<Vec<CloudEntry>, Error> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| Error::decode(&e, body))
    }
}

fn retryable(error: &Error) -> bool {
    match error {
        Error::HttpStatus { status, .. } => *status >= 500,
        Error::NotFound { .. } | Error::NotAuthenticated | Error::RateLimited => false,
        other => other.is_transient(),
    }
}

impl DiscoveryStrategy for CloudDiscovery {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Cloud
    }

    fn run<'a>(&'a self, sink: &'a ResultSink) -> BoxFuture<'a, ()> {
        async move {
            let entries = self.fetch_entries().await;
            debug!(count = entries.len(), "cloud entries");

            join_all(entries.iter().map(|entry| async move {
                if sink.is_satisfied() {
                    return;
                }
                let port = entry.probe_port();
                match self.validator.validate(&entry.internalipaddress, port).await {
                    Some(identity) => {
                        sink.offer(bridge_from_identity(identity, DiscoverySource::Cloud));
                    }
                    None => debug!(
                        address = %entry.internalipaddress,
                        id = entry.id.as_deref().unwrap_or("-"),
                        "cloud entry did not validate"
                    ),
                }
            }))
            .await;
        }
        .boxed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn cloud_for(server: &MockServer) -> CloudDiscovery {
        let settings = DiscoverySettings {
            cloud_url: server.uri(),
            cloud_backoff: Duration::from_millis(10),
            ..DiscoverySettings::default()
        };
        let http = reqwest::Client::new();
        let validator = BridgeValidator::new(http.clone(), Duration::from_secs(1));
        CloudDiscovery::new(http, validator, &settings)
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.unwrap().len()
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "001788fffe0a0b0c", "internalipaddress": "192.168.1.20", "port": 443}
            ])))
            .mount(&server)
            .await;

        let entries = cloud_for(&server).fetch_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].internalipaddress, "192.168.1.20");
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn gives_up_after_three_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        assert!(cloud_for(&server).fetch_entries().await.is_empty());
        assert_eq!(request_count(&server).await, 4);
    }

    #[tokio::test]
    async fn other_failures_yield_nothing_without_retry() {
        let responses = [
            ResponseTemplate::new(404),
            ResponseTemplate::new(429),
            ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
        ];
        for response in responses {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(response)
                .mount(&server)
                .await;

            assert!(cloud_for(&server).fetch_entries().await.is_empty());
            assert_eq!(request_count(&server).await, 1);
        }
    }

    #[test]
    fn entry_accepts_either_address_key() {
        let entries: Vec<CloudEntry> = serde_json::from_str(
            r#"[{"id":"001788fffe0a0b0c","internalipaddress":"192.168.1.20","port":443},
                {"address":"192.168.1.21"}]"#,
        )
        .unwrap();
        assert_eq!(entries[0].internalipaddress, "192.168.1.20");
        assert_eq!(entries[0].probe_port(), 80);
        assert_eq!(entries[1].internalipaddress, "192.168.1.21");
        assert_eq!(entries[1].probe_port(), 80);
    }

    #[test]
    fn explicit_port_is_kept() {
        let entry = CloudEntry {
            id: None,
            internalipaddress: "10.0.0.2".into(),
            port: Some(8080),
        };
        assert_eq!(entry.probe_port(), 8080);
    }

    #[test]
    fn only_server_errors_retry() {
        let unavailable = Error::from_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        let bad_gateway = Error::from_status(reqwest::StatusCode::BAD_GATEWAY, "");
        let missing = Error::from_status(reqwest::StatusCode::NOT_FOUND, "");
        let limited = Error::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(retryable(&unavailable));
        assert!(retryable(&bad_gateway));
        assert!(!retryable(&missing));
        assert!(!retryable(&limited));
    }
}
