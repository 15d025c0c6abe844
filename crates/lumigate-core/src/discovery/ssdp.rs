// ── Multicast discovery (SSDP) ──
//
// M-SEARCH on the UPnP group, collect LOCATION headers, fetch each device
// descriptor and confirm the vendor from it. The descriptor is the proof
// here; no status probe is made.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

use lumigate_api::session::DEFAULT_HTTP_PORT;

use super::{DiscoveryStrategy, ResultSink};
use crate::config::DiscoverySettings;
use crate::model::{Bridge, DiscoverySource};

const SSDP_GROUP: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250)), 1900);

pub const SEARCH_TARGETS: &[&str] = &[
    "upnp:rootdevice",
    "urn:schemas-upnp-org:device:basic:1",
    "ssdp:all",
];

const VENDORS: &[&str] = &["signify", "philips"];

pub fn m_search(target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {target}\r\n\r\n"
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// What one SSDP reply told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub location: String,
    /// Vendor-specific `hue-bridgeid` header, when sent.
    pub bridge_id: Option<String>,
}

/// Parse an SSDP reply or NOTIFY. Header names are case-insensitive.
pub fn parse_advertisement(packet: &str) -> Option<Advertisement> {
    let mut lines = packet.lines();
    let status = lines.next()?.trim();
    if !(status.starts_with("HTTP/1.1 200") || status.starts_with("NOTIFY")) {
        return None;
    }

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_owned()))
        .collect();

    let location = headers.get("location").filter(|l| !l.is_empty())?.clone();
    let bridge_id = headers
        .get("hue-bridgeid")
        .filter(|id| !id.is_empty())
        .map(|id| id.to_ascii_uppercase());
    Some(Advertisement { location, bridge_id })
}

/// The fields of a UPnP device descriptor used for identification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub serial_number: Option<String>,
    pub url_base: Option<String>,
}

fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let len = xml[start..].find(&close)?;
    let text = xml[start..start + len].trim();
    (!text.is_empty()).then(|| unescape(text))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn parse_descriptor(xml: &str) -> Descriptor {
    Descriptor {
        friendly_name: tag_text(xml, "friendlyName"),
        manufacturer: tag_text(xml, "manufacturer"),
        model_name: tag_text(xml, "modelName"),
        serial_number: tag_text(xml, "serialNumber"),
        url_base: tag_text(xml, "URLBase"),
    }
}

impl Descriptor {
    /// Whether the descriptor names the vendor, or a model matching one
    /// of `keywords`.
    pub fn is_bridge(&self, keywords: &[String]) -> bool {
        let vendor = self.manufacturer.as_deref().is_some_and(|m| {
            let m = m.to_ascii_lowercase();
            VENDORS.iter().any(|v| m.contains(v))
        });
        let model = self.model_name.as_deref().is_some_and(|m| {
            let m = m.to_ascii_lowercase();
            keywords.iter().any(|k| m.contains(&k.to_ascii_lowercase()))
        });
        vendor || model
    }
}

/// Bridge id from a 12-digit serial (the MAC): first six, `FFFE`, last six.
pub fn bridge_id_from_serial(serial: &str) -> Option<String> {
    let hex: String = serial.chars().filter(char::is_ascii_hexdigit).collect();
    if hex.len() != 12 {
        return None;
    }
    let hex = hex.to_ascii_uppercase();
    Some(format!("{}FFFE{}", &hex[..6], &hex[6..]))
}

// ── Strategy ────────────────────────────────────────────────────────

pub struct MulticastDiscovery {
    http: reqwest::Client,
    window: Duration,
    keywords: Vec<String>,
}

impl MulticastDiscovery {
    pub fn new(http: reqwest::Client, settings: &DiscoverySettings) -> Self {
        Self {
            http,
            window: settings.listen_window,
            keywords: settings.model_keywords.clone(),
        }
    }

    async fn listen(&self) -> std::io::Result<Vec<Advertisement>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        for target in SEARCH_TARGETS {
            socket.send_to(m_search(target).as_bytes(), SSDP_GROUP).await?;
        }

        let deadline = Instant::now() + self.window;
        let mut found: Vec<Advertisement> = Vec::new();
        let mut buf = [0_u8; 2048];

        loop {
            match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok((size, from))) => {
                    let text = String::from_utf8_lossy(&buf[..size]);
                    if let Some(ad) = parse_advertisement(&text) {
                        trace!(%from, location = %ad.location, "ssdp reply");
                        if !found.iter().any(|f| f.location == ad.location) {
                            found.push(ad);
                        }
                    }
                }
                Ok(Err(e)) => debug!(error = %e, "ssdp receive failed"),
                Err(_) => break,
            }
        }
        Ok(found)
    }

    /// Fetch and check the descriptor behind one advertisement.
    pub async fn confirm(&self, ad: &Advertisement) -> Option<Bridge> {
        let location = Url::parse(&ad.location).ok()?;
        let resp = self.http.get(location.clone()).send().await.ok()?;
        if !resp.status().is_success() {
            debug!(location = %ad.location, status = %resp.status(), "descriptor fetch failed");
            return None;
        }
        let xml = resp.text().await.ok()?;
        let descriptor = parse_descriptor(&xml);

        if !descriptor.is_bridge(&self.keywords) {
            trace!(location = %ad.location, "not a bridge descriptor");
            return None;
        }

        let id = ad
            .bridge_id
            .clone()
            .or_else(|| descriptor.serial_number.as_deref().and_then(bridge_id_from_serial))?;

        let base = descriptor
            .url_base
            .as_deref()
            .and_then(|b| Url::parse(b).ok())
            .unwrap_or(location);
        let address = base.host_str()?.trim_matches(['[', ']']).to_owned();
        let port = base.port().unwrap_or(DEFAULT_HTTP_PORT);

        Some(Bridge {
            id,
            address,
            port,
            name: descriptor.friendly_name,
            model: descriptor.model_name,
            api_version: None,
            source: DiscoverySource::Multicast,
        })
    }
}

impl DiscoveryStrategy for MulticastDiscovery {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Multicast
    }

    fn run<'a>(&'a self, sink: &'a ResultSink) -> BoxFuture<'a, ()> {
        async move {
            let ads = match self.listen().await {
                Ok(ads) => ads,
                Err(e) => {
                    warn!(error = %e, "multicast discovery unavailable");
                    return;
                }
            };
            debug!(count = ads.len(), "ssdp advertisements");

            join_all(ads.iter().map(|ad| async move {
                if sink.is_satisfied() {
                    return;
                }
                if let Some(bridge) = self.confirm(ad).await {
                    sink.offer(bridge);
                }
            }))
            .await;
        }
        .boxed()
    }
}
