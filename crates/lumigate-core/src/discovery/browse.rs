// ── Service browse (mDNS / DNS-SD) ──
//
// Sends one PTR question for the gateway service type with the
// unicast-response bit set and collects answers for the listen window.
// Address records are probed directly; when an advertisement carries
// none, IPv4 candidates are recovered from the instance and host names.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use lumigate_api::BridgeValidator;
use lumigate_api::session::DEFAULT_HTTP_PORT;

use super::{DiscoveryStrategy, ResultSink};
use crate::config::DiscoverySettings;
use crate::convert::bridge_from_identity;
use crate::model::DiscoverySource;

pub const SERVICE_TYPE: &str = "_hue._tcp.local";

const MDNS_GROUP: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(224, 0, 0, 251)), 5353);

const TYPE_A: u16 = 1;
const TYPE_PTR: u16 = 12;
const TYPE_TXT: u16 = 16;
const TYPE_SRV: u16 = 33;
const CLASS_IN: u16 = 1;
/// Top bit of the question class: "answer me by unicast".
const UNICAST_RESPONSE: u16 = 0x8000;

// ── Wire format ─────────────────────────────────────────────────────

/// A decoded resource record. Only the types browsing cares about keep
/// their payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    A { name: String, address: Ipv4Addr },
    Ptr { name: String, target: String },
    Srv { name: String, port: u16, target: String },
    Txt { name: String, entries: Vec<String> },
    Other { name: String, rtype: u16 },
}

/// Encode the browse question.
pub fn build_query(service: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(12 + service.len() + 6);
    // id, flags, qdcount=1, ancount, nscount, arcount
    packet.extend_from_slice(&[0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
    for label in service.split('.').filter(|l| !l.is_empty()) {
        let len = u8::try_from(label.len()).unwrap_or(63).min(63);
        packet.push(len);
        packet.extend_from_slice(&label.as_bytes()[..usize::from(len)]);
    }
    packet.push(0);
    packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
    packet.extend_from_slice(&(CLASS_IN | UNICAST_RESPONSE).to_be_bytes());
    packet
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u16(&mut self) -> Option<u16> {
        let bytes = self.buf.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let slice = self.buf.get(self.pos..self.pos + len)?;
        self.pos += len;
        Some(slice)
    }

    /// Read a possibly compressed name starting at the cursor.
    fn name(&mut self) -> Option<String> {
        let (name, end) = read_name(self.buf, self.pos)?;
        self.pos = end;
        Some(name)
    }
}

/// Returns the dotted name and the offset just past it in the original
/// position (pointers are followed but do not move the cursor further).
fn read_name(buf: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *buf.get(pos)?;
        match len {
            0 => {
                end.get_or_insert(pos + 1);
                break;
            }
            l if l & 0xC0 == 0xC0 => {
                let low = *buf.get(pos + 1)?;
                end.get_or_insert(pos + 2);
                jumps += 1;
                if jumps > 16 {
                    return None;
                }
                pos = usize::from(u16::from_be_bytes([l & 0x3F, low]));
            }
            l => {
                let label = buf.get(pos + 1..pos + 1 + usize::from(l))?;
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos += 1 + usize::from(l);
            }
        }
    }

    Some((labels.join("."), end?))
}

/// Decode every answer, authority and additional record of a response.
/// Malformed packets yield whatever was read before the damage.
pub fn parse_response(packet: &[u8]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut r = Reader { buf: packet, pos: 0 };

    let header = (|| {
        r.bytes(4)?;
        let qd = r.u16()?;
        let an = r.u16()?;
        let ns = r.u16()?;
        let ar = r.u16()?;
        Some((qd, u32::from(an) + u32::from(ns) + u32::from(ar)))
    })();
    let Some((questions, total)) = header else {
        return records;
    };

    for _ in 0..questions {
        if r.name().is_none() || r.bytes(4).is_none() {
            return records;
        }
    }

    for _ in 0..total {
        match read_record(&mut r) {
            Some(record) => records.push(record),
            None => break,
        }
    }
    records
}

fn read_record(r: &mut Reader<'_>) -> Option<Record> {
    let name = r.name()?;
    let rtype = r.u16()?;
    let _class = r.u16()?;
    let _ttl = r.bytes(4)?;
    let len = usize::from(r.u16()?);
    let rdata_start = r.pos;
    let rdata = r.bytes(len)?;

    let record = match rtype {
        TYPE_A if rdata.len() == 4 => Record::A {
            name,
            address: Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]),
        },
        TYPE_PTR => Record::Ptr {
            name,
            target: read_name(r.buf, rdata_start)?.0,
        },
        TYPE_SRV if rdata.len() > 6 => Record::Srv {
            name,
            port: u16::from_be_bytes([rdata[4], rdata[5]]),
            target: read_name(r.buf, rdata_start + 6)?.0,
        },
        TYPE_TXT => {
            let mut entries = Vec::new();
            let mut i = 0;
            while i < rdata.len() {
                let n = usize::from(rdata[i]);
                let Some(entry) = rdata.get(i + 1..i + 1 + n) else {
                    break;
                };
                if !entry.is_empty() {
                    entries.push(String::from_utf8_lossy(entry).into_owned());
                }
                i += 1 + n;
            }
            Record::Txt { name, entries }
        }
        other => Record::Other { name, rtype: other },
    };
    Some(record)
}

/// Recover an IPv4 address embedded in a name, such as
/// `192-168-1-20.local` or `Bridge 10.0.0.7`.
pub fn address_from_name(name: &str) -> Option<Ipv4Addr> {
    let tokens: Vec<&str> = name
        .split(|c: char| !c.is_ascii_digit())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.windows(4).find_map(|w| {
        let octets: Vec<u8> = w.iter().filter_map(|t| t.parse().ok()).collect();
        let [a, b, c, d] = octets.as_slice() else {
            return None;
        };
        let ip = Ipv4Addr::new(*a, *b, *c, *d);
        (!ip.is_unspecified() && !ip.is_broadcast()).then_some(ip)
    })
}

/// Candidate `(address, port)` pairs from one response. A records win;
/// names are only mined when the response carries no address.
pub fn candidates(records: &[Record]) -> Vec<(String, u16)> {
    let port = records
        .iter()
        .find_map(|r| match r {
            Record::Srv { port, .. } if *port != 443 => Some(*port),
            _ => None,
        })
        .unwrap_or(DEFAULT_HTTP_PORT);

    let mut out: Vec<(String, u16)> = records
        .iter()
        .filter_map(|r| match r {
            Record::A { address, .. } => Some((address.to_string(), port)),
            _ => None,
        })
        .collect();

    if out.is_empty() {
        out = records
            .iter()
            .filter_map(|r| match r {
                Record::Ptr { target, .. } => address_from_name(target),
                Record::Srv { name, target, .. } => {
                    address_from_name(target).or_else(|| address_from_name(name))
                }
                _ => None,
            })
            .map(|ip| (ip.to_string(), port))
            .collect();
    }

    let mut seen = HashSet::new();
    out.retain(|c| seen.insert(c.clone()));
    out
}

// ── Strategy ────────────────────────────────────────────────────────

pub struct ServiceBrowse {
    validator: BridgeValidator,
    window: Duration,
    retries: u32,
}

impl ServiceBrowse {
    pub fn new(validator: BridgeValidator, settings: &DiscoverySettings) -> Self {
        Self {
            validator,
            window: settings.listen_window,
            retries: settings.probe_retries,
        }
    }

    async fn collect(&self) -> std::io::Result<Vec<(String, u16)>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.send_to(&build_query(SERVICE_TYPE), MDNS_GROUP).await?;

        let deadline = Instant::now() + self.window;
        let mut found = Vec::new();
        let mut buf = [0_u8; 4096];

        loop {
            match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(Ok((size, from))) => {
                    let records = parse_response(&buf[..size]);
                    trace!(%from, records = records.len(), "mdns answer");
                    if records
                        .iter()
                        .any(|r| matches!(r, Record::Ptr { name, .. } if name.eq_ignore_ascii_case(SERVICE_TYPE)))
                    {
                        found.extend(candidates(&records));
                    }
                }
                Ok(Err(e)) => debug!(error = %e, "mdns receive failed"),
                Err(_) => break,
            }
        }

        let mut seen = HashSet::new();
        found.retain(|c| seen.insert(c.clone()));
        Ok(found)
    }
}

impl DiscoveryStrategy for ServiceBrowse {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::ServiceBrowse
    }

    fn run<'a>(&'a self, sink: &'a ResultSink) -> BoxFuture<'a, ()> {
        async move {
            let targets = match self.collect().await {
                Ok(targets) => targets,
                Err(e) => {
                    warn!(error = %e, "service browse unavailable");
                    return;
                }
            };
            debug!(count = targets.len(), "service browse candidates");

            join_all(targets.iter().map(|(host, port)| async move {
                if sink.is_satisfied() {
                    return;
                }
                if let Some(identity) = self.validator.validate_with_retry(host, *port, self.retries).await {
                    sink.offer(bridge_from_identity(identity, DiscoverySource::ServiceBrowse));
                }
            }))
            .await;
        }
        .boxed()
    }
}
