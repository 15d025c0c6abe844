// ── Local subnet detection ──

use std::net::{IpAddr, Ipv4Addr};

use tokio::net::UdpSocket;
use tracing::debug;

use lumigate_api::trust::is_private_address;

/// Any routable address works; connecting a UDP socket sends nothing and
/// only asks the OS which interface it would use.
const ROUTE_PROBE: &str = "192.0.2.1:9";

/// This machine's IPv4 address on the default route, if it is private.
pub async fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    socket.connect(ROUTE_PROBE).await.ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() && is_private_address(IpAddr::V4(ip)) => {
            debug!(%ip, "local address");
            Some(ip)
        }
        other => {
            debug!(ip = %other, "no private IPv4 route, skipping subnet");
            None
        }
    }
}

/// Every host of `ip`'s /24 except `ip` itself, network and broadcast.
pub fn subnet_hosts(ip: Ipv4Addr) -> Vec<Ipv4Addr> {
    let [a, b, c, own] = ip.octets();
    (1..=254_u8)
        .filter(|host| *host != own)
        .map(|host| Ipv4Addr::new(a, b, c, host))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_exclude_self() {
        let hosts = subnet_hosts(Ipv4Addr::new(192, 168, 1, 37));
        assert_eq!(hosts.len(), 253);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 37)));
        assert!(!hosts.contains(&Ipv4Addr::new(192, 168, 1, 255)));
    }
}
