use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::debug;

/// Best-guess address of this host as seen by LAN peers, for building a
/// dialable share link. Falls back to loopback when no route is up.
pub fn local_ip() -> IpAddr {
    match outgoing_ip() {
        Some(ip) => ip,
        None => {
            debug!("no outgoing route found, falling back to loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Source address the OS would pick for outbound traffic. Connecting a
/// UDP socket sends no packet; it only selects the route.
fn outgoing_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified() && !ip.is_loopback()).then_some(ip)
}

/// Address peers should dial for a listener bound at `bound`. A concrete
/// bind address passes through; an unspecified one (0.0.0.0) is not
/// dialable and gets replaced by the outgoing address, keeping the port.
pub fn advertised_addr(bound: SocketAddr) -> SocketAddr {
    if bound.ip().is_unspecified() {
        SocketAddr::new(local_ip(), bound.port())
    } else {
        bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_bind_becomes_dialable() {
        let out = advertised_addr("0.0.0.0:8888".parse().unwrap());
        assert!(!out.ip().is_unspecified());
        assert_eq!(out.port(), 8888);
    }

    #[test]
    fn concrete_bind_passes_through() {
        let addr: SocketAddr = "192.168.1.5:8888".parse().unwrap();
        assert_eq!(advertised_addr(addr), addr);
    }

    #[test]
    fn local_ip_is_never_unspecified() {
        assert!(!local_ip().is_unspecified());
    }
}
