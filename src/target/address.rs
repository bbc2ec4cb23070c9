//! `host/port` address parsing.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use crate::error::ConfigErrorKind;

/// Parse a configured `host/port` address.
///
/// The host may be an IPv4 or IPv6 literal or a resolvable name. The split
/// happens at the last `/`, so `::1/161` works.
pub fn parse_address(input: &str) -> Result<SocketAddr, ConfigErrorKind> {
    let (host, port) = input
        .trim()
        .rsplit_once('/')
        .ok_or(ConfigErrorKind::InvalidAddress)?;
    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigErrorKind::InvalidAddress);
    }
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| ConfigErrorKind::InvalidAddress)?;

    if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.next().ok_or(ConfigErrorKind::InvalidAddress),
        Err(e) => {
            tracing::debug!(snmp.host = host, error = %e, "host did not resolve");
            Err(ConfigErrorKind::InvalidAddress)
        }
    }
}

/// Host part used for trap matching: the IP, with IPv4-mapped IPv6
/// addresses folded to IPv4.
pub fn match_key(addr: &SocketAddr) -> IpAddr {
    addr.ip().to_canonical()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let addr = parse_address("192.0.2.10/161").unwrap();
        assert_eq!(addr, "192.0.2.10:161".parse().unwrap());
    }

    #[test]
    fn test_parse_ipv6() {
        let addr = parse_address("::1/1161").unwrap();
        assert_eq!(addr, "[::1]:1161".parse().unwrap());
        assert_eq!(parse_address("[::1]/161").unwrap().port(), 161);
    }

    #[test]
    fn test_parse_localhost_name() {
        let addr = parse_address("localhost/161").unwrap();
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_malformed() {
        for bad in ["", "192.0.2.10", "192.0.2.10:161", "/161", "192.0.2.10/", "10.0.0.1/70000", "10.0.0.1/x"] {
            assert_eq!(parse_address(bad), Err(ConfigErrorKind::InvalidAddress), "{bad}");
        }
    }

    #[test]
    fn test_match_key_folds_mapped() {
        let mapped: SocketAddr = "[::ffff:192.0.2.10]:5000".parse().unwrap();
        let plain: SocketAddr = "192.0.2.10:161".parse().unwrap();
        assert_eq!(match_key(&mapped), match_key(&plain));
    }
}
