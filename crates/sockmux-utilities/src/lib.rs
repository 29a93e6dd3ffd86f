#![warn(missing_docs)]

//! Address and network value utilities for sockmux.
//!
//! The multiplexer core consumes addresses as opaque, comparable values;
//! this crate supplies them:
//!
//! - `IpNet`: an address paired with a netmask, with network/broadcast
//!   derivation and containment checks for both families
//! - Parsing and formatting helpers for plain addresses
//! - DNS resolution and reverse lookup
//!
//! Keeping these in a separate crate leaves the core free of any lookup
//! machinery.

use std::{
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
};

/// Address + netmask values.
pub mod ipnet;

pub use ipnet::IpNet;

/// Resolves a hostname to a socket address using DNS, taking the first
/// result.
pub fn resolve_host(hostname: &str, port: u16) -> io::Result<SocketAddr> {
    format!("{}:{}", hostname, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not resolve hostname"))
}

/// Performs a reverse DNS lookup for an IP address.
pub fn reverse_lookup(addr: &IpAddr) -> io::Result<String> {
    dns_lookup::lookup_addr(addr).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

/// Parses an IP address string (no DNS resolution) into a socket address.
pub fn parse_ip(ip_str: &str, port: u16) -> io::Result<SocketAddr> {
    let ip: IpAddr = ip_str.parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid IP address: {}", e),
        )
    })?;
    Ok(SocketAddr::new(ip, port))
}

/// Parses a multicast group address, rejecting unicast input early so a
/// join does not fail later with an opaque platform error.
pub fn parse_group(group: &str) -> io::Result<IpAddr> {
    let ip: IpAddr = group.parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid group address: {}", e),
        )
    })?;
    if !ip.is_multicast() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a multicast group address", ip),
        ));
    }
    Ok(ip)
}

/// Formats a socket address to its bare IP string.
pub fn format_ip(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_parse_ip_both_families() {
        let v4 = parse_ip("192.168.1.1", 8080).unwrap();
        assert_eq!(v4.ip(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(v4.port(), 8080);

        let v6 = parse_ip("::1", 8080).unwrap();
        assert_eq!(v6.ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_parse_ip_rejects_garbage() {
        assert!(parse_ip("not-an-ip", 8080).is_err());
    }

    #[test]
    fn test_parse_group_accepts_multicast_only() {
        assert_eq!(
            parse_group("239.255.0.1").unwrap(),
            "239.255.0.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            parse_group("ff02::123").unwrap(),
            "ff02::123".parse::<IpAddr>().unwrap()
        );
        assert!(parse_group("10.0.0.1").is_err());
        assert!(parse_group("::1").is_err());
    }

    #[test]
    fn test_format_ip() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);
        assert_eq!(format_ip(&addr), "127.0.0.1");
    }

    #[test]
    fn test_resolve_localhost() {
        let addr = resolve_host("localhost", 7777).unwrap();
        assert_eq!(addr.port(), 7777);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_resolve_ip_string_needs_no_dns() {
        let addr = resolve_host("127.0.0.1", 7777).unwrap();
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    }
}
