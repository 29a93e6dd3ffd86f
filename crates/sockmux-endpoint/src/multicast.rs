//! Multicast group management.
//!
//! Interface selection is family-specific: IPv4 binds the outbound
//! multicast interface by one of its local IP addresses, IPv6 by numeric
//! interface index. One packing routine produces the combined
//! group+selector payload, reused identically for join, leave, and setting
//! the default send interface, so a leave packs byte-for-byte the same
//! membership request as the matching join.

use std::net::{IpAddr, Ipv4Addr};

use byteorder::{NativeEndian, WriteBytesExt};
use sockmux_core::error::{ErrorKind, Result};

use crate::socket::{AddressFamily, SocketEndpoint};

/// Names the interface multicast traffic should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSpec {
    /// A local IP address owned by the interface.
    Address(IpAddr),
    /// An interface name such as `eth0`.
    Name(String),
    /// A numeric interface index.
    Index(u32),
}

/// The resolved, family-specific multicast interface selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MulticastSelector {
    /// IPv4 selects the interface by a local address it owns.
    LocalAddress(Ipv4Addr),
    /// IPv6 selects the interface by numeric index.
    InterfaceIndex(u32),
}

impl MulticastSelector {
    /// Packs the selector into the wire shape the platform expects:
    /// the four address octets for IPv4, the native-endian index for IPv6.
    pub fn packed(&self) -> Vec<u8> {
        match self {
            MulticastSelector::LocalAddress(addr) => addr.octets().to_vec(),
            MulticastSelector::InterfaceIndex(index) => {
                let mut buf = Vec::with_capacity(4);
                buf.write_u32::<NativeEndian>(*index).expect("vec write");
                buf
            }
        }
    }
}

/// Packs a membership request: group address octets followed by the packed
/// interface selector. Join and leave both consume exactly this payload.
pub fn pack_membership(group: &IpAddr, selector: &MulticastSelector) -> Result<Vec<u8>> {
    match (group, selector) {
        (IpAddr::V4(group), MulticastSelector::LocalAddress(_)) => {
            let mut payload = group.octets().to_vec();
            payload.extend_from_slice(&selector.packed());
            Ok(payload)
        }
        (IpAddr::V6(group), MulticastSelector::InterfaceIndex(_)) => {
            let mut payload = group.octets().to_vec();
            payload.extend_from_slice(&selector.packed());
            Ok(payload)
        }
        _ => Err(ErrorKind::FamilyMismatch),
    }
}

impl SocketEndpoint {
    /// Sets the TTL (IPv4) or hop limit (IPv6) for outgoing multicast.
    pub fn set_multicast_ttl(&self, ttl: u32) -> Result<()> {
        match self.family() {
            AddressFamily::Ipv4 => self.socket().set_multicast_ttl_v4(ttl),
            AddressFamily::Ipv6 => self.socket().set_multicast_hops_v6(ttl),
        }
        .map_err(ErrorKind::Multicast)
    }

    /// Controls whether multicast sends loop back to the local host.
    pub fn set_multicast_loop(&self, enabled: bool) -> Result<()> {
        match self.family() {
            AddressFamily::Ipv4 => self.socket().set_multicast_loop_v4(enabled),
            AddressFamily::Ipv6 => self.socket().set_multicast_loop_v6(enabled),
        }
        .map_err(ErrorKind::Multicast)
    }

    /// Resolves the family-specific interface selector for `group`.
    ///
    /// IPv4 accepts only an explicit local-address spec and otherwise falls
    /// back to the socket's current multicast-send interface. IPv6 resolves
    /// names and indexes through the interface resolver, then asks it which
    /// local interface owns an address in the group's scope, then falls
    /// back to the socket's current setting.
    pub fn resolve_multicast_selector(
        &self,
        group: &IpAddr,
        iface: Option<&InterfaceSpec>,
    ) -> Result<MulticastSelector> {
        match self.family() {
            AddressFamily::Ipv4 => match iface {
                Some(InterfaceSpec::Address(IpAddr::V4(addr))) => {
                    Ok(MulticastSelector::LocalAddress(*addr))
                }
                Some(_) => Err(ErrorKind::FamilyMismatch),
                None => self
                    .current_v4_send_interface()
                    .map(MulticastSelector::LocalAddress)
                    .map_err(ErrorKind::Multicast),
            },
            AddressFamily::Ipv6 => {
                let mut index = match iface {
                    Some(InterfaceSpec::Address(addr)) => self.resolver().index_for_address(addr),
                    Some(spec) => self.resolver().resolve_index(spec),
                    None => None,
                };
                if index.is_none() {
                    index = self.resolver().index_for_address(group);
                }
                let index = match index {
                    Some(index) => index,
                    None => self
                        .current_v6_send_interface()
                        .map_err(ErrorKind::Multicast)?,
                };
                Ok(MulticastSelector::InterfaceIndex(index))
            }
        }
    }

    /// Joins a multicast group, returning the selector that was resolved.
    ///
    /// The matching leave must use the same interface argument; a
    /// mismatched selector is a caller error and is not detected here.
    pub fn join_group(
        &self,
        group: &IpAddr,
        iface: Option<&InterfaceSpec>,
    ) -> Result<MulticastSelector> {
        let selector = self.resolve_multicast_selector(group, iface)?;
        let payload = pack_membership(group, &selector)?;
        self.membership_sockopt(group, true, &payload)?;
        Ok(selector)
    }

    /// Leaves a multicast group joined with the same interface argument.
    pub fn leave_group(
        &self,
        group: &IpAddr,
        iface: Option<&InterfaceSpec>,
    ) -> Result<MulticastSelector> {
        let selector = self.resolve_multicast_selector(group, iface)?;
        let payload = pack_membership(group, &selector)?;
        self.membership_sockopt(group, false, &payload)?;
        Ok(selector)
    }

    /// Sets the default interface for outgoing multicast, resolved the same
    /// way as for join and leave.
    pub fn set_multicast_interface(
        &self,
        group: &IpAddr,
        iface: Option<&InterfaceSpec>,
    ) -> Result<MulticastSelector> {
        let selector = self.resolve_multicast_selector(group, iface)?;
        let (level, optname) = match self.family() {
            AddressFamily::Ipv4 => (sys::IPPROTO_IP, sys::IP_MULTICAST_IF),
            AddressFamily::Ipv6 => (sys::IPPROTO_IPV6, sys::IPV6_MULTICAST_IF),
        };
        sys::setsockopt_raw(self.descriptor(), level, optname, &selector.packed())
            .map_err(ErrorKind::Multicast)?;
        Ok(selector)
    }

    fn membership_sockopt(&self, group: &IpAddr, join: bool, payload: &[u8]) -> Result<()> {
        let (level, optname) = match group {
            IpAddr::V4(_) => (
                sys::IPPROTO_IP,
                if join {
                    sys::IP_ADD_MEMBERSHIP
                } else {
                    sys::IP_DROP_MEMBERSHIP
                },
            ),
            IpAddr::V6(_) => (
                sys::IPPROTO_IPV6,
                if join {
                    sys::IPV6_JOIN_GROUP
                } else {
                    sys::IPV6_LEAVE_GROUP
                },
            ),
        };
        sys::setsockopt_raw(self.descriptor(), level, optname, payload)
            .map_err(ErrorKind::Multicast)
    }

    /// Reads the socket's current IPv4 multicast-send interface.
    pub fn current_v4_send_interface(&self) -> std::io::Result<Ipv4Addr> {
        sys::get_v4_send_interface(self.descriptor())
    }

    /// Reads the socket's current IPv6 multicast-send interface index.
    pub fn current_v6_send_interface(&self) -> std::io::Result<u32> {
        sys::get_v6_send_interface(self.descriptor())
    }
}

#[cfg(unix)]
mod sys {
    use std::{io, mem, net::Ipv4Addr};

    use sockmux_core::selectable::Descriptor;

    pub use libc::{IPPROTO_IP, IPPROTO_IPV6, IPV6_MULTICAST_IF, IP_ADD_MEMBERSHIP,
        IP_DROP_MEMBERSHIP, IP_MULTICAST_IF};

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub const IPV6_JOIN_GROUP: libc::c_int = libc::IPV6_ADD_MEMBERSHIP;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub const IPV6_LEAVE_GROUP: libc::c_int = libc::IPV6_DROP_MEMBERSHIP;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub const IPV6_JOIN_GROUP: libc::c_int = libc::IPV6_JOIN_GROUP;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub const IPV6_LEAVE_GROUP: libc::c_int = libc::IPV6_LEAVE_GROUP;

    pub fn setsockopt_raw(
        fd: Descriptor,
        level: libc::c_int,
        optname: libc::c_int,
        payload: &[u8],
    ) -> io::Result<()> {
        let rc = unsafe {
            libc::setsockopt(
                fd,
                level,
                optname,
                payload.as_ptr().cast(),
                payload.len() as libc::socklen_t,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn get_v4_send_interface(fd: Descriptor) -> io::Result<Ipv4Addr> {
        let mut addr: libc::in_addr = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::in_addr>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd,
                IPPROTO_IP,
                IP_MULTICAST_IF,
                (&mut addr as *mut libc::in_addr).cast(),
                &mut len,
            )
        };
        if rc == 0 {
            Ok(Ipv4Addr::from(u32::from_be(addr.s_addr)))
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn get_v6_send_interface(fd: Descriptor) -> io::Result<u32> {
        let mut index: libc::c_uint = 0;
        let mut len = mem::size_of::<libc::c_uint>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd,
                IPPROTO_IPV6,
                IPV6_MULTICAST_IF,
                (&mut index as *mut libc::c_uint).cast(),
                &mut len,
            )
        };
        if rc == 0 {
            Ok(index as u32)
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        netif::InterfaceResolver,
        socket::{AddressFamily, SocketKind},
    };
    use sockmux_core::config::SocketConfig;
    use std::sync::Arc;

    /// Resolver fixture with a fixed view of the host's interfaces.
    struct FixtureInterfaces {
        scope_index: Option<u32>,
    }

    impl InterfaceResolver for FixtureInterfaces {
        fn index_for_address(&self, _addr: &IpAddr) -> Option<u32> {
            self.scope_index
        }

        fn resolve_index(&self, spec: &InterfaceSpec) -> Option<u32> {
            match spec {
                InterfaceSpec::Name(name) if name == "mc0" => Some(11),
                InterfaceSpec::Index(index) => Some(*index),
                _ => None,
            }
        }
    }

    fn v4_endpoint() -> SocketEndpoint {
        SocketEndpoint::create(
            AddressFamily::Ipv4,
            SocketKind::Datagram,
            &SocketConfig::default(),
        )
        .unwrap()
    }

    fn v6_endpoint(scope_index: Option<u32>) -> SocketEndpoint {
        let mut endpoint = SocketEndpoint::create(
            AddressFamily::Ipv6,
            SocketKind::Datagram,
            &SocketConfig::default(),
        )
        .unwrap();
        endpoint.set_interface_resolver(Arc::new(FixtureInterfaces { scope_index }));
        endpoint
    }

    #[test]
    fn test_v4_selector_packs_local_address() {
        let selector = MulticastSelector::LocalAddress(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(selector.packed(), vec![10, 1, 2, 3]);
    }

    #[test]
    fn test_v6_selector_packs_numeric_index() {
        let selector = MulticastSelector::InterfaceIndex(7);
        assert_eq!(selector.packed(), 7u32.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_membership_payload_shapes_differ_by_family() {
        let v4_group: IpAddr = "239.255.0.1".parse().unwrap();
        let v4 = pack_membership(
            &v4_group,
            &MulticastSelector::LocalAddress(Ipv4Addr::new(192, 168, 0, 2)),
        )
        .unwrap();
        assert_eq!(v4.len(), 8);
        assert_eq!(&v4[..4], &[239, 255, 0, 1]);
        assert_eq!(&v4[4..], &[192, 168, 0, 2]);

        let v6_group: IpAddr = "ff02::123".parse().unwrap();
        let v6 = pack_membership(&v6_group, &MulticastSelector::InterfaceIndex(9)).unwrap();
        assert_eq!(v6.len(), 20);
        assert_eq!(&v6[16..], &9u32.to_ne_bytes());
    }

    #[test]
    fn test_membership_rejects_family_mismatch() {
        let v4_group: IpAddr = "239.255.0.1".parse().unwrap();
        let err = pack_membership(&v4_group, &MulticastSelector::InterfaceIndex(1)).unwrap_err();
        assert!(matches!(err, ErrorKind::FamilyMismatch));

        let v6_group: IpAddr = "ff02::123".parse().unwrap();
        let err = pack_membership(
            &v6_group,
            &MulticastSelector::LocalAddress(Ipv4Addr::LOCALHOST),
        )
        .unwrap_err();
        assert!(matches!(err, ErrorKind::FamilyMismatch));
    }

    #[test]
    fn test_join_and_leave_pack_identical_payloads() {
        let group: IpAddr = "ff02::42".parse().unwrap();
        let selector = MulticastSelector::InterfaceIndex(3);
        let joined = pack_membership(&group, &selector).unwrap();
        let left = pack_membership(&group, &selector).unwrap();
        assert_eq!(joined, left);
    }

    #[test]
    fn test_v4_explicit_interface_address_wins() {
        let endpoint = v4_endpoint();
        let group: IpAddr = "239.255.0.1".parse().unwrap();
        let spec = InterfaceSpec::Address("172.16.0.9".parse().unwrap());
        let selector = endpoint
            .resolve_multicast_selector(&group, Some(&spec))
            .unwrap();
        assert_eq!(
            selector,
            MulticastSelector::LocalAddress("172.16.0.9".parse().unwrap())
        );
    }

    #[test]
    fn test_v4_rejects_name_and_index_specs() {
        let endpoint = v4_endpoint();
        let group: IpAddr = "239.255.0.1".parse().unwrap();
        for spec in [InterfaceSpec::Name("eth0".into()), InterfaceSpec::Index(2)] {
            let err = endpoint
                .resolve_multicast_selector(&group, Some(&spec))
                .unwrap_err();
            assert!(matches!(err, ErrorKind::FamilyMismatch));
        }
    }

    #[test]
    fn test_v4_default_falls_back_to_current_send_interface() {
        let endpoint = v4_endpoint();
        let group: IpAddr = "239.255.0.1".parse().unwrap();
        // A fresh socket reports the unspecified interface.
        let selector = endpoint.resolve_multicast_selector(&group, None).unwrap();
        assert_eq!(
            selector,
            MulticastSelector::LocalAddress(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn test_v6_explicit_name_resolves_through_resolver() {
        let endpoint = v6_endpoint(None);
        let group: IpAddr = "ff02::123".parse().unwrap();
        let spec = InterfaceSpec::Name("mc0".into());
        let selector = endpoint
            .resolve_multicast_selector(&group, Some(&spec))
            .unwrap();
        assert_eq!(selector, MulticastSelector::InterfaceIndex(11));
    }

    #[test]
    fn test_v6_default_asks_resolver_for_group_scope() {
        let endpoint = v6_endpoint(Some(5));
        let group: IpAddr = "ff02::123".parse().unwrap();
        let selector = endpoint.resolve_multicast_selector(&group, None).unwrap();
        assert_eq!(selector, MulticastSelector::InterfaceIndex(5));
    }

    #[test]
    fn test_v6_unresolvable_falls_back_to_current_setting() {
        let endpoint = v6_endpoint(None);
        let group: IpAddr = "ff02::123".parse().unwrap();
        // Resolver knows nothing; a fresh socket's send interface is 0.
        let selector = endpoint.resolve_multicast_selector(&group, None).unwrap();
        assert_eq!(selector, MulticastSelector::InterfaceIndex(0));
    }

    #[test]
    fn test_set_multicast_interface_updates_current_setting() {
        let endpoint = v4_endpoint();
        let group: IpAddr = "239.255.0.1".parse().unwrap();
        let spec = InterfaceSpec::Address("127.0.0.1".parse().unwrap());
        match endpoint.set_multicast_interface(&group, Some(&spec)) {
            Ok(selector) => {
                assert_eq!(selector, MulticastSelector::LocalAddress(Ipv4Addr::LOCALHOST));
                assert_eq!(
                    endpoint.current_v4_send_interface().unwrap(),
                    Ipv4Addr::LOCALHOST
                );
            }
            // Environments without multicast capability refuse the option.
            Err(ErrorKind::Multicast(_)) => {}
            Err(err) => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_v4_join_then_leave_round_trip() {
        let endpoint = v4_endpoint();
        endpoint.bind("0.0.0.0:0".parse().unwrap()).unwrap();
        let group: IpAddr = "239.255.42.99".parse().unwrap();
        let spec = InterfaceSpec::Address("127.0.0.1".parse().unwrap());

        let joined = match endpoint.join_group(&group, Some(&spec)) {
            Ok(selector) => selector,
            // Environments without multicast capability refuse the join;
            // there is no membership to verify in that case.
            Err(ErrorKind::Multicast(_)) => return,
            Err(err) => panic!("unexpected join error: {}", err),
        };
        let left = endpoint.leave_group(&group, Some(&spec)).unwrap();
        assert_eq!(joined, left);

        // Leaving again must fail: the membership is gone.
        assert!(endpoint.leave_group(&group, Some(&spec)).is_err());
    }
}
