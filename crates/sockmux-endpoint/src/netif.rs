//! Interface name/index resolution.
//!
//! The multicast layer only consumes a lookup capability; enumerating the
//! host's interfaces and their addresses belongs to the embedder. The
//! shipped `SystemInterfaces` resolves names and validates indexes through
//! the platform; embedders with a real interface table implement
//! `InterfaceResolver` themselves and install it on the endpoint.

use std::net::IpAddr;

use crate::multicast::InterfaceSpec;

/// Lookup capability consumed by multicast auto-selection.
pub trait InterfaceResolver: 'static {
    /// Returns the index of the local interface owning `addr`, or an
    /// address in its scope. `None` triggers the caller's fallback chain.
    fn index_for_address(&self, addr: &IpAddr) -> Option<u32>;

    /// Resolves an interface spec to a verified numeric index.
    fn resolve_index(&self, spec: &InterfaceSpec) -> Option<u32>;
}

/// Platform-backed resolver for names and indexes.
#[derive(Debug, Default)]
pub struct SystemInterfaces;

#[cfg(unix)]
impl InterfaceResolver for SystemInterfaces {
    fn index_for_address(&self, _addr: &IpAddr) -> Option<u32> {
        // Address-to-interface lookup needs the host's interface table,
        // which the embedder supplies through its own resolver.
        None
    }

    fn resolve_index(&self, spec: &InterfaceSpec) -> Option<u32> {
        match spec {
            InterfaceSpec::Name(name) => {
                let name = std::ffi::CString::new(name.as_str()).ok()?;
                let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
                (index != 0).then_some(index)
            }
            InterfaceSpec::Index(index) => {
                let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE];
                let name = unsafe { libc::if_indextoname(*index, buf.as_mut_ptr()) };
                (!name.is_null()).then_some(*index)
            }
            InterfaceSpec::Address(_) => None,
        }
    }
}

#[cfg(not(unix))]
impl InterfaceResolver for SystemInterfaces {
    fn index_for_address(&self, _addr: &IpAddr) -> Option<u32> {
        None
    }

    fn resolve_index(&self, _spec: &InterfaceSpec) -> Option<u32> {
        None
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_resolves_to_none() {
        let resolver = SystemInterfaces;
        let spec = InterfaceSpec::Name("no-such-interface-321".into());
        assert_eq!(resolver.resolve_index(&spec), None);
    }

    #[test]
    fn test_index_zero_is_invalid() {
        let resolver = SystemInterfaces;
        assert_eq!(resolver.resolve_index(&InterfaceSpec::Index(0)), None);
    }

    #[test]
    fn test_loopback_name_and_index_agree() {
        let resolver = SystemInterfaces;
        // Loopback naming differs across unixes; accept either and bail
        // out when neither exists.
        let index = ["lo", "lo0"]
            .iter()
            .find_map(|name| resolver.resolve_index(&InterfaceSpec::Name((*name).into())));
        let Some(index) = index else { return };
        assert_eq!(
            resolver.resolve_index(&InterfaceSpec::Index(index)),
            Some(index)
        );
    }

    #[test]
    fn test_address_lookup_defers_to_embedder() {
        let resolver = SystemInterfaces;
        let addr: IpAddr = "ff02::1".parse().unwrap();
        assert_eq!(resolver.index_for_address(&addr), None);
    }
}
