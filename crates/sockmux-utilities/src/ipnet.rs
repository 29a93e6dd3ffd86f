//! Address + netmask values.

use std::{fmt, io, net::IpAddr};

fn family_width(v4: bool) -> u32 {
    if v4 {
        32
    } else {
        128
    }
}

fn family_max(v4: bool) -> u128 {
    if v4 {
        u32::MAX as u128
    } else {
        u128::MAX
    }
}

fn to_bits(ip: &IpAddr) -> u128 {
    match ip {
        IpAddr::V4(addr) => u32::from(*addr) as u128,
        IpAddr::V6(addr) => u128::from(*addr),
    }
}

fn from_bits(bits: u128, v4: bool) -> IpAddr {
    if v4 {
        IpAddr::V4(std::net::Ipv4Addr::from(bits as u32))
    } else {
        IpAddr::V6(std::net::Ipv6Addr::from(bits))
    }
}

fn mask_of_prefix(prefix: u32, v4: bool) -> u128 {
    let width = family_width(v4);
    if prefix == 0 {
        return 0;
    }
    let host_bits = width.saturating_sub(prefix);
    family_max(v4) & !((1u128 << host_bits) - 1)
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

/// An IP address paired with its netmask.
///
/// Parses from `"addr"`, `"addr/prefix"`, or `"addr/dotted-mask"`; a bare
/// address gets the full-width host mask. Derives the network, local, and
/// broadcast addresses and answers containment queries, for either family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpNet {
    ip: IpAddr,
    netmask: IpAddr,
}

impl IpNet {
    /// Pairs an address with a netmask of the same family.
    pub fn new(ip: IpAddr, netmask: IpAddr) -> io::Result<IpNet> {
        if ip.is_ipv4() != netmask.is_ipv4() {
            return Err(invalid(format!(
                "netmask {} does not match the family of {}",
                netmask, ip
            )));
        }
        Ok(IpNet { ip, netmask })
    }

    /// Pairs an address with a prefix length.
    pub fn with_prefix(ip: IpAddr, prefix: u32) -> io::Result<IpNet> {
        let width = family_width(ip.is_ipv4());
        if prefix > width {
            return Err(invalid(format!("prefix /{} too long for {}", prefix, ip)));
        }
        let netmask = from_bits(mask_of_prefix(prefix, ip.is_ipv4()), ip.is_ipv4());
        Ok(IpNet { ip, netmask })
    }

    /// Parses `"addr"`, `"addr/prefix"`, or `"addr/dotted-mask"`.
    pub fn parse(text: &str) -> io::Result<IpNet> {
        let (addr_part, mask_part) = match text.split_once('/') {
            Some((addr, mask)) => (addr, Some(mask)),
            None => (text, None),
        };
        let ip: IpAddr = addr_part
            .parse()
            .map_err(|e| invalid(format!("invalid address {:?}: {}", addr_part, e)))?;
        match mask_part {
            None => Self::with_prefix(ip, family_width(ip.is_ipv4())),
            Some(mask) if mask.bytes().all(|b| b.is_ascii_digit()) => {
                let prefix: u32 = mask
                    .parse()
                    .map_err(|e| invalid(format!("invalid prefix {:?}: {}", mask, e)))?;
                Self::with_prefix(ip, prefix)
            }
            Some(mask) => {
                let netmask: IpAddr = mask
                    .parse()
                    .map_err(|e| invalid(format!("invalid netmask {:?}: {}", mask, e)))?;
                Self::new(ip, netmask)
            }
        }
    }

    /// The address.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// The netmask as an address value.
    pub fn netmask(&self) -> IpAddr {
        self.netmask
    }

    /// The prefix length, when the netmask is a contiguous run of ones.
    pub fn prefix_len(&self) -> Option<u32> {
        let bits = to_bits(&self.netmask);
        let ones = bits.count_ones();
        (bits == mask_of_prefix(ones, self.ip.is_ipv4())).then_some(ones)
    }

    /// The address packed to its fixed-width network-order bytes.
    pub fn packed(&self) -> Vec<u8> {
        match self.ip {
            IpAddr::V4(addr) => addr.octets().to_vec(),
            IpAddr::V6(addr) => addr.octets().to_vec(),
        }
    }

    /// The network address: `ip & netmask`.
    pub fn network(&self) -> IpAddr {
        from_bits(to_bits(&self.ip) & to_bits(&self.netmask), self.ip.is_ipv4())
    }

    /// The host part: `ip & !netmask`.
    pub fn local(&self) -> IpAddr {
        let host = to_bits(&self.ip) & !to_bits(&self.netmask) & family_max(self.ip.is_ipv4());
        from_bits(host, self.ip.is_ipv4())
    }

    /// The broadcast address: the network with all host bits set.
    pub fn broadcast(&self) -> IpAddr {
        let v4 = self.ip.is_ipv4();
        let network = to_bits(&self.ip) & to_bits(&self.netmask);
        from_bits(network | (!to_bits(&self.netmask) & family_max(v4)), v4)
    }

    /// Whether `other` falls inside this network. Addresses of the other
    /// family never do.
    pub fn contains(&self, other: &IpAddr) -> bool {
        if other.is_ipv4() != self.ip.is_ipv4() {
            return false;
        }
        let mask = to_bits(&self.netmask);
        (to_bits(other) & mask) == (to_bits(&self.ip) & mask)
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix_len() {
            Some(prefix) => write!(f, "{}/{}", self.ip, prefix),
            None => write!(f, "{}/{}", self.ip, self.netmask),
        }
    }
}
