//! Socket configuration options.

use std::default::Default;

/// Configuration applied to a socket endpoint at creation time.
///
/// Every endpoint is always switched to non-blocking mode; the options here
/// tune the remaining, platform-dependent parts of configuration.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// Also set SO_REUSEPORT where the platform supports it.
    pub reuse_port: bool,
    /// On IPv6 sockets, set IPV6_V6ONLY so a wildcard bind does not
    /// silently capture IPv4 traffic as well.
    pub disallow_mixed_ip_families: bool,
    /// Socket receive buffer size in bytes. `None` runs the adaptive
    /// buffer search and uses the discovered process-wide maximum.
    pub recv_buffer_size: Option<usize>,
    /// Socket send buffer size in bytes. `None` behaves as for
    /// `recv_buffer_size`.
    pub send_buffer_size: Option<usize>,
    /// Multicast TTL (IPv4) or hop limit (IPv6) for outgoing multicast.
    /// `None` keeps the system default.
    pub multicast_ttl: Option<u32>,
    /// Whether multicast sends loop back to the local host. `None` keeps
    /// the system default.
    pub multicast_loop: Option<bool>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            reuse_port: true,
            disallow_mixed_ip_families: true,
            recv_buffer_size: None,
            send_buffer_size: None,
            multicast_ttl: None,
            multicast_loop: None,
        }
    }
}
