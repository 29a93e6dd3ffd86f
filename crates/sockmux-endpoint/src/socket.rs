//! Socket creation and configuration.

use std::{
    io,
    mem::MaybeUninit,
    net::SocketAddr,
    sync::Arc,
};

use socket2::{Domain, SockAddr, Socket, Type};
use sockmux_core::{
    config::SocketConfig,
    error::{self, ErrorKind, Result},
    selectable::Descriptor,
};
use tracing::warn;

use crate::{
    buffer,
    netif::{InterfaceResolver, SystemInterfaces},
};

/// Address family of a socket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl AddressFamily {
    /// Returns the family a socket must have to bind or reach `addr`.
    pub fn of(addr: &SocketAddr) -> AddressFamily {
        if addr.is_ipv4() {
            AddressFamily::Ipv4
        } else {
            AddressFamily::Ipv6
        }
    }
}

impl From<AddressFamily> for Domain {
    fn from(family: AddressFamily) -> Self {
        match family {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        }
    }
}

/// Kind of socket owned by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Stream socket (TCP)
    Stream,
    /// Datagram socket (UDP)
    Datagram,
}

impl From<SocketKind> for Type {
    fn from(kind: SocketKind) -> Self {
        match kind {
            SocketKind::Stream => Type::STREAM,
            SocketKind::Datagram => Type::DGRAM,
        }
    }
}

/// Owns and configures one raw socket for its whole lifetime.
///
/// The descriptor is configured exactly once, at creation, before the
/// endpoint can enter any readiness set. The endpoint is closed when its
/// owner drops it; the reactor never closes descriptors.
pub struct SocketEndpoint {
    socket: Socket,
    family: AddressFamily,
    kind: SocketKind,
    config: SocketConfig,
    resolver: Arc<dyn InterfaceResolver>,
}

impl std::fmt::Debug for SocketEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketEndpoint")
            .field("family", &self.family)
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish()
    }
}

fn best_effort(what: &str, result: io::Result<()>) {
    if let Err(err) = result {
        warn!("socket option '{}' not applied: {}", what, err);
    }
}

impl SocketEndpoint {
    /// Allocates a socket of the given family and kind and configures it.
    ///
    /// Switching the descriptor to non-blocking mode must succeed; the
    /// remaining configuration steps are independent and best-effort.
    pub fn create(
        family: AddressFamily,
        kind: SocketKind,
        config: &SocketConfig,
    ) -> Result<SocketEndpoint> {
        let socket =
            Socket::new(family.into(), kind.into(), None).map_err(ErrorKind::SocketCreation)?;
        let endpoint = SocketEndpoint {
            socket,
            family,
            kind,
            config: config.clone(),
            resolver: Arc::new(SystemInterfaces),
        };
        endpoint.configure()?;
        Ok(endpoint)
    }

    /// Wraps an already-connected or accepted socket, applying the same
    /// one-time configuration as `create`.
    pub fn from_socket(
        socket: Socket,
        family: AddressFamily,
        kind: SocketKind,
        config: &SocketConfig,
    ) -> Result<SocketEndpoint> {
        let endpoint = SocketEndpoint {
            socket,
            family,
            kind,
            config: config.clone(),
            resolver: Arc::new(SystemInterfaces),
        };
        endpoint.configure()?;
        Ok(endpoint)
    }

    fn configure(&self) -> Result<()> {
        // A blocking descriptor would stall the whole reactor turn.
        self.socket
            .set_nonblocking(true)
            .map_err(ErrorKind::SocketCreation)?;

        best_effort("reuse address", self.socket.set_reuse_address(true));
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        if self.config.reuse_port {
            best_effort("reuse port", self.socket.set_reuse_port(true));
        }

        if self.family == AddressFamily::Ipv6 && self.config.disallow_mixed_ip_families {
            best_effort("v6 only", self.socket.set_only_v6(true));
        }

        #[cfg(unix)]
        best_effort("close-on-exec", self.socket.set_cloexec(true));

        Ok(())
    }

    /// Applies the configured buffer sizes; sizes left unconfigured use
    /// the adaptively discovered process-wide maximum.
    pub fn apply_buffer_config(&self) {
        let (recv, send) = match (self.config.recv_buffer_size, self.config.send_buffer_size) {
            (Some(recv), Some(send)) => (recv, send),
            (recv, send) => {
                let discovered = buffer::shared_max_buffer_size(&self.socket);
                (recv.unwrap_or(discovered), send.unwrap_or(discovered))
            }
        };
        best_effort("receive buffer size", self.socket.set_recv_buffer_size(recv));
        best_effort("send buffer size", self.socket.set_send_buffer_size(send));
    }

    /// Applies the configured multicast TTL and loop options, if any.
    pub fn apply_multicast_config(&self) -> Result<()> {
        if let Some(ttl) = self.config.multicast_ttl {
            self.set_multicast_ttl(ttl)?;
        }
        if let Some(loop_enabled) = self.config.multicast_loop {
            self.set_multicast_loop(loop_enabled)?;
        }
        Ok(())
    }

    /// Replaces the interface resolver used for multicast auto-selection.
    pub fn set_interface_resolver(&mut self, resolver: Arc<dyn InterfaceResolver>) {
        self.resolver = resolver;
    }

    pub(crate) fn resolver(&self) -> &dyn InterfaceResolver {
        &*self.resolver
    }

    /// Binds the socket to a local address.
    pub fn bind(&self, addr: SocketAddr) -> Result<()> {
        self.socket
            .bind(&SockAddr::from(addr))
            .map_err(ErrorKind::IOError)
    }

    /// Starts a non-blocking connect. A connect still in progress is not
    /// an error; completion is signaled by writability.
    pub fn connect(&self, addr: SocketAddr) -> Result<()> {
        match self.socket.connect(&SockAddr::from(addr)) {
            Ok(()) => Ok(()),
            Err(err) if connect_in_progress(&err) => Ok(()),
            Err(err) => Err(ErrorKind::IOError(err)),
        }
    }

    /// Returns the locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        let addr = self.socket.local_addr().map_err(ErrorKind::IOError)?;
        addr.as_socket().ok_or(ErrorKind::FamilyMismatch)
    }

    /// Returns the native descriptor.
    #[cfg(unix)]
    pub fn descriptor(&self) -> Descriptor {
        use std::os::unix::io::AsRawFd;
        self.socket.as_raw_fd()
    }

    /// Returns the native descriptor.
    #[cfg(windows)]
    pub fn descriptor(&self) -> Descriptor {
        use std::os::windows::io::AsRawSocket;
        self.socket.as_raw_socket()
    }

    /// Receives one datagram into `buf`.
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let (n, addr) = self.socket.recv_from(uninit_window(buf))?;
        let addr = addr
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "non-inet peer address"))?;
        Ok((n, addr))
    }

    /// Sends one datagram to `addr`.
    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, &SockAddr::from(addr))
    }

    /// Reads from a connected socket into `buf`.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(uninit_window(buf))
    }

    /// Writes to a connected socket.
    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    /// Delegates to the error classifier; returns `Err` only when the
    /// error is fatal, consuming transient errors.
    pub fn reraise_socket_error(&self, err: io::Error) -> std::result::Result<(), io::Error> {
        error::reraise_socket_error(err)
    }

    /// Returns the underlying socket for option access.
    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    /// Returns the endpoint's address family.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Returns the endpoint's socket kind.
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Returns the configuration the endpoint was created with.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }
}

/// Reinterprets an initialized buffer as the uninit window socket2 wants.
/// Sound because `MaybeUninit<u8>` has the same layout as `u8` and the
/// callee only ever writes into it.
fn uninit_window(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    unsafe { std::slice::from_raw_parts_mut(buf.as_mut_ptr().cast(), buf.len()) }
}

#[cfg(unix)]
fn connect_in_progress(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EINPROGRESS)
}

#[cfg(windows)]
fn connect_in_progress(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}
