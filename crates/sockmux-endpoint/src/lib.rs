#![warn(missing_docs)]

//! sockmux-endpoint: socket ownership and configuration.
//!
//! A `SocketEndpoint` owns exactly one descriptor for its lifetime and
//! configures it once at creation (non-blocking, address reuse, optional
//! v6-only, close-on-exec). On top of it sit the concrete `Selectable`
//! endpoints the reactor polls:
//!
//! - `DatagramEndpoint` for UDP, unicast or multicast
//! - `StreamEndpoint` for connected TCP
//! - `InputEndpoint` for raw readable descriptors such as stdin (Unix)
//!
//! Harvested payloads are delivered as `SocketEvent`s over a crossbeam
//! channel; pending output is flushed when the reactor reports writability.

/// Adaptive socket buffer sizing with a process-wide cache.
pub mod buffer;
/// Datagram (UDP) endpoint.
pub mod datagram;
/// Events emitted by endpoints.
pub mod event_types;
/// Raw-input endpoint for stdin and pipes.
#[cfg(unix)]
pub mod input;
/// Multicast group management and interface selectors.
pub mod multicast;
/// Interface name/index resolution contract.
pub mod netif;
/// Socket creation and configuration.
pub mod socket;
/// Stream (TCP) endpoint.
pub mod stream;

pub use datagram::DatagramEndpoint;
pub use event_types::{Datagram, SocketEvent};
#[cfg(unix)]
pub use input::InputEndpoint;
pub use multicast::{InterfaceSpec, MulticastSelector};
pub use netif::{InterfaceResolver, SystemInterfaces};
pub use socket::{AddressFamily, SocketEndpoint, SocketKind};
pub use stream::StreamEndpoint;
