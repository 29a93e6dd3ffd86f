#![warn(missing_docs)]

//! Sockmux: a small public API facade for the workspace.
//!
//! This crate provides a clean, stable surface that re-exports the most
//! commonly used types for driving sockets through one cooperative select
//! loop:
//!
//! - The select task and scheduler contract (`SelectTask`, `ScheduledTask`)
//! - Endpoints and events (`DatagramEndpoint`, `StreamEndpoint`,
//!   `SocketEvent`)
//! - Multicast selectors and socket configuration
//!
//! Example
//! ```no_run
//! use std::{cell::RefCell, rc::Rc, time::Duration};
//! use sockmux::prelude::*;
//!
//! let config = SocketConfig::default();
//! let (mut a, _a_events) =
//!     DatagramEndpoint::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();
//! let (b, b_events) =
//!     DatagramEndpoint::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();
//!
//! a.enqueue(b.local_addr().unwrap(), b"hello".to_vec());
//!
//! let mut task = SelectTask::new();
//! task.add(Rc::new(RefCell::new(a))).unwrap();
//! task.add(Rc::new(RefCell::new(b))).unwrap();
//!
//! // One bounded reactor turn per scheduler round.
//! loop {
//!     task.run_task_with_timeout(Duration::from_millis(10)).unwrap();
//!     if let Ok(SocketEvent::Datagram(datagram)) = b_events.try_recv() {
//!         assert_eq!(datagram.payload, b"hello");
//!         break;
//!     }
//! }
//! ```

// Core contracts
pub use sockmux_core::{
    config::SocketConfig,
    error::{ErrorKind, Result},
    selectable::{Descriptor, Selectable},
};
// Endpoints: sockets and the events they emit
#[cfg(unix)]
pub use sockmux_endpoint::InputEndpoint;
pub use sockmux_endpoint::{
    AddressFamily, Datagram, DatagramEndpoint, InterfaceResolver, InterfaceSpec,
    MulticastSelector, SocketEndpoint, SocketEvent, SocketKind, StreamEndpoint,
    SystemInterfaces,
};
// Reactor: the select task and its collaborators
#[cfg(unix)]
pub use sockmux_reactor::PollMultiplexer;
pub use sockmux_reactor::{
    CountdownTimer, Multiplexer, ScheduledTask, SelectSet, SelectTask, SelectableId,
    SelectableRef, TransferStats,
};
// Address values
pub use sockmux_utilities::{parse_group, parse_ip, resolve_host, IpNet};

/// Convenience prelude with the most commonly used items.
pub mod prelude {
    pub use crate::{
        DatagramEndpoint, ErrorKind, InterfaceSpec, ScheduledTask, Selectable, SelectTask,
        SocketConfig, SocketEvent, StreamEndpoint, TransferStats,
    };
}
