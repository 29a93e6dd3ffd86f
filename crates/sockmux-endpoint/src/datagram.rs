//! Datagram (UDP) endpoint.

use std::{
    collections::VecDeque,
    io,
    net::{IpAddr, SocketAddr},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use sockmux_core::{
    config::SocketConfig,
    error::{ErrorKind, Result},
    selectable::{Descriptor, Selectable},
};
use tracing::error;

use crate::{
    event_types::{Datagram, SocketEvent},
    multicast::{InterfaceSpec, MulticastSelector},
    socket::{AddressFamily, SocketEndpoint, SocketKind},
};

// Largest payload a UDP datagram can carry.
const RECV_CHUNK: usize = 64 * 1024;

/// A bound UDP socket participating in the select loop.
///
/// Received datagrams are delivered as `SocketEvent::Datagram` over the
/// event channel; outgoing datagrams are queued with `enqueue` and flushed
/// when the reactor reports the socket writable.
pub struct DatagramEndpoint {
    socket: SocketEndpoint,
    events: Sender<SocketEvent>,
    outgoing: VecDeque<(SocketAddr, Vec<u8>)>,
    recv_buf: Vec<u8>,
    closed: bool,
}

impl std::fmt::Debug for DatagramEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramEndpoint")
            .field("socket", &self.socket)
            .field("pending_sends", &self.outgoing.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl DatagramEndpoint {
    /// Binds a datagram endpoint and returns it with the receiving side of
    /// its event channel.
    pub fn bind(
        addr: SocketAddr,
        config: &SocketConfig,
    ) -> Result<(DatagramEndpoint, Receiver<SocketEvent>)> {
        let (sender, receiver) = unbounded();
        Ok((Self::bind_with_events(addr, config, sender)?, receiver))
    }

    /// Binds a datagram endpoint that delivers events into an existing
    /// channel, letting several endpoints share one consumer.
    pub fn bind_with_events(
        addr: SocketAddr,
        config: &SocketConfig,
        events: Sender<SocketEvent>,
    ) -> Result<DatagramEndpoint> {
        let socket =
            SocketEndpoint::create(AddressFamily::of(&addr), SocketKind::Datagram, config)?;
        socket.apply_buffer_config();
        socket.apply_multicast_config()?;
        socket.bind(addr)?;
        Ok(DatagramEndpoint {
            socket,
            events,
            outgoing: VecDeque::new(),
            recv_buf: vec![0u8; RECV_CHUNK],
            closed: false,
        })
    }

    /// Returns the locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Queues a datagram for the next writable turn.
    pub fn enqueue(&mut self, to: SocketAddr, payload: Vec<u8>) {
        self.outgoing.push_back((to, payload));
    }

    /// Number of datagrams waiting to be sent.
    pub fn pending_sends(&self) -> usize {
        self.outgoing.len()
    }

    /// Joins a multicast group on this endpoint's socket.
    pub fn join_group(
        &self,
        group: &IpAddr,
        iface: Option<&InterfaceSpec>,
    ) -> Result<MulticastSelector> {
        self.socket.join_group(group, iface)
    }

    /// Leaves a multicast group joined with the same interface argument.
    pub fn leave_group(
        &self,
        group: &IpAddr,
        iface: Option<&InterfaceSpec>,
    ) -> Result<MulticastSelector> {
        self.socket.leave_group(group, iface)
    }

    /// Returns the owned socket endpoint.
    pub fn socket(&self) -> &SocketEndpoint {
        &self.socket
    }

    /// Returns the owned socket endpoint mutably.
    pub fn socket_mut(&mut self) -> &mut SocketEndpoint {
        &mut self.socket
    }

    /// Marks the endpoint not-pollable. The descriptor itself stays open
    /// until the endpoint is dropped.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Selectable for DatagramEndpoint {
    fn descriptor(&self) -> Option<Descriptor> {
        (!self.closed).then(|| self.socket.descriptor())
    }

    fn needs_read(&mut self) -> bool {
        !self.closed
    }

    fn perform_read(&mut self) -> Result<usize> {
        let mut harvested = 0usize;
        loop {
            match self.socket.recv_from(&mut self.recv_buf) {
                Ok((n, from)) => {
                    harvested += n;
                    let payload = self.recv_buf[..n].to_vec();
                    self.events
                        .send(SocketEvent::Datagram(Datagram { from, payload }))
                        .expect("Receiver must exist");
                }
                Err(err) => {
                    if let Err(fatal) = self.socket.reraise_socket_error(err) {
                        return Err(ErrorKind::FatalSocket(fatal));
                    }
                    // Transient: nothing more to harvest this turn.
                    break;
                }
            }
        }
        Ok(harvested)
    }

    fn needs_write(&mut self) -> bool {
        !self.closed && !self.outgoing.is_empty()
    }

    fn perform_write(&mut self) -> Result<usize> {
        let mut flushed = 0usize;
        while let Some((to, payload)) = self.outgoing.front() {
            match self.socket.send_to(payload, *to) {
                Ok(n) => {
                    flushed += n;
                    self.outgoing.pop_front();
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    let to = *to;
                    match self.socket.reraise_socket_error(err) {
                        Err(fatal) => {
                            error!("error sending datagram (to {}): {}", to, fatal);
                            // Drop the doomed datagram so a kept endpoint
                            // does not retry it forever.
                            self.outgoing.pop_front();
                            return Err(ErrorKind::FatalSocket(fatal));
                        }
                        Ok(()) => break,
                    }
                }
            }
        }
        Ok(flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bound_pair() -> (
        DatagramEndpoint,
        Receiver<SocketEvent>,
        DatagramEndpoint,
        Receiver<SocketEvent>,
    ) {
        let config = SocketConfig::default();
        let (a, a_rx) = DatagramEndpoint::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let (b, b_rx) = DatagramEndpoint::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        (a, a_rx, b, b_rx)
    }

    #[test]
    fn test_needs_write_reflects_pending_output() {
        let (mut a, _a_rx, b, _b_rx) = bound_pair();
        assert!(!a.needs_write());
        a.enqueue(b.local_addr().unwrap(), b"hello".to_vec());
        assert!(a.needs_write());
        assert_eq!(a.pending_sends(), 1);
    }

    #[test]
    fn test_loopback_write_then_read_delivers_event() {
        let (mut a, _a_rx, mut b, b_rx) = bound_pair();
        let b_addr = b.local_addr().unwrap();
        a.enqueue(b_addr, b"ping".to_vec());

        let flushed = a.perform_write().unwrap();
        assert_eq!(flushed, 4);
        assert!(!a.needs_write());

        // Loopback delivery is fast but not instant under load.
        let mut harvested = 0;
        for _ in 0..100 {
            harvested = b.perform_read().unwrap();
            if harvested > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(harvested, 4);

        match b_rx.try_recv().unwrap() {
            SocketEvent::Datagram(datagram) => {
                assert_eq!(datagram.payload, b"ping");
                assert_eq!(datagram.from, a.local_addr().unwrap());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_read_on_quiet_socket_harvests_nothing() {
        let (_a, _a_rx, mut b, b_rx) = bound_pair();
        assert_eq!(b.perform_read().unwrap(), 0);
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_endpoint_reports_no_descriptor() {
        let (mut a, _a_rx, _b, _b_rx) = bound_pair();
        assert!(a.descriptor().is_some());
        a.close();
        assert!(a.descriptor().is_none());
        assert!(!a.needs_read());
    }
}
