//! Stream (TCP) endpoint.

use std::{io, net::SocketAddr};

use crossbeam_channel::{unbounded, Receiver, Sender};
use sockmux_core::{
    config::SocketConfig,
    error::{ErrorKind, Result},
    selectable::{Descriptor, Selectable},
};
use tracing::error;

use crate::{
    event_types::SocketEvent,
    socket::{AddressFamily, SocketEndpoint, SocketKind},
};

const RECV_CHUNK: usize = 16 * 1024;

/// A connected TCP socket participating in the select loop.
///
/// Received bytes are delivered as `SocketEvent::Stream`; a peer close is
/// delivered once as `SocketEvent::Closed`, after which the endpoint stops
/// asking to be polled for reads. Output queued with `queue_write` is
/// flushed when the reactor reports writability.
pub struct StreamEndpoint {
    socket: SocketEndpoint,
    peer: SocketAddr,
    events: Sender<SocketEvent>,
    write_buf: Vec<u8>,
    recv_buf: Vec<u8>,
    eof: bool,
    closed: bool,
}

impl std::fmt::Debug for StreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEndpoint")
            .field("peer", &self.peer)
            .field("pending_bytes", &self.write_buf.len())
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .finish()
    }
}

impl StreamEndpoint {
    /// Starts a non-blocking connect to `peer` and returns the endpoint
    /// with the receiving side of its event channel. The connect completes
    /// in the background; queued writes flush once the socket is writable.
    pub fn connect(
        peer: SocketAddr,
        config: &SocketConfig,
    ) -> Result<(StreamEndpoint, Receiver<SocketEvent>)> {
        let (sender, receiver) = unbounded();
        Ok((Self::connect_with_events(peer, config, sender)?, receiver))
    }

    /// As `connect`, delivering events into an existing channel.
    pub fn connect_with_events(
        peer: SocketAddr,
        config: &SocketConfig,
        events: Sender<SocketEvent>,
    ) -> Result<StreamEndpoint> {
        let socket = SocketEndpoint::create(AddressFamily::of(&peer), SocketKind::Stream, config)?;
        socket.apply_buffer_config();
        socket.connect(peer)?;
        Ok(Self::with_socket(socket, peer, events))
    }

    /// Wraps an accepted connection.
    pub fn from_accepted(
        socket: SocketEndpoint,
        peer: SocketAddr,
        events: Sender<SocketEvent>,
    ) -> StreamEndpoint {
        Self::with_socket(socket, peer, events)
    }

    fn with_socket(
        socket: SocketEndpoint,
        peer: SocketAddr,
        events: Sender<SocketEvent>,
    ) -> StreamEndpoint {
        StreamEndpoint {
            socket,
            peer,
            events,
            write_buf: Vec::new(),
            recv_buf: vec![0u8; RECV_CHUNK],
            eof: false,
            closed: false,
        }
    }

    /// The remote peer this endpoint is connected to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queues bytes for the next writable turn.
    pub fn queue_write(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    /// Bytes waiting to be flushed.
    pub fn pending_bytes(&self) -> usize {
        self.write_buf.len()
    }

    /// Returns the owned socket endpoint.
    pub fn socket(&self) -> &SocketEndpoint {
        &self.socket
    }

    /// Marks the endpoint not-pollable. The descriptor itself stays open
    /// until the endpoint is dropped.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Selectable for StreamEndpoint {
    fn descriptor(&self) -> Option<Descriptor> {
        (!self.closed).then(|| self.socket.descriptor())
    }

    fn needs_read(&mut self) -> bool {
        !self.closed && !self.eof
    }

    fn perform_read(&mut self) -> Result<usize> {
        let mut harvested = 0usize;
        loop {
            match self.socket.recv(&mut self.recv_buf) {
                Ok(0) => {
                    self.eof = true;
                    self.events
                        .send(SocketEvent::Closed(self.peer))
                        .expect("Receiver must exist");
                    break;
                }
                Ok(n) => {
                    harvested += n;
                    self.events
                        .send(SocketEvent::Stream {
                            from: self.peer,
                            payload: self.recv_buf[..n].to_vec(),
                        })
                        .expect("Receiver must exist");
                }
                Err(err) => {
                    if let Err(fatal) = self.socket.reraise_socket_error(err) {
                        return Err(ErrorKind::FatalSocket(fatal));
                    }
                    break;
                }
            }
        }
        Ok(harvested)
    }

    fn needs_write(&mut self) -> bool {
        !self.closed && !self.write_buf.is_empty()
    }

    fn perform_write(&mut self) -> Result<usize> {
        let mut flushed = 0usize;
        while !self.write_buf.is_empty() {
            match self.socket.send(&self.write_buf) {
                Ok(0) => break,
                Ok(n) => {
                    flushed += n;
                    self.write_buf.drain(..n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => match self.socket.reraise_socket_error(err) {
                    Err(fatal) => {
                        error!("error writing to stream peer {}: {}", self.peer, fatal);
                        return Err(ErrorKind::FatalSocket(fatal));
                    }
                    Ok(()) => break,
                },
            }
        }
        Ok(flushed)
    }
}
