//! Events emitted by endpoints during dispatch.

use std::net::SocketAddr;

/// One received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sender of the datagram.
    pub from: SocketAddr,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

/// Events delivered over an endpoint's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A datagram arrived on a datagram endpoint.
    Datagram(Datagram),
    /// Bytes arrived on a connected stream endpoint.
    Stream {
        /// The remote peer.
        from: SocketAddr,
        /// Received bytes.
        payload: Vec<u8>,
    },
    /// A stream peer closed its end of the connection.
    Closed(SocketAddr),
    /// Bytes arrived on a raw-input endpoint.
    Input(Vec<u8>),
}
