//! Raw-input endpoint for stdin and pipes.

use crossbeam_channel::{unbounded, Receiver, Sender};
use sockmux_core::{
    error::{ErrorKind, Result},
    selectable::{Descriptor, Selectable},
};

use crate::event_types::SocketEvent;

const RECV_CHUNK: usize = 4 * 1024;

/// Watches an arbitrary readable descriptor through the select loop.
///
/// The endpoint borrows the descriptor and never closes it, so wrapping
/// stdin is safe. Read bytes are delivered as `SocketEvent::Input`; end of
/// input marks the endpoint not-pollable without removing it from the set.
pub struct InputEndpoint {
    fd: Descriptor,
    events: Sender<SocketEvent>,
    recv_buf: Vec<u8>,
    eof: bool,
}

impl std::fmt::Debug for InputEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputEndpoint")
            .field("fd", &self.fd)
            .field("eof", &self.eof)
            .finish()
    }
}

impl InputEndpoint {
    /// Wraps a readable descriptor, returning the endpoint with the
    /// receiving side of its event channel.
    pub fn new(fd: Descriptor) -> (InputEndpoint, Receiver<SocketEvent>) {
        let (sender, receiver) = unbounded();
        (Self::with_events(fd, sender), receiver)
    }

    /// Wraps a readable descriptor, delivering into an existing channel.
    pub fn with_events(fd: Descriptor, events: Sender<SocketEvent>) -> InputEndpoint {
        InputEndpoint {
            fd,
            events,
            recv_buf: vec![0u8; RECV_CHUNK],
            eof: false,
        }
    }

    /// Watches standard input.
    pub fn stdin() -> (InputEndpoint, Receiver<SocketEvent>) {
        Self::new(libc::STDIN_FILENO)
    }

    /// Whether end of input has been reached.
    pub fn at_eof(&self) -> bool {
        self.eof
    }
}

impl Selectable for InputEndpoint {
    fn descriptor(&self) -> Option<Descriptor> {
        (!self.eof).then_some(self.fd)
    }

    fn needs_read(&mut self) -> bool {
        !self.eof
    }

    fn perform_read(&mut self) -> Result<usize> {
        let n = unsafe {
            libc::read(
                self.fd,
                self.recv_buf.as_mut_ptr().cast(),
                self.recv_buf.len(),
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            return match sockmux_core::error::reraise_socket_error(err) {
                Err(fatal) => Err(ErrorKind::FatalSocket(fatal)),
                Ok(()) => Ok(0),
            };
        }
        if n == 0 {
            self.eof = true;
            return Ok(0);
        }
        let n = n as usize;
        self.events
            .send(SocketEvent::Input(self.recv_buf[..n].to_vec()))
            .expect("Receiver must exist");
        Ok(n)
    }

    fn needs_write(&mut self) -> bool {
        false
    }

    fn perform_write(&mut self) -> Result<usize> {
        Ok(0)
    }
}
