//! The contract implemented by every pollable endpoint.

use crate::error::Result;

/// Native descriptor handed to the platform multiplex primitive.
#[cfg(unix)]
pub type Descriptor = std::os::unix::io::RawFd;

/// Native descriptor handed to the platform multiplex primitive.
#[cfg(windows)]
pub type Descriptor = std::os::windows::io::RawSocket;

/// A pollable endpoint participating in the select loop.
///
/// Implementors exclusively own their descriptor. The readiness predicates
/// are re-evaluated freshly every turn and may have idempotent side effects;
/// the perform operations are invoked at most once per ready event per turn,
/// must not block, and return the number of bytes processed. Transient
/// socket errors are handled internally; only fatal ones propagate.
pub trait Selectable {
    /// Returns the native descriptor, or `None` when the endpoint is not
    /// currently pollable. `None` excludes the endpoint from this turn
    /// without removing it from the readiness set.
    fn descriptor(&self) -> Option<Descriptor>;

    /// Whether the endpoint wants to be polled for readability this turn.
    fn needs_read(&mut self) -> bool {
        true
    }

    /// Harvests readable data. Called only when the multiplexer reported
    /// the descriptor read-ready. Runs inside the select task's timeslice
    /// and should not be used for intensive processing.
    fn perform_read(&mut self) -> Result<usize>;

    /// Whether the endpoint has pending output. Unlike `needs_read`, this
    /// reflects actual queued data and is expected to usually be false.
    fn needs_write(&mut self) -> bool;

    /// Flushes pending output. Called only when the multiplexer reported
    /// the descriptor write-ready; must not block.
    fn perform_write(&mut self) -> Result<usize>;
}
