//! Error types and socket error classification.
//!
//! Two concerns live here. `ErrorKind`/`Result` are the crate's own failure
//! taxonomy, wrapping the `io::Error` that caused them. The classification
//! functions decide whether a platform socket error is fatal (abort the
//! operation) or transient (retry on a later turn). Unknown codes classify
//! fatal so an unrecognized failure is never silently swallowed.

use std::{fmt, io};

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Failures surfaced by sockmux operations.
#[derive(Debug)]
pub enum ErrorKind {
    /// Wrapper around a plain I/O failure.
    IOError(io::Error),
    /// The platform refused to create or configure a socket.
    SocketCreation(io::Error),
    /// A selectable failed its trial poll when added to the readiness set.
    FailedVerification(io::Error),
    /// A multicast group operation failed.
    Multicast(io::Error),
    /// A fatal socket error surfaced during a reactor turn.
    FatalSocket(io::Error),
    /// A multicast operation was attempted with a group or interface
    /// selector of the wrong address family.
    FamilyMismatch,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::IOError(e) => write!(f, "I/O error: {}", e),
            ErrorKind::SocketCreation(e) => write!(f, "could not create socket: {}", e),
            ErrorKind::FailedVerification(e) => {
                write!(f, "selectable failed poll verification: {}", e)
            }
            ErrorKind::Multicast(e) => write!(f, "multicast operation failed: {}", e),
            ErrorKind::FatalSocket(e) => write!(f, "fatal socket error: {}", e),
            ErrorKind::FamilyMismatch => {
                write!(f, "address family does not match the socket's family")
            }
        }
    }
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ErrorKind::IOError(e)
            | ErrorKind::SocketCreation(e)
            | ErrorKind::FailedVerification(e)
            | ErrorKind::Multicast(e)
            | ErrorKind::FatalSocket(e) => Some(e),
            ErrorKind::FamilyMismatch => None,
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::IOError(err)
    }
}

/// Classifies a raw platform error code. `Some(true)` means fatal,
/// `Some(false)` means transient, `None` means the code is not in the table.
#[cfg(unix)]
fn classify_code(code: i32) -> Option<bool> {
    if code == libc::EAGAIN || code == libc::EWOULDBLOCK || code == libc::EINTR {
        return Some(false);
    }
    if code == libc::EMSGSIZE
        || code == libc::ECONNABORTED
        || code == libc::ECONNREFUSED
        || code == libc::ECONNRESET
        || code == libc::EADDRNOTAVAIL
        || code == libc::ENETUNREACH
    {
        return Some(true);
    }
    None
}

#[cfg(windows)]
fn classify_code(code: i32) -> Option<bool> {
    // Winsock reports WSA error codes through io::Error::raw_os_error.
    const WSAEINTR: i32 = 10004;
    const WSAEWOULDBLOCK: i32 = 10035;
    const WSAEMSGSIZE: i32 = 10040;
    const WSAEADDRNOTAVAIL: i32 = 10049;
    const WSAENETUNREACH: i32 = 10051;
    const WSAECONNABORTED: i32 = 10053;
    const WSAECONNRESET: i32 = 10054;
    const WSAECONNREFUSED: i32 = 10061;

    match code {
        WSAEINTR | WSAEWOULDBLOCK => Some(false),
        WSAEMSGSIZE | WSAEADDRNOTAVAIL | WSAENETUNREACH | WSAECONNABORTED | WSAECONNRESET
        | WSAECONNREFUSED => Some(true),
        _ => None,
    }
}

/// Returns whether a raw platform socket error code is fatal.
///
/// Codes meaning "retry later" (would-block, interrupted) are transient;
/// codes meaning genuine connection failure are fatal; codes absent from
/// the table default to fatal.
pub fn is_fatal_code(code: i32) -> bool {
    classify_code(code).unwrap_or(true)
}

/// Returns whether an I/O error is fatal for socket purposes.
///
/// Classifies by raw OS code when one is present. Synthesized errors with no
/// OS code fall back to their `io::ErrorKind`: would-block and interrupted
/// are transient, everything else fatal.
pub fn is_fatal(err: &io::Error) -> bool {
    match err.raw_os_error() {
        Some(code) => is_fatal_code(code),
        None => !matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        ),
    }
}

/// Consumes a socket error, returning it only when fatal.
///
/// The caller re-raises the returned error; transient errors vanish here.
pub fn reraise_socket_error(err: io::Error) -> std::result::Result<(), io::Error> {
    if is_fatal(&err) {
        Err(err)
    } else {
        Ok(())
    }
}
