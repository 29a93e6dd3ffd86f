//! The platform readiness primitive behind one trait.
//!
//! The reactor's dispatch logic never branches on platform; descriptor
//! semantics live entirely behind `Multiplexer`. The production
//! implementation is poll(2)-backed; tests install scripted
//! implementations to exercise the task's error paths.

use std::{io, time::Duration};

use sockmux_core::selectable::Descriptor;

/// Descriptors a poll call reported ready.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadySets {
    /// Descriptors ready for reading.
    pub readable: Vec<Descriptor>,
    /// Descriptors ready for writing.
    pub writable: Vec<Descriptor>,
}

/// Platform readiness primitive: bounded multi-descriptor wait plus a
/// zero-timeout single-descriptor pollability probe.
pub trait Multiplexer {
    /// Waits at most `timeout` for any of the given descriptors to become
    /// ready. A zero timeout is a non-blocking poll; there is no
    /// infinite-wait mode.
    fn poll(
        &mut self,
        read_fds: &[Descriptor],
        write_fds: &[Descriptor],
        timeout: Duration,
    ) -> io::Result<ReadySets>;

    /// Verifies that one descriptor can be polled at all. Used when a
    /// selectable is added and when the set is re-verified after a
    /// descriptor-invalid failure.
    fn probe(&mut self, fd: Descriptor) -> io::Result<()>;
}

/// Whether an error from the multiplex primitive means the descriptor set
/// itself was unusable (a stale or closed descriptor among the members),
/// as opposed to an ordinary socket-level failure.
#[cfg(unix)]
pub fn is_descriptor_invalid(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::EBADF || code == libc::EINVAL || code == libc::ENOTSOCK
    )
}

/// Whether an error from the multiplex primitive means the descriptor set
/// itself was unusable.
#[cfg(windows)]
pub fn is_descriptor_invalid(err: &io::Error) -> bool {
    const WSAEBADF: i32 = 10009;
    const WSAEINVAL: i32 = 10022;
    const WSAENOTSOCK: i32 = 10038;
    matches!(
        err.raw_os_error(),
        Some(WSAEBADF | WSAEINVAL | WSAENOTSOCK)
    )
}

/// poll(2)-backed multiplexer.
// TODO: a WSAPoll-backed implementation would extend the reactor to
// Windows; only this module needs it.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct PollMultiplexer;

#[cfg(unix)]
impl PollMultiplexer {
    fn timeout_millis(timeout: Duration) -> libc::c_int {
        if timeout.is_zero() {
            return 0;
        }
        // Round sub-millisecond timeouts up so a positive timeout never
        // degrades into a non-blocking poll.
        let millis = timeout.as_millis().max(1);
        millis.min(libc::c_int::MAX as u128) as libc::c_int
    }
}

#[cfg(unix)]
impl Multiplexer for PollMultiplexer {
    fn poll(
        &mut self,
        read_fds: &[Descriptor],
        write_fds: &[Descriptor],
        timeout: Duration,
    ) -> io::Result<ReadySets> {
        let mut fds: Vec<libc::pollfd> = Vec::with_capacity(read_fds.len() + write_fds.len());
        for &fd in read_fds {
            fds.push(libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            });
        }
        for &fd in write_fds {
            if let Some(entry) = fds.iter_mut().find(|entry| entry.fd == fd) {
                entry.events |= libc::POLLOUT;
            } else {
                fds.push(libc::pollfd {
                    fd,
                    events: libc::POLLOUT,
                    revents: 0,
                });
            }
        }

        let rc = unsafe {
            libc::poll(
                fds.as_mut_ptr(),
                fds.len() as libc::nfds_t,
                Self::timeout_millis(timeout),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut ready = ReadySets::default();
        let mut stale = false;
        for entry in &fds {
            if entry.revents & libc::POLLNVAL != 0 {
                stale = true;
                continue;
            }
            // Errors and hangups surface through the read/write path so
            // the owning endpoint observes them on its next operation.
            if entry.events & libc::POLLIN != 0
                && entry.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0
            {
                ready.readable.push(entry.fd);
            }
            if entry.events & libc::POLLOUT != 0
                && entry.revents & (libc::POLLOUT | libc::POLLERR) != 0
            {
                ready.writable.push(entry.fd);
            }
        }
        if stale {
            // Normalize a stale member to the same error class select(2)
            // raises, so recovery is backend-independent.
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        Ok(ready)
    }

    fn probe(&mut self, fd: Descriptor) -> io::Result<()> {
        let mut entry = libc::pollfd {
            fd,
            events: libc::POLLIN | libc::POLLOUT,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut entry, 1, 0) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if entry.revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn pipe() -> (Descriptor, Descriptor) {
        let mut fds = [0 as libc::c_int; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn test_readable_pipe_reports_ready() {
        let (read_fd, write_fd) = pipe();
        assert_eq!(unsafe { libc::write(write_fd, b"x".as_ptr().cast(), 1) }, 1);

        let mut mux = PollMultiplexer;
        let ready = mux
            .poll(&[read_fd], &[write_fd], Duration::from_millis(100))
            .unwrap();
        assert!(ready.readable.contains(&read_fd));
        assert!(ready.writable.contains(&write_fd));

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }

    #[test]
    fn test_zero_timeout_poll_does_not_block() {
        let (read_fd, write_fd) = pipe();
        let mut mux = PollMultiplexer;
        let started = std::time::Instant::now();
        let ready = mux.poll(&[read_fd], &[], Duration::ZERO).unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(ready.readable.is_empty());
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }

    #[test]
    fn test_stale_descriptor_raises_descriptor_invalid() {
        let (read_fd, write_fd) = pipe();
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }

        let mut mux = PollMultiplexer;
        let err = mux
            .poll(&[read_fd], &[], Duration::ZERO)
            .expect_err("closed descriptor must fail the poll");
        assert!(is_descriptor_invalid(&err));
    }

    #[test]
    fn test_probe_accepts_live_and_rejects_stale() {
        let (read_fd, write_fd) = pipe();
        let mut mux = PollMultiplexer;
        assert!(mux.probe(read_fd).is_ok());

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
        let err = mux.probe(read_fd).unwrap_err();
        assert!(is_descriptor_invalid(&err));
    }

    #[test]
    fn test_descriptor_invalid_classification() {
        assert!(is_descriptor_invalid(&io::Error::from_raw_os_error(
            libc::EBADF
        )));
        assert!(is_descriptor_invalid(&io::Error::from_raw_os_error(
            libc::EINVAL
        )));
        assert!(!is_descriptor_invalid(&io::Error::from_raw_os_error(
            libc::ECONNRESET
        )));
        assert!(!is_descriptor_invalid(&io::Error::new(
            io::ErrorKind::Other,
            "no raw code"
        )));
    }
}
