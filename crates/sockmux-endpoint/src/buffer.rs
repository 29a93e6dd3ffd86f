//! Adaptive socket buffer sizing.
//!
//! Finding the largest buffer size the platform accepts is an expensive
//! trial search, so the discovered size is computed once per process and
//! reused by every socket created afterwards.

use std::sync::OnceLock;

use socket2::Socket;
use sockmux_core::constants::{
    BUFFER_SIZE_CEILING, BUFFER_SIZE_FLOOR, BUFFER_SIZE_INITIAL_PROBE,
};
use tracing::debug;

static SHARED_MAX_BUFFER_SIZE: OnceLock<usize> = OnceLock::new();

/// Binary search for the largest size the probe accepts.
///
/// A successful probe becomes the new lower bound, a failed probe the new
/// upper bound; the search bisects until the window collapses to one step.
/// The result is written to `cache` at most once; later calls return the
/// cached value without probing.
pub fn find_max_buffer_size(
    cache: &OnceLock<usize>,
    probe: &mut dyn FnMut(usize) -> bool,
) -> usize {
    *cache.get_or_init(|| {
        let mut lower = BUFFER_SIZE_FLOOR;
        let mut upper = BUFFER_SIZE_CEILING;
        let mut size = BUFFER_SIZE_INITIAL_PROBE;
        while upper > lower + 1 {
            if probe(size) {
                lower = size;
            } else {
                upper = size;
            }
            size = (upper + lower) >> 1;
        }
        debug!("adaptive buffer search settled on {} bytes", size);
        size
    })
}

/// Returns the process-wide maximum buffer size, probing with `socket` if
/// no socket has discovered it yet.
pub fn shared_max_buffer_size(socket: &Socket) -> usize {
    find_max_buffer_size(&SHARED_MAX_BUFFER_SIZE, &mut |size| {
        socket
            .set_recv_buffer_size(size)
            .and_then(|_| socket.set_send_buffer_size(size))
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_probe(limit: usize, count: &mut usize) -> impl FnMut(usize) -> bool + '_ {
        move |size| {
            *count += 1;
            size <= limit
        }
    }

    #[test]
    fn test_search_terminates_within_bounds() {
        let cache = OnceLock::new();
        let mut probes = 0;
        let size = find_max_buffer_size(&cache, &mut counting_probe(0x30000, &mut probes));
        assert!(size >= BUFFER_SIZE_FLOOR);
        assert!(size <= BUFFER_SIZE_CEILING);
        assert!(size <= 0x30000);
        assert!(probes > 0);
    }

    #[test]
    fn test_everything_fails_degrades_to_floor() {
        let cache = OnceLock::new();
        let mut probes = 0;
        let size = find_max_buffer_size(&cache, &mut counting_probe(0, &mut probes));
        assert_eq!(size, BUFFER_SIZE_FLOOR);
    }

    #[test]
    fn test_everything_succeeds_reaches_near_ceiling() {
        let cache = OnceLock::new();
        let mut probes = 0;
        let size = find_max_buffer_size(&cache, &mut counting_probe(usize::MAX, &mut probes));
        assert_eq!(size, BUFFER_SIZE_CEILING - 1);
    }

    #[test]
    fn test_second_search_is_a_cache_hit() {
        let cache = OnceLock::new();
        let mut probes = 0;
        let first = find_max_buffer_size(&cache, &mut counting_probe(0x30000, &mut probes));
        let after_first = probes;
        let second = find_max_buffer_size(&cache, &mut counting_probe(0x30000, &mut probes));
        assert_eq!(first, second);
        assert_eq!(probes, after_first, "cache hit must perform zero probes");
    }
}
