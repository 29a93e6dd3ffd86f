//! Transfer statistics.

use std::fmt;

/// Monotonic byte counters accumulated by the select task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Total bytes harvested by ready readers.
    pub received: u64,
    /// Total bytes flushed by ready writers.
    pub sent: u64,
}

impl TransferStats {
    /// Resets both counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MB: f64 = (1u64 << 20) as f64;
        write!(
            f,
            "sent: {:8.1} MB, recv: {:8.1} MB",
            self.sent as f64 / MB,
            self.received as f64 / MB
        )
    }
}
