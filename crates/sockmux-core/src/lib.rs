#![warn(missing_docs)]

//! sockmux-core: foundational contracts shared across all layers.
//!
//! This crate provides the minimal set of types the endpoint and reactor
//! crates build on:
//! - Error types and the fatal/non-fatal socket error classification
//! - The `Selectable` contract implemented by every pollable endpoint
//! - Socket configuration options
//!
//! Socket ownership lives in `sockmux-endpoint`; the polling loop lives in
//! `sockmux-reactor`.

/// Shared constants for buffer sizing and housekeeping.
pub mod constants {
    use std::time::Duration;

    /// Lower bound of the adaptive socket buffer search, in bytes.
    pub const BUFFER_SIZE_FLOOR: usize = 0x2000;
    /// Upper bound of the adaptive socket buffer search, in bytes.
    pub const BUFFER_SIZE_CEILING: usize = 0x80000;
    /// First size probed by the adaptive socket buffer search.
    pub const BUFFER_SIZE_INITIAL_PROBE: usize = 0x40000;

    /// Default interval of the select task's housekeeping timer.
    pub const HOUSEKEEPING_INTERVAL_DEFAULT: Duration = Duration::from_millis(100);
}

/// Socket configuration options.
pub mod config;
/// Error types, results, and socket error classification.
pub mod error;
/// The contract implemented by pollable endpoints.
pub mod selectable;

pub use config::SocketConfig;
pub use error::{ErrorKind, Result};
pub use selectable::{Descriptor, Selectable};
