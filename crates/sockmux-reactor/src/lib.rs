#![warn(missing_docs)]

//! sockmux-reactor: the select loop.
//!
//! `SelectTask` owns a set of registered `Selectable`s and drives one
//! bounded reactor turn at a time: partition the set into read and write
//! candidates, hand the candidate descriptors to the platform multiplex
//! primitive with a bounded timeout, dispatch the endpoints reported
//! ready, and account the transferred bytes. The task is one cooperative
//! step of an external run loop and never blocks beyond the supplied
//! timeout.
//!
//! Everything is single-threaded: the readiness set, the statistics, and
//! the housekeeping timer are touched only by the scheduling thread.

/// The platform readiness primitive behind one trait.
pub mod multiplex;
/// The identity-keyed set of registered selectables.
pub mod select_set;
/// Transfer statistics.
pub mod stats;
/// The select task.
pub mod task;
/// Clock abstraction.
pub mod time;
/// The housekeeping countdown timer.
pub mod timer;

pub use multiplex::{Multiplexer, ReadySets};
#[cfg(unix)]
pub use multiplex::PollMultiplexer;
pub use select_set::{SelectSet, SelectableId, SelectableRef};
pub use stats::TransferStats;
pub use task::{ScheduledTask, SelectTask};
pub use time::{Clock, SystemClock};
pub use timer::CountdownTimer;
