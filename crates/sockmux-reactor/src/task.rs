//! The select task: one bounded reactor turn at a time.

use std::{collections::HashSet, rc::Rc, thread, time::Duration};

use sockmux_core::{
    constants::HOUSEKEEPING_INTERVAL_DEFAULT,
    error::{self, ErrorKind, Result},
    selectable::Descriptor,
};
use tracing::debug;

use crate::{
    multiplex::{is_descriptor_invalid, Multiplexer},
    select_set::{SelectSet, SelectableId, SelectableRef},
    stats::TransferStats,
    timer::CountdownTimer,
};

/// Contract the outer cooperative scheduler drives each round.
///
/// The scheduler treats a propagated error as the task's failure for that
/// round; the task itself stays usable.
pub trait ScheduledTask {
    /// Whether the task wants a timeslice. With `include_idle` the task
    /// always accepts one; without it, only when it has productive work.
    fn is_task_ready(&self, include_idle: bool) -> bool;

    /// Runs one non-blocking step.
    fn run_task(&mut self) -> Result<()>;

    /// Runs one step bounded by `timeout`.
    fn run_task_with_timeout(&mut self, timeout: Duration) -> Result<()>;
}

/// Drives registered selectables through the platform multiplex primitive.
///
/// The task is Idle while its readiness set is empty and Polling
/// otherwise; the transition is driven purely by add and remove. It never
/// closes descriptors: endpoints that stop being usable are evicted from
/// the set and left to their owners.
pub struct SelectTask {
    selectables: SelectSet,
    mux: Box<dyn Multiplexer>,
    timer: CountdownTimer,
    stats: TransferStats,
}

impl std::fmt::Debug for SelectTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectTask")
            .field("selectables", &self.selectables)
            .field("timer", &self.timer)
            .field("stats", &self.stats)
            .finish()
    }
}

impl SelectTask {
    /// Creates a task over the platform poll primitive.
    #[cfg(unix)]
    pub fn new() -> SelectTask {
        Self::with_multiplexer(Box::new(crate::multiplex::PollMultiplexer))
    }

    /// Creates a task over a custom multiplexer, with the default
    /// housekeeping interval.
    pub fn with_multiplexer(mux: Box<dyn Multiplexer>) -> SelectTask {
        Self::with_parts(mux, CountdownTimer::new(HOUSEKEEPING_INTERVAL_DEFAULT))
    }

    /// Creates a task from explicit parts, for tests and embedders that
    /// tune the housekeeping interval.
    pub fn with_parts(mux: Box<dyn Multiplexer>, timer: CountdownTimer) -> SelectTask {
        SelectTask {
            selectables: SelectSet::new(),
            mux,
            timer,
            stats: TransferStats::default(),
        }
    }

    /// Registers a selectable after verifying its descriptor can be polled
    /// at all. Verification failure is loud: a doomed descriptor would
    /// otherwise corrupt every future poll of the shared set. Re-adding a
    /// registered selectable is idempotent.
    pub fn add(&mut self, selectable: SelectableRef) -> Result<SelectableId> {
        if let Some(fd) = selectable.borrow().descriptor() {
            self.mux
                .probe(fd)
                .map_err(ErrorKind::FailedVerification)?;
        }
        Ok(self.selectables.insert(selectable))
    }

    /// Discards a selectable. No-op if absent. Safe to call from a
    /// dispatch callback: the running turn keeps its snapshot.
    pub fn remove(&mut self, id: SelectableId) {
        self.selectables.remove(id);
    }

    /// Returns a shared handle to the readiness set, letting callbacks
    /// remove members mid-turn.
    pub fn selectables(&self) -> SelectSet {
        self.selectables.clone()
    }

    /// Number of registered selectables.
    pub fn len(&self) -> usize {
        self.selectables.len()
    }

    /// Whether the task is Idle.
    pub fn is_empty(&self) -> bool {
        self.selectables.is_empty()
    }

    /// Drives one reactor turn bounded by `timeout`.
    pub fn process(&mut self, timeout: Duration) -> Result<()> {
        let snapshot = self.selectables.snapshot();
        if snapshot.is_empty() {
            // Delay manually: platform multiplex implementations are not
            // consistent with an empty descriptor set.
            if !timeout.is_zero() {
                thread::sleep(timeout);
            }
            return Ok(());
        }

        let mut readers: Vec<(Descriptor, SelectableRef)> = Vec::new();
        let mut writers: Vec<(Descriptor, SelectableRef)> = Vec::new();
        for (_, selectable) in &snapshot {
            let mut s = selectable.borrow_mut();
            let Some(fd) = s.descriptor() else { continue };
            if s.needs_read() {
                readers.push((fd, Rc::clone(selectable)));
            }
            if s.needs_write() {
                writers.push((fd, Rc::clone(selectable)));
            }
        }

        let read_fds: Vec<Descriptor> = readers.iter().map(|(fd, _)| *fd).collect();
        let write_fds: Vec<Descriptor> = writers.iter().map(|(fd, _)| *fd).collect();

        let ready = match self.mux.poll(&read_fds, &write_fds, timeout) {
            Ok(ready) => ready,
            Err(err) if is_descriptor_invalid(&err) => {
                // A stale member poisoned the whole call. Recover by
                // re-verifying every member and silently evicting the
                // failures; the turn ends with zero dispatch.
                self.filter_selectables();
                return Ok(());
            }
            Err(err) => {
                if error::is_fatal(&err) {
                    return Err(ErrorKind::FatalSocket(err));
                }
                // Transient (interrupted): quiet turn.
                return Ok(());
            }
        };

        self.timer.touch();

        let readable: HashSet<Descriptor> = ready.readable.into_iter().collect();
        let writable: HashSet<Descriptor> = ready.writable.into_iter().collect();
        for (fd, selectable) in &readers {
            if readable.contains(fd) {
                self.stats.received += selectable.borrow_mut().perform_read()? as u64;
            }
        }
        for (fd, selectable) in &writers {
            if writable.contains(fd) {
                self.stats.sent += selectable.borrow_mut().perform_write()? as u64;
            }
        }
        Ok(())
    }

    /// Re-verifies every member with the same trial poll used by `add`,
    /// discarding the ones that fail. Members with no current descriptor
    /// are kept: not-pollable is not broken.
    fn filter_selectables(&mut self) {
        let mux = &mut self.mux;
        self.selectables.retain(|id, selectable| {
            let Some(fd) = selectable.borrow().descriptor() else {
                return true;
            };
            match mux.probe(fd) {
                Ok(()) => true,
                Err(err) => {
                    debug!("evicting stale selectable {:?} (fd {}): {}", id, fd, err);
                    false
                }
            }
        });
    }

    /// Current transfer counters.
    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Zeroes the transfer counters.
    pub fn stats_reset(&mut self) {
        self.stats.reset();
    }
}

#[cfg(unix)]
impl Default for SelectTask {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduledTask for SelectTask {
    fn is_task_ready(&self, include_idle: bool) -> bool {
        if include_idle {
            return true;
        }
        if self.selectables.is_empty() {
            return false;
        }
        // Housekeeping still runs in edge-triggered mode even with
        // nothing to read.
        if self.timer.is_ready() {
            return true;
        }
        self.selectables
            .snapshot()
            .iter()
            .any(|(_, selectable)| selectable.borrow_mut().needs_write())
    }

    fn run_task(&mut self) -> Result<()> {
        self.process(Duration::ZERO)
    }

    fn run_task_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.process(timeout)
    }
}
