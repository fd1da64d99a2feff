//! # Supervisor slots and the units that fill them.
//!
//! A slot is a named role (`"consumer"`, `"worker 1"` .. `"worker N"`) tracked
//! independently of whichever execution unit currently staffs it. The unit is a tokio
//! task; its liveness is the state of its join handle.
//!
//! ## Unit lifecycle
//! ```text
//! New ──spawn──► Running ──cancel observed──► Stopping ──exit──► Stopped
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Role a slot plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Runs the router's consume loop.
    Consumer,
    /// Runs a worker loop; numbered from 1.
    Worker(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Consumer => f.write_str("consumer"),
            Role::Worker(n) => write!(f, "worker {n}"),
        }
    }
}

/// Lifecycle state of an execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnitState {
    /// Spawned, not yet running.
    New = 0,
    /// Processing.
    Running = 1,
    /// Shutdown observed, finishing up.
    Stopping = 2,
    /// Exited.
    Stopped = 3,
}

/// State shared between a unit and its slot.
#[derive(Clone, Debug, Default)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub(crate) fn get(&self) -> UnitState {
        match self.0.load(Ordering::Acquire) {
            0 => UnitState::New,
            1 => UnitState::Running,
            2 => UnitState::Stopping,
            _ => UnitState::Stopped,
        }
    }

    pub(crate) fn set(&self, state: UnitState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Point-in-time view of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    /// Slot name, e.g. `"worker 2"`.
    pub name: String,
    /// Whether the unit has not terminated yet.
    pub alive: bool,
    /// Last state the unit reported.
    pub state: UnitState,
    /// Time since the unit was spawned.
    pub uptime: Duration,
}

/// A running unit held by a slot.
pub(crate) struct Slot {
    role: Role,
    join: JoinHandle<()>,
    cancel: CancellationToken,
    state: StateCell,
    started_at: Instant,
}

impl Slot {
    pub(crate) fn new(
        role: Role,
        join: JoinHandle<()>,
        cancel: CancellationToken,
        state: StateCell,
    ) -> Self {
        Self {
            role,
            join,
            cancel,
            state,
            started_at: Instant::now(),
        }
    }

    /// Liveness predicate: the unit's task has not terminated.
    pub(crate) fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    /// Terminates the unit immediately, as a crash would.
    pub(crate) fn kill(&self) {
        self.join.abort();
    }

    /// Releases whatever the unit still holds.
    pub(crate) fn release(self) {
        self.cancel.cancel();
        self.join.abort();
        self.state.set(UnitState::Stopped);
    }

    /// Asks the unit to stop cooperatively.
    pub(crate) fn request_stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the unit to exit until `deadline`, aborting it past that.
    ///
    /// Returns `true` if it exited on its own.
    pub(crate) async fn join_until(mut self, deadline: Instant) -> bool {
        match tokio::time::timeout_at(deadline, &mut self.join).await {
            Ok(_) => true,
            Err(_) => {
                self.join.abort();
                self.state.set(UnitState::Stopped);
                false
            }
        }
    }

    pub(crate) fn status(&self) -> SlotStatus {
        SlotStatus {
            name: self.role.to_string(),
            alive: self.is_alive(),
            state: self.state.get(),
            uptime: self.started_at.elapsed(),
        }
    }
}
