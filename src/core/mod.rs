//! Runtime core: apps, units, supervision and the runtime loop.
//!
//! Public API from this module: [`App`], [`Supervisor`] and [`Runtime`], plus the slot
//! snapshot types.
//!
//! Internal modules:
//! - [`app`]: application bundle and the outbound dispatcher;
//! - [`router`]: record decoding, pattern fan-out and the consumer loop;
//! - [`worker`]: queue draining and responder invocation with failure isolation;
//! - [`slot`]: named slots, unit state and join-handle liveness;
//! - [`supervisor`]: `check_workers` ticks, crash recovery and unit shutdown;
//! - [`runtime`]: tick cadence and signal-driven shutdown over all apps;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod app;
mod config;
mod router;
mod runtime;
mod shutdown;
mod slot;
mod supervisor;
mod worker;

pub use app::{App, AppBuilder};
pub use config::Config;
pub use runtime::Runtime;
pub use slot::{Role, SlotStatus, UnitState};
pub use supervisor::{Supervise, Supervisor, SupervisorBuilder};
