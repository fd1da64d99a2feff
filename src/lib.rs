//! # motion
//!
//! **Motion** is a pub/sub task-dispatch layer over an ordered event stream.
//!
//! Producers publish named events; a router consumes the stream, matches every event name
//! against glob patterns and queues one invocation per matching responder; a supervised pool
//! of workers drains the queue. A level-triggered supervisor replaces any unit that dies.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   App::dispatch(name, payload)
//!        │  Marshal::to_bytes
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventStream (transport: records out, bytes in)                   │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//!                    ┌───────────────────────┐
//!                    │  "consumer" slot      │  App::route(record)
//!                    │  Marshal::to_native   │  Registry::fan_out
//!                    └───────────┬───────────┘
//!                                ▼
//!                    DispatchQueue (WorkItem per pattern × responder)
//!                    ┌───────────┼───────────┐
//!                    ▼           ▼           ▼
//!               "worker 1"  "worker 2" .. "worker N"
//!                    │           │           │
//!                    └── Respond::respond(Call) (errors and panics contained)
//!
//! Supervisor (one per app) ── check_workers() every tick ──► respawn dead slots
//! Runtime ── owns all supervisors, ticks them, drives shutdown on signal
//! ```
//!
//! ### Runtime events
//! ```text
//! Supervisor / Router / Worker ── publish(Event) ──► Bus ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                          |
//! |-------------------|-------------------------------------------------------------|---------------------------------------------|
//! | **Apps**          | Bundle stream, marshal and frozen responder registry.       | [`App`], [`AppBuilder`]                     |
//! | **Responders**    | Async handlers bound to glob patterns.                      | [`Respond`], [`ResponderFn`], [`Registry`]  |
//! | **Supervision**   | Named slots, crash detection, respawn, graceful shutdown.   | [`Supervisor`], [`Runtime`]                 |
//! | **Transport**     | Stream boundary and an in-memory implementation.            | [`EventStream`], [`MemoryStream`]           |
//! | **Wire format**   | Event envelope encoding.                                    | [`Marshal`], [`JsonMarshal`]                |
//! | **Observability** | Runtime events and pluggable subscribers.                   | [`Event`], [`Subscribe`]                    |
//! | **Errors**        | Typed errors with stable labels.                            | [`MarshalError`], [`RuntimeError`]          |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use motion::{App, Call, Config, MemoryStream, ResponderError, ResponderFn, Runtime, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = MemoryStream::new("events");
//!
//!     let mut builder = App::builder("users", stream.clone()).concurrency(2);
//!     builder.respond_to_named("user.*", ResponderFn::arc("audit", |call: Call| async move {
//!         println!("{:?}: {}", call.event_name, call.payload);
//!         Ok::<_, ResponderError>(())
//!     }))?;
//!     let app = builder.build()?;
//!
//!     app.dispatch("user.created", &serde_json::json!({ "id": 7 })).await?;
//!
//!     Runtime::new(Config::default())
//!         .with_supervisor(Supervisor::new(app))
//!         .run_until(tokio::time::sleep(Duration::from_millis(100)))
//!         .await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod marshal;
mod queue;
mod responders;
mod stream;
mod subscribers;

pub mod logging;

// ---- Public re-exports ----

pub use core::{
    App, AppBuilder, Config, Role, Runtime, SlotStatus, Supervise, Supervisor, SupervisorBuilder,
    UnitState,
};
pub use error::{
    DispatchError, MarshalError, RegistryError, ResponderError, RuntimeError, StreamError,
};
pub use events::{Bus, Event, EventKind};
pub use marshal::{JsonMarshal, Marshal, Payload};
pub use queue::{DispatchQueue, WorkItem};
pub use responders::{
    Call, Registry, RegistryBuilder, Respond, Responder, ResponderFn, ResponderRef,
};
pub use stream::{EventStream, MemoryStream, Record, RecordStream};
pub use subscribers::{Subscribe, SubscriberSet};
