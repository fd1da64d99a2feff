//! # Supervisor: keeps one app's consumer and worker slots staffed.
//!
//! The [`Supervisor`] owns an [`App`], a table of named slots and the wiring that forwards
//! the app's runtime events to a [`SubscriberSet`]. It never restarts anything by itself:
//! every [`Supervisor::check_workers`] call is one level-triggered tick.
//!
//! ## Architecture
//! ```text
//! Runtime tick ──► check_workers()
//!                    for slot in ["consumer", "worker 1", .., "worker N"]:
//!                      ├─ empty?  ──► spawn unit (child token) ─► SlotStarting
//!                      └─ dead?   ──► release + remove       ─► SlotDied
//!                                     (re-spawned on the next tick)
//!
//! Event flow:
//!   Router / Worker / Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!
//! Shutdown path (driven by the Runtime):
//!   shutdown_workers(grace)
//!     ├─► closed = true           (no more spawns)
//!     ├─► cancel every unit
//!     └─► join each until the shared deadline, abort stragglers ─► stuck slot names
//!   close()
//!     └─► stop the listener, drain the bus, flush subscribers
//! ```
//!
//! ## Rules
//! - At most one unit per slot.
//! - A unit that is alive but hung is never detected; only termination is.
//! - Slot locks are synchronous and never held across an await.
//!
//! ## Example
//! ```rust
//! use motion::{App, Call, MemoryStream, ResponderError, ResponderFn, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut builder = App::builder("audit", MemoryStream::new("events")).concurrency(2);
//!     builder
//!         .respond_to("*", ResponderFn::arc("log", |_call: Call| async {
//!             Ok::<_, ResponderError>(())
//!         }))
//!         .unwrap();
//!     let sup = Supervisor::new(builder.build().unwrap());
//!
//!     sup.check_workers();
//!     assert_eq!(sup.slots().len(), 3);
//!
//!     let stuck = sup.shutdown_workers(std::time::Duration::from_secs(1)).await;
//!     assert!(stuck.is_empty());
//!     sup.close().await;
//! }
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::App;
use crate::core::router;
use crate::core::slot::{Role, Slot, SlotStatus, StateCell};
use crate::core::worker::Worker;
use crate::events::{Bus, Event, EventKind};
use crate::marshal::{JsonMarshal, Marshal};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Object-safe view of a supervisor, used by the [`Runtime`](crate::Runtime) to drive
/// apps with different marshals side by side.
#[async_trait]
pub trait Supervise: Send + Sync + 'static {
    /// Name of the supervised app.
    fn name(&self) -> &str;

    /// The app's runtime event bus.
    fn bus(&self) -> &Bus;

    /// One health-check tick.
    fn check_workers(&self);

    /// Stops every unit; returns the slots that had to be aborted.
    async fn shutdown_workers(&self, grace: Duration) -> Vec<String>;

    /// Stops event forwarding and flushes subscribers.
    async fn close(&self);
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder<M = JsonMarshal> {
    app: App<M>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<M: Marshal> SupervisorBuilder<M> {
    /// Adds runtime event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Builds the supervisor. Slots stay empty until the first [`Supervisor::check_workers`].
    ///
    /// Must be called inside a tokio runtime when subscribers were added.
    pub fn build(self) -> Supervisor<M> {
        let app = Arc::new(self.app);
        let listener_token = CancellationToken::new();
        let listener = (!self.subscribers.is_empty()).then(|| {
            let set = SubscriberSet::new(self.subscribers, app.bus().clone());
            spawn_listener(app.bus(), set, listener_token.clone())
        });

        Supervisor {
            app,
            slots: Mutex::new(BTreeMap::new()),
            units_token: CancellationToken::new(),
            listener_token,
            closed: AtomicBool::new(false),
            listener: Mutex::new(listener),
        }
    }
}

/// Keeps the slots of one [`App`] staffed.
pub struct Supervisor<M = JsonMarshal> {
    app: Arc<App<M>>,
    slots: Mutex<BTreeMap<Role, Slot>>,
    units_token: CancellationToken,
    listener_token: CancellationToken,
    closed: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<M: Marshal> Supervisor<M> {
    /// Starts building a supervisor for `app`.
    pub fn builder(app: App<M>) -> SupervisorBuilder<M> {
        SupervisorBuilder {
            app,
            subscribers: Vec::new(),
        }
    }

    /// Supervisor without subscribers.
    pub fn new(app: App<M>) -> Self {
        Self::builder(app).build()
    }

    /// The supervised app.
    pub fn app(&self) -> &Arc<App<M>> {
        &self.app
    }

    /// One health-check tick.
    ///
    /// Spawns a unit for every empty slot, then releases and removes every slot whose unit
    /// has terminated. Does nothing once [`shutdown_workers`](Self::shutdown_workers) ran.
    /// Must be called inside a tokio runtime.
    pub fn check_workers(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut slots = self.slots.lock();

        for role in self.roles() {
            if let Entry::Vacant(entry) = slots.entry(role) {
                entry.insert(self.spawn(role));
            }
        }

        let dead: Vec<Role> = slots
            .iter()
            .filter(|(_, slot)| !slot.is_alive())
            .map(|(role, _)| *role)
            .collect();

        for role in dead {
            if let Some(slot) = slots.remove(&role) {
                tracing::error!(
                    app = self.app.name(),
                    slot = %role,
                    "unit is dead, releasing slot"
                );
                slot.release();
                self.app.bus().publish(
                    Event::new(EventKind::SlotDied)
                        .with_app(self.app.name())
                        .with_slot(role.to_string()),
                );
            }
        }
    }

    /// Aborts the unit in slot `name` as a crash would, leaving the slot for the next tick.
    ///
    /// Returns `false` if no such slot is staffed.
    pub fn kill(&self, name: &str) -> bool {
        let slots = self.slots.lock();
        match slots.iter().find(|(role, _)| role.to_string() == name) {
            Some((_, slot)) => {
                tracing::warn!(app = self.app.name(), slot = name, "killing unit");
                slot.kill();
                true
            }
            None => false,
        }
    }

    /// Snapshot of the staffed slots, consumer first.
    pub fn slots(&self) -> Vec<SlotStatus> {
        self.slots.lock().values().map(Slot::status).collect()
    }

    /// Cancels every unit and waits up to `grace` for them to exit.
    ///
    /// Units still running at the deadline are aborted; their slot names are returned.
    pub async fn shutdown_workers(&self, grace: Duration) -> Vec<String> {
        self.closed.store(true, Ordering::Release);
        let slots = std::mem::take(&mut *self.slots.lock());
        self.units_token.cancel();
        for slot in slots.values() {
            slot.request_stop();
        }

        let deadline = Instant::now() + grace;
        let mut stuck = Vec::new();
        for (role, slot) in slots {
            if !slot.join_until(deadline).await {
                tracing::warn!(
                    app = self.app.name(),
                    slot = %role,
                    ?grace,
                    "unit did not stop in time, aborted"
                );
                stuck.push(role.to_string());
            }
        }
        stuck
    }

    /// Stops forwarding runtime events and waits for subscribers to drain.
    pub async fn close(&self) {
        self.listener_token.cancel();
        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
    }

    fn roles(&self) -> impl Iterator<Item = Role> {
        std::iter::once(Role::Consumer).chain((1..=self.app.config().concurrency).map(Role::Worker))
    }

    fn spawn(&self, role: Role) -> Slot {
        let token = self.units_token.child_token();
        let state = StateCell::default();
        let join = match role {
            Role::Consumer => tokio::spawn(router::consume(
                Arc::clone(&self.app),
                token.clone(),
                state.clone(),
            )),
            Role::Worker(_) => {
                tokio::spawn(Worker::new(&self.app, role, state.clone()).run(token.clone()))
            }
        };

        tracing::info!(app = self.app.name(), slot = %role, "starting unit");
        self.app.bus().publish(
            Event::new(EventKind::SlotStarting)
                .with_app(self.app.name())
                .with_slot(role.to_string()),
        );
        Slot::new(role, join, token, state)
    }
}

impl<M> Drop for Supervisor<M> {
    fn drop(&mut self) {
        self.units_token.cancel();
        self.listener_token.cancel();
    }
}

#[async_trait]
impl<M: Marshal> Supervise for Supervisor<M> {
    fn name(&self) -> &str {
        self.app.name()
    }

    fn bus(&self) -> &Bus {
        self.app.bus()
    }

    fn check_workers(&self) {
        Supervisor::check_workers(self);
    }

    async fn shutdown_workers(&self, grace: Duration) -> Vec<String> {
        Supervisor::shutdown_workers(self, grace).await
    }

    async fn close(&self) {
        Supervisor::close(self).await;
    }
}

/// Forwards bus events to `set` until `token` is cancelled, then drains what is left.
fn spawn_listener(bus: &Bus, set: SubscriberSet, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => set.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        set.shutdown().await;
    })
}
