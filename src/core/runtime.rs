//! # Runtime: drives every supervised app until shutdown.
//!
//! A [`Runtime`] is the explicit owner of the supervisors it runs; there is no process-wide
//! registry of apps. Its loop ticks [`Supervise::check_workers`] on every supervisor at a
//! fixed cadence and, once stopped, shuts all of them down under one grace period.
//!
//! ```text
//! run() / run_until(stop)
//!   ├─► validate: no apps → NoApps, repeated name → DuplicateApp
//!   ├─► loop every check_interval (first tick immediate):
//!   │     └─► supervisor.check_workers()  (for each app)
//!   └─► stop (signal / future)
//!         ├─► publish ShutdownRequested
//!         ├─► shutdown_workers(grace) on all apps concurrently
//!         ├─► publish AllStoppedWithin | GraceExceeded
//!         └─► close() every supervisor (flush subscribers)
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use motion::{App, Call, Config, MemoryStream, ResponderError, ResponderFn, Runtime, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), motion::RuntimeError> {
//!     let mut builder = App::builder("greeter", MemoryStream::new("events"));
//!     builder
//!         .respond_to("hello.*", ResponderFn::arc("print", |call: Call| async move {
//!             println!("{}", call.payload);
//!             Ok::<_, ResponderError>(())
//!         }))
//!         .unwrap();
//!
//!     Runtime::new(Config::default())
//!         .with_supervisor(Supervisor::new(builder.build()?))
//!         .run_until(tokio::time::sleep(Duration::from_millis(50)))
//!         .await
//! }
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;

use crate::core::Config;
use crate::core::shutdown;
use crate::core::supervisor::Supervise;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind};

/// Owner of every supervised app.
pub struct Runtime {
    cfg: Config,
    supervisors: Vec<Arc<dyn Supervise>>,
}

impl Runtime {
    /// Creates an empty runtime. `cfg` supplies the tick cadence and the shutdown grace.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            supervisors: Vec::new(),
        }
    }

    /// Adds a supervised app.
    pub fn with_supervisor(mut self, supervisor: impl Supervise) -> Self {
        self.supervisors.push(Arc::new(supervisor));
        self
    }

    /// Adds an already shared supervisor, e.g. one the caller keeps inspecting.
    pub fn with_shared(mut self, supervisor: Arc<dyn Supervise>) -> Self {
        self.supervisors.push(supervisor);
        self
    }

    /// Runs until SIGINT, SIGTERM or SIGQUIT (Ctrl-C off unix).
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.run_until(async {
            if let Err(e) = shutdown::wait_for_shutdown_signal().await {
                tracing::error!(error = %e, "cannot listen for shutdown signals, stopping");
            }
        })
        .await
    }

    /// Runs until `stop` completes.
    pub async fn run_until<F>(self, stop: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        self.validate()?;
        tracing::info!(apps = self.supervisors.len(), "runtime starting");

        let mut ticker = tokio::time::interval(self.cfg.check_interval_clamped());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    for sup in &self.supervisors {
                        sup.check_workers();
                    }
                }
            }
        }

        self.shutdown().await
    }

    fn validate(&self) -> Result<(), RuntimeError> {
        if self.supervisors.is_empty() {
            return Err(RuntimeError::NoApps);
        }
        let mut seen = HashSet::new();
        for sup in &self.supervisors {
            if !seen.insert(sup.name()) {
                return Err(RuntimeError::DuplicateApp {
                    name: sup.name().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        tracing::info!(?grace, "shutting down");
        for sup in &self.supervisors {
            sup.bus()
                .publish(Event::new(EventKind::ShutdownRequested).with_app(sup.name()));
        }

        let reports = futures::future::join_all(
            self.supervisors.iter().map(|sup| sup.shutdown_workers(grace)),
        )
        .await;

        let mut stuck = Vec::new();
        for (sup, slots) in self.supervisors.iter().zip(reports) {
            if slots.is_empty() {
                sup.bus()
                    .publish(Event::new(EventKind::AllStoppedWithin).with_app(sup.name()));
            } else {
                sup.bus().publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_app(sup.name())
                        .with_reason(slots.join(", ")),
                );
                stuck.extend(slots.into_iter().map(|slot| format!("{}/{slot}", sup.name())));
            }
        }

        for sup in &self.supervisors {
            sup.close().await;
        }

        if stuck.is_empty() {
            tracing::info!("all units stopped");
            Ok(())
        } else {
            tracing::error!(?stuck, "units did not stop within grace");
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}
