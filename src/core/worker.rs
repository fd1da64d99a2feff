//! # Worker: pops work items and invokes responders.
//!
//! ```text
//! loop {
//!   ├─► cancelled? ──► break
//!   ├─► DispatchQueue::pop(poll_timeout)
//!   │     └─► None ──► continue          (idle; re-check cancellation)
//!   ├─► Registry::resolve(pattern, index)
//!   └─► responder.respond(call)
//!         ├─► Ok         ──► debug log
//!         ├─► Err        ──► error log + ResponderFailed
//!         └─► panic      ──► error log + ResponderFailed
//! }
//! ```
//!
//! ## Rules
//! - Items run **sequentially** within one worker.
//! - A failing or panicking responder loses only its own item.
//! - Cancellation is checked between items, never in the middle of one; a responder that
//!   does not return is the supervisor's problem (grace deadline).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::core::App;
use crate::core::slot::{Role, StateCell, UnitState};
use crate::error::{ResponderError, panic_info};
use crate::events::{Bus, Event, EventKind};
use crate::marshal::Marshal;
use crate::queue::{DispatchQueue, WorkItem};
use crate::responders::Registry;

/// One worker unit's view of its app.
pub(crate) struct Worker {
    app: Arc<str>,
    slot: Role,
    queue: DispatchQueue,
    registry: Arc<Registry>,
    bus: Bus,
    poll_timeout: Duration,
    state: StateCell,
}

impl Worker {
    pub(crate) fn new<M: Marshal>(app: &App<M>, slot: Role, state: StateCell) -> Self {
        Self {
            app: app.name().into(),
            slot,
            queue: app.queue().clone(),
            registry: Arc::clone(app.registry()),
            bus: app.bus().clone(),
            poll_timeout: app.config().poll_timeout_clamped(),
            state,
        }
    }

    /// Processes items until `token` is cancelled.
    pub(crate) async fn run(self, token: CancellationToken) {
        self.state.set(UnitState::Running);
        tracing::info!(app = %self.app, slot = %self.slot, "worker starting");

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = self.queue.pop(self.poll_timeout) => item,
            };
            if let Some(item) = item {
                self.handle(item).await;
            }
        }

        self.state.set(UnitState::Stopping);
        tracing::info!(app = %self.app, slot = %self.slot, "worker stopped");
        self.state.set(UnitState::Stopped);
    }

    async fn handle(&self, item: WorkItem) {
        let Some(responder) = self.registry.resolve(&item.pattern, item.responder_index) else {
            tracing::error!(
                app = %self.app,
                slot = %self.slot,
                pattern = %item.pattern,
                index = item.responder_index,
                "no responder for work item, dropping"
            );
            return;
        };

        let handler = responder.handler();
        let call = responder.call_for(&item);
        let outcome = AssertUnwindSafe(handler.respond(call))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ResponderError::Panicked {
                    info: panic_info(&*panic),
                })
            });

        match outcome {
            Ok(()) => tracing::debug!(
                app = %self.app,
                slot = %self.slot,
                responder = handler.name(),
                event = %item.event_name,
                "responder done"
            ),
            Err(e) => {
                tracing::error!(
                    app = %self.app,
                    slot = %self.slot,
                    responder = handler.name(),
                    event = %item.event_name,
                    payload = %item.payload,
                    label = e.as_label(),
                    error = %e,
                    "responder failed"
                );
                self.bus.publish(
                    Event::new(EventKind::ResponderFailed)
                        .with_app(Arc::clone(&self.app))
                        .with_slot(self.slot.to_string())
                        .with_event_name(item.event_name.as_str())
                        .with_pattern(item.pattern.as_str())
                        .with_reason(e.to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::responders::{Call, ResponderFn};
    use crate::stream::MemoryStream;

    fn item(pattern: &str, index: usize, name: &str, payload: serde_json::Value) -> WorkItem {
        WorkItem {
            pattern: pattern.into(),
            responder_index: index,
            event_name: name.into(),
            payload,
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_next_item() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut b = App::builder("w", MemoryStream::new("s"));
        b.respond_to(
            "fail",
            ResponderFn::arc("fail", |_c: Call| async {
                Err::<(), _>(ResponderError::fail("nope"))
            }),
        )
        .unwrap();
        b.respond_to(
            "panic",
            ResponderFn::arc("panic", |_c: Call| async {
                if true {
                    panic!("responder boom");
                }
                Ok::<_, ResponderError>(())
            }),
        )
        .unwrap();
        let sink = Arc::clone(&seen);
        b.respond_to(
            "ok",
            ResponderFn::arc("ok", move |c: Call| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(c.payload);
                    Ok::<_, ResponderError>(())
                }
            }),
        )
        .unwrap();
        let app = b.build().unwrap();
        let mut rx = app.bus().subscribe();

        app.queue().push(item("fail", 0, "fail", json!(1)));
        app.queue().push(item("panic", 0, "panic", json!(2)));
        app.queue().push(item("ok", 0, "ok", json!(3)));

        let token = CancellationToken::new();
        let state = StateCell::default();
        let worker = Worker::new(&app, Role::Worker(1), state.clone());
        let unit = tokio::spawn(worker.run(token.clone()));

        let failed = [rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        assert!(failed.iter().all(|e| e.kind == EventKind::ResponderFailed));
        assert_eq!(failed[0].event_name.as_deref(), Some("fail"));
        assert_eq!(failed[1].pattern.as_deref(), Some("panic"));
        assert!(failed[1].reason.as_deref().unwrap().contains("responder boom"));

        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.lock(), vec![json!(3)]);

        token.cancel();
        unit.await.unwrap();
        assert_eq!(state.get(), UnitState::Stopped);
    }

    #[tokio::test]
    async fn test_event_name_is_passed_only_when_requested() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut b = App::builder("w", MemoryStream::new("s"));
        for named in [false, true] {
            let sink = Arc::clone(&calls);
            let r = ResponderFn::arc("rec", move |c: Call| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(c.event_name);
                    Ok::<_, ResponderError>(())
                }
            });
            if named {
                b.respond_to_named("user.*", r).unwrap();
            } else {
                b.respond_to("user.*", r).unwrap();
            }
        }
        let app = b.build().unwrap();
        let worker = Worker::new(&app, Role::Worker(1), StateCell::default());

        worker.handle(item("user.*", 0, "user.created", json!({}))).await;
        worker.handle(item("user.*", 1, "user.created", json!({}))).await;

        assert_eq!(*calls.lock(), vec![None, Some(Arc::from("user.created"))]);
    }

    #[tokio::test]
    async fn test_unknown_responder_index_is_dropped() {
        let mut b = App::builder("w", MemoryStream::new("s"));
        b.respond_to("a", ResponderFn::arc("a", |_c: Call| async { Ok::<_, ResponderError>(()) }))
            .unwrap();
        let app = b.build().unwrap();
        let worker = Worker::new(&app, Role::Worker(1), StateCell::default());

        worker.handle(item("a", 7, "a", json!(null))).await;
        worker.handle(item("b", 0, "b", json!(null))).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_worker_stops_within_one_poll() {
        let mut b = App::builder("w", MemoryStream::new("s"));
        b.respond_to("a", ResponderFn::arc("a", |_c: Call| async { Ok::<_, ResponderError>(()) }))
            .unwrap();
        let app = b.build().unwrap();

        let token = CancellationToken::new();
        let unit = tokio::spawn(
            Worker::new(&app, Role::Worker(1), StateCell::default()).run(token.clone()),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        tokio::time::timeout(app.config().poll_timeout, unit)
            .await
            .unwrap()
            .unwrap();
    }
}
