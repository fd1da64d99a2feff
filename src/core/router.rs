//! # Router: stream records → work items.
//!
//! ```text
//! EventStream::records()
//!     │  Record { data }
//!     ▼
//! App::route(data)
//!     ├─► Marshal::to_native ── MarshalError ──► warn + RecordSkipped, next record
//!     ├─► Registry::fan_out(event_name, payload)
//!     └─► DispatchQueue::push(item)   (one per matching pattern × responder)
//! ```
//!
//! ## Rules
//! - A record that fails to decode is skipped; nothing is propagated.
//! - Patterns that do not match produce nothing; that is not an error.
//! - `consume` ends on cancellation, end of stream, or a stream error; the supervisor
//!   notices the dead consumer on its next tick and starts a new one.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::core::App;
use crate::core::slot::{StateCell, UnitState};
use crate::error::{MarshalError, StreamError, panic_info};
use crate::events::{Event, EventKind};
use crate::marshal::Marshal;

impl<M: Marshal> App<M> {
    /// Routes one raw record: decodes it and enqueues one work item per matching
    /// `(pattern, responder)`.
    ///
    /// Returns the number of items enqueued; `0` for undecodable records.
    pub fn route(&self, data: &[u8]) -> usize {
        let decoded = std::panic::catch_unwind(AssertUnwindSafe(|| self.marshal.to_native(data)))
            .unwrap_or_else(|panic| {
                Err(MarshalError::Decode {
                    raw: data.to_vec(),
                    reason: panic_info(&*panic),
                })
            });

        let (event_name, payload) = match decoded {
            Ok(native) => native,
            Err(e) => {
                tracing::warn!(
                    app = self.name(),
                    error = %e,
                    "failed to marshal record to native values, skipping"
                );
                self.bus().publish(
                    Event::new(EventKind::RecordSkipped)
                        .with_app(self.name())
                        .with_reason(e.to_string()),
                );
                return 0;
            }
        };

        let items = self.registry().fan_out(&event_name, &payload);
        let count = items.len();
        for item in items {
            self.queue().push(item);
        }

        tracing::debug!(app = self.name(), event = %event_name, enqueued = count, "routed event");
        count
    }
}

/// Consume loop of the consumer unit.
pub(crate) async fn consume<M: Marshal>(
    app: Arc<App<M>>,
    token: CancellationToken,
    state: StateCell,
) {
    state.set(UnitState::Running);
    tracing::info!(app = app.name(), stream = app.stream().name(), "consumer starting");

    match drive(&app, &token).await {
        Ok(()) => tracing::info!(app = app.name(), "consumer stopped"),
        Err(e) => tracing::error!(app = app.name(), error = %e, "consumer failed"),
    }
    state.set(UnitState::Stopped);
}

async fn drive<M: Marshal>(app: &App<M>, token: &CancellationToken) -> Result<(), StreamError> {
    let mut records = app.stream().records().await?;

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            next = records.next() => next,
        };

        match next {
            Some(Ok(record)) => {
                tracing::debug!(app = app.name(), sequence = record.sequence, "consumed record");
                app.route(&record.data);
            }
            Some(Err(e)) => return Err(e),
            None => {
                tracing::warn!(app = app.name(), "stream ended");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::ResponderError;
    use crate::responders::{Call, ResponderFn, ResponderRef};
    use crate::stream::MemoryStream;

    fn noop(name: &'static str) -> ResponderRef {
        ResponderFn::arc(name, |_call: Call| async { Ok::<_, ResponderError>(()) })
    }

    fn app(stream: MemoryStream) -> App {
        let mut b = App::builder("router-test", stream);
        b.respond_to("user.*", noop("a")).unwrap();
        b.respond_to("user.*", noop("a2")).unwrap();
        b.respond_to("user.created", noop("b")).unwrap();
        b.build().unwrap()
    }

    fn envelope(name: &str, payload: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({"event_name": name, "payload": payload})).unwrap()
    }

    #[tokio::test]
    async fn test_route_enqueues_one_item_per_responder_index() {
        let app = app(MemoryStream::new("s"));

        assert_eq!(app.route(&envelope("user.deleted", json!({"id": 2}))), 2);
        let mut indexes = Vec::new();
        while let Some(it) = app.queue().pop(Duration::from_millis(1)).await {
            assert_eq!(it.pattern, "user.*");
            indexes.push(it.responder_index);
        }
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn test_route_skips_malformed_records() {
        let app = app(MemoryStream::new("s"));
        let mut rx = app.bus().subscribe();

        assert_eq!(app.route(b"{not json"), 0);
        assert_eq!(app.route(br#"{"payload": 1}"#), 0);
        assert!(app.queue().is_empty());

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::RecordSkipped);
        assert_eq!(ev.app.as_deref(), Some("router-test"));
    }

    #[test]
    fn test_route_without_match_is_silent() {
        let app = app(MemoryStream::new("s"));
        assert_eq!(app.route(&envelope("order.placed", json!(null))), 0);
        assert!(app.queue().is_empty());
    }

    #[tokio::test]
    async fn test_consume_routes_until_cancelled() {
        let stream = MemoryStream::new("s");
        let app = Arc::new(app(stream.clone()));
        stream.append(envelope("user.created", json!({"id": 1}))).unwrap();
        stream.append(b"garbage".to_vec()).unwrap();
        stream.append(envelope("user.deleted", json!({"id": 2}))).unwrap();

        let token = CancellationToken::new();
        let state = StateCell::default();
        let unit = tokio::spawn(consume(Arc::clone(&app), token.clone(), state.clone()));

        tokio::time::timeout(Duration::from_secs(2), async {
            while stream.checkpoint() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        token.cancel();
        unit.await.unwrap();

        assert_eq!(app.queue().len(), 5);
        assert_eq!(state.get(), UnitState::Stopped);
    }

    #[tokio::test]
    async fn test_consume_exits_when_stream_ends() {
        let stream = MemoryStream::new("s");
        let app = Arc::new(app(stream.clone()));
        stream.close();

        let state = StateCell::default();
        tokio::time::timeout(
            Duration::from_secs(1),
            consume(app, CancellationToken::new(), state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(state.get(), UnitState::Stopped);
    }
}
