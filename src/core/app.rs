//! # Application: stream, marshal, registry and queue bundled under one name.
//!
//! An [`App`] is assembled with an [`AppBuilder`]: responders are registered on the builder,
//! and [`AppBuilder::build`] freezes the registry. Nothing can be registered afterwards, so
//! every unit spawned from the app resolves work items against the same responders.
//!
//! ## Example
//! ```rust
//! use motion::{App, Call, MemoryStream, ResponderError, ResponderFn};
//!
//! let stream = MemoryStream::new("orders");
//! let mut builder = App::builder("orders", stream.clone());
//! builder
//!     .respond_to("order.*", ResponderFn::arc("audit", |call: Call| async move {
//!         println!("{}", call.payload);
//!         Ok::<_, ResponderError>(())
//!     }))
//!     .unwrap();
//! let app = builder.build().unwrap();
//! assert_eq!(app.registry().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::Config;
use crate::error::{DispatchError, RegistryError, RuntimeError};
use crate::events::Bus;
use crate::marshal::{JsonMarshal, Marshal};
use crate::queue::DispatchQueue;
use crate::responders::{Registry, RegistryBuilder, ResponderRef};
use crate::stream::EventStream;

/// Builder for [`App`].
pub struct AppBuilder<M = JsonMarshal> {
    name: String,
    stream: Arc<dyn EventStream>,
    marshal: M,
    cfg: Config,
    responders: RegistryBuilder,
}

impl AppBuilder<JsonMarshal> {
    /// Creates a builder using the JSON marshal and default configuration.
    pub fn new(name: impl Into<String>, stream: impl EventStream) -> Self {
        Self {
            name: name.into(),
            stream: Arc::new(stream),
            marshal: JsonMarshal,
            cfg: Config::default(),
            responders: RegistryBuilder::new(),
        }
    }
}

impl<M: Marshal> AppBuilder<M> {
    /// Replaces the marshal.
    pub fn with_marshal<N: Marshal>(self, marshal: N) -> AppBuilder<N> {
        AppBuilder {
            name: self.name,
            stream: self.stream,
            marshal,
            cfg: self.cfg,
            responders: self.responders,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Overrides the number of worker slots.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.cfg.concurrency = n;
        self
    }

    /// Registers `responder` under `pattern` (payload only).
    ///
    /// Returns the same handle so the call site keeps a usable reference.
    pub fn respond_to(
        &mut self,
        pattern: &str,
        responder: ResponderRef,
    ) -> Result<ResponderRef, RegistryError> {
        self.responders.respond_to(pattern, responder)
    }

    /// Registers `responder` under `pattern`; it also receives the matched event name.
    pub fn respond_to_named(
        &mut self,
        pattern: &str,
        responder: ResponderRef,
    ) -> Result<ResponderRef, RegistryError> {
        self.responders.respond_to_named(pattern, responder)
    }

    /// Freezes the registry and builds the app.
    ///
    /// Fails with [`RuntimeError::NoResponders`] if nothing was registered.
    pub fn build(self) -> Result<App<M>, RuntimeError> {
        if self.responders.is_empty() {
            return Err(RuntimeError::NoResponders { app: self.name });
        }
        if self.cfg.concurrency == 0 {
            tracing::warn!(
                app = %self.name,
                "no worker slots; routed items will accumulate in the queue"
            );
        }
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        Ok(App {
            name: self.name.into(),
            stream: self.stream,
            marshal: self.marshal,
            registry: Arc::new(self.responders.build()),
            queue: DispatchQueue::new(),
            bus,
            cfg: self.cfg,
        })
    }
}

/// A named motion application.
pub struct App<M = JsonMarshal> {
    name: Arc<str>,
    stream: Arc<dyn EventStream>,
    pub(crate) marshal: M,
    registry: Arc<Registry>,
    queue: DispatchQueue,
    bus: Bus,
    cfg: Config,
}

impl App {
    /// Starts building an app with the JSON marshal.
    pub fn builder(name: impl Into<String>, stream: impl EventStream) -> AppBuilder {
        AppBuilder::new(name, stream)
    }
}

impl<M: Marshal> App<M> {
    /// Encodes the event and publishes it on the stream.
    ///
    /// A [`MarshalError`](crate::MarshalError) aborts the publish; nothing is sent.
    pub async fn dispatch<P>(&self, event_name: &str, payload: &P) -> Result<(), DispatchError>
    where
        P: Serialize + ?Sized,
    {
        let bytes = self.marshal.to_bytes(event_name, payload)?;
        self.stream.put(bytes).await?;
        tracing::debug!(app = %self.name, event = event_name, "dispatched event");
        Ok(())
    }

    /// App name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The frozen responder registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The dispatch queue shared by the router and the workers.
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Runtime event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Underlying event stream.
    pub fn stream(&self) -> &Arc<dyn EventStream> {
        &self.stream
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

impl<M> fmt::Display for App<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.name, self.stream.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::{MarshalError, ResponderError};
    use crate::marshal::{JsonMarshal, Payload};
    use crate::responders::{Call, ResponderFn};
    use crate::stream::MemoryStream;

    fn noop() -> ResponderRef {
        ResponderFn::arc("noop", |_call: Call| async { Ok::<_, ResponderError>(()) })
    }

    #[test]
    fn test_build_without_responders_fails() {
        let err = App::builder("empty", MemoryStream::new("s"))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::NoResponders { ref app } if app == "empty"));
    }

    #[test]
    fn test_concurrency_override_and_display() {
        let mut b = App::builder("billing", MemoryStream::new("events")).concurrency(4);
        b.respond_to("*", noop()).unwrap();
        let app = b.build().unwrap();
        assert_eq!(app.config().concurrency, 4);
        assert_eq!(app.to_string(), "billing on events");
    }

    #[tokio::test]
    async fn test_dispatch_publishes_an_envelope() {
        let stream = MemoryStream::new("s");
        let mut b = App::builder("app", stream.clone());
        b.respond_to("*", noop()).unwrap();
        let app = b.build().unwrap();

        app.dispatch("user.created", &json!({"id": 1})).await.unwrap();

        let published = stream.published();
        assert_eq!(published.len(), 1);
        let (name, payload) = JsonMarshal.to_native(&published[0]).unwrap();
        assert_eq!(name, "user.created");
        assert_eq!(payload, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_dispatch_of_unencodable_payload_sends_nothing() {
        let stream = MemoryStream::new("s");
        let mut b = App::builder("app", stream.clone());
        b.respond_to("*", noop()).unwrap();
        let app = b.build().unwrap();

        let mut bad: BTreeMap<(u8, u8), u8> = BTreeMap::new();
        bad.insert((1, 2), 3);

        let err = app.dispatch("bad", &bad).await.unwrap_err();
        assert!(matches!(err, DispatchError::Marshal(MarshalError::Encode { .. })));
        assert!(stream.is_empty());
    }

    /// Newline-separated `name\npayload` framing.
    struct LineMarshal;

    impl Marshal for LineMarshal {
        fn to_bytes<P>(&self, event_name: &str, payload: &P) -> Result<Vec<u8>, MarshalError>
        where
            P: serde::Serialize + ?Sized,
        {
            let body = serde_json::to_string(payload).map_err(|e| MarshalError::Encode {
                event_name: event_name.to_string(),
                reason: e.to_string(),
            })?;
            Ok(format!("{event_name}\n{body}").into_bytes())
        }

        fn to_native(&self, bytes: &[u8]) -> Result<(String, Payload), MarshalError> {
            let decode = |reason: &str| MarshalError::Decode {
                raw: bytes.to_vec(),
                reason: reason.to_string(),
            };
            let text = std::str::from_utf8(bytes).map_err(|_| decode("not utf-8"))?;
            let (name, body) = text.split_once('\n').ok_or_else(|| decode("missing newline"))?;
            let payload = serde_json::from_str(body).map_err(|e| decode(&e.to_string()))?;
            Ok((name.to_string(), payload))
        }
    }

    #[tokio::test]
    async fn test_custom_marshal_and_config_flow_through_dispatch_and_route() {
        let stream = MemoryStream::new("s");
        let cfg = Config {
            concurrency: 3,
            ..Config::default()
        };
        let mut b = App::builder("lines", stream.clone())
            .with_marshal(LineMarshal)
            .with_config(cfg);
        b.respond_to("user.*", noop()).unwrap();
        let app = b.build().unwrap();
        assert_eq!(app.config().concurrency, 3);

        app.dispatch("user.created", &json!({"id": 1})).await.unwrap();
        let published = stream.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].starts_with(b"user.created\n"));

        assert_eq!(app.route(&published[0]), 1);
        let item = app.queue().pop(Duration::from_millis(10)).await.unwrap();
        assert_eq!(item.event_name, "user.created");
        assert_eq!(item.payload, json!({"id": 1}));

        let envelope = JsonMarshal.to_bytes("user.created", &json!({"id": 2})).unwrap();
        assert_eq!(app.route(&envelope), 0);
        assert!(app.queue().is_empty());
    }

    #[test]
    fn test_zero_concurrency_builds_and_queue_only_grows() {
        let mut b = App::builder("idle", MemoryStream::new("s")).concurrency(0);
        b.respond_to("*", noop()).unwrap();
        let app = b.build().unwrap();
        assert_eq!(app.config().concurrency, 0);

        let record = JsonMarshal.to_bytes("x", &json!(null)).unwrap();
        for _ in 0..3 {
            assert_eq!(app.route(&record), 1);
        }
        assert_eq!(app.queue().len(), 3);
    }

    #[tokio::test]
    async fn test_dispatch_to_closed_stream_surfaces_transport_error() {
        let stream = MemoryStream::new("s");
        let mut b = App::builder("app", stream.clone());
        b.respond_to("*", noop()).unwrap();
        let app = b.build().unwrap();

        stream.close();
        let err = app.dispatch("x", &json!(1)).await.unwrap_err();
        assert_eq!(err.as_label(), "stream_closed");
    }
}
