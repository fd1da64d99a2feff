//! # Responder abstraction.
//!
//! A responder is an async handler bound to a glob pattern over event names.
//! The common handle type is [`ResponderRef`], an `Arc<dyn Respond>` that every
//! execution unit shares through the immutable [`Registry`](crate::Registry).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ResponderError;
use crate::marshal::Payload;

/// Shared handle to a responder.
pub type ResponderRef = Arc<dyn Respond>;

/// One invocation of a responder.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Literal name of the matched event; set only for responders registered
    /// with `pass_event_name`.
    pub event_name: Option<Arc<str>>,
    /// Event payload.
    pub payload: Payload,
}

/// # Asynchronous event handler.
///
/// A `Respond` implementation has a stable [`name`](Respond::name) used in logs and an async
/// [`respond`](Respond::respond) method invoked once per matching event. A returned value is
/// discarded; an error (or a panic) is logged by the worker and the event is dropped.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use motion::{Call, Respond, ResponderError};
///
/// struct Audit;
///
/// #[async_trait]
/// impl Respond for Audit {
///     fn name(&self) -> &str { "audit" }
///
///     async fn respond(&self, call: Call) -> Result<(), ResponderError> {
///         if call.payload.is_null() {
///             return Err(ResponderError::fail("empty payload"));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Respond: Send + Sync + 'static {
    /// Returns a stable, human-readable responder name.
    fn name(&self) -> &str;

    /// Handles one event.
    async fn respond(&self, call: Call) -> Result<(), ResponderError>;
}
