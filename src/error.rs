//! Error types used by the motion runtime, its marshal boundary and responders.
//!
//! - [`MarshalError`]: wire envelope could not be encoded or decoded.
//! - [`RegistryError`]: a responder pattern was rejected at registration.
//! - [`ResponderError`]: a responder invocation failed or panicked.
//! - [`StreamError`]: the external event stream refused a read or a write.
//! - [`DispatchError`]: publishing an event failed (marshal or transport).
//! - [`RuntimeError`]: misconfiguration before start, or a shutdown overrun.
//!
//! Every enum provides `as_label` with a short stable snake_case label for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Failure to marshal an event to bytes or back to native values.
///
/// Decoding never surfaces any other error type: invalid bytes, invalid encoding and
/// envelopes missing `event_name` or `payload` all end up as [`MarshalError::Decode`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MarshalError {
    /// The payload cannot be represented in the wire encoding.
    #[error("could not encode payload for event {event_name:?}: {reason}")]
    Encode {
        /// Name of the event being encoded.
        event_name: String,
        /// Underlying codec message.
        reason: String,
    },

    /// The bytes are not a valid envelope.
    #[error("could not decode envelope from {} bytes: {reason}", .raw.len())]
    Decode {
        /// The raw bytes that failed to decode.
        raw: Vec<u8>,
        /// Underlying codec message.
        reason: String,
    },
}

impl MarshalError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use motion::MarshalError;
    ///
    /// let err = MarshalError::Decode { raw: b"nope".to_vec(), reason: "eof".into() };
    /// assert_eq!(err.as_label(), "marshal_decode");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MarshalError::Encode { .. } => "marshal_encode",
            MarshalError::Decode { .. } => "marshal_decode",
        }
    }
}

/// # Errors raised while registering responders.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The glob pattern does not compile.
    #[error("invalid responder pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Pattern as given by the caller.
        pattern: String,
        /// Why the glob compiler rejected it.
        reason: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::InvalidPattern { .. } => "registry_invalid_pattern",
        }
    }
}

/// # Errors produced by a responder invocation.
///
/// Workers log these and drop the work item; nothing is retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ResponderError {
    /// The responder returned an error.
    #[error("responder failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The responder panicked; the panic was contained by the worker.
    #[error("responder panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ResponderError {
    /// Shorthand for [`ResponderError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ResponderError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use motion::ResponderError;
    ///
    /// assert_eq!(ResponderError::fail("boom").as_label(), "responder_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ResponderError::Fail { .. } => "responder_failed",
            ResponderError::Panicked { .. } => "responder_panicked",
        }
    }
}

/// # Errors reported by an [`EventStream`](crate::EventStream) implementation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StreamError {
    /// The stream has been closed and accepts no further reads or writes.
    #[error("stream closed")]
    Closed,

    /// The transport failed.
    #[error("stream transport error: {error}")]
    Transport {
        /// The underlying error message.
        error: String,
    },
}

impl StreamError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Closed => "stream_closed",
            StreamError::Transport { .. } => "stream_transport",
        }
    }
}

/// # Errors surfaced synchronously by [`App::dispatch`](crate::App::dispatch).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Encoding failed; nothing was published.
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// The stream rejected the encoded bytes.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::Marshal(e) => e.as_label(),
            DispatchError::Stream(e) => e.as_label(),
        }
    }
}

/// # Errors produced by the motion runtime itself.
///
/// All variants but [`RuntimeError::GraceExceeded`] are raised before anything starts.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The runtime was started without any application.
    #[error("no apps to supervise")]
    NoApps,

    /// Two applications share a name; slots and logs would be ambiguous.
    #[error("multiple apps named {name:?}; name them explicitly")]
    DuplicateApp {
        /// The duplicated name.
        name: String,
    },

    /// An application was built without any responder.
    #[error("app {app:?} has no responders registered")]
    NoResponders {
        /// Name of the application.
        app: String,
    },

    /// Shutdown grace period was exceeded; the listed units were aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Slots (as `app/slot`) that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use motion::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoApps => "runtime_no_apps",
            RuntimeError::DuplicateApp { .. } => "runtime_duplicate_app",
            RuntimeError::NoResponders { .. } => "runtime_no_responders",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_info(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
