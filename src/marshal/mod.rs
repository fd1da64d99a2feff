//! # Wire envelope encoding.
//!
//! A [`Marshal`] turns `(event_name, payload)` into bytes for the stream and back.
//! The envelope always carries two named fields:
//!
//! ```text
//! { "event_name": "user.created", "payload": { "id": 1 } }
//! ```
//!
//! Any codec failure is reported as [`MarshalError`](crate::MarshalError); the router
//! skips undecodable records, the dispatcher hands encode failures back to the caller.

mod json;

pub use json::JsonMarshal;

use serde::Serialize;

use crate::error::MarshalError;

/// Arbitrary structured value carried by an event.
pub type Payload = serde_json::Value;

/// Encode/decode boundary between wire bytes and the `(event_name, payload)` pair.
///
/// Implementations must be pure: no I/O, no state changes.
pub trait Marshal: Send + Sync + 'static {
    /// Serializes the envelope `{event_name, payload}`.
    fn to_bytes<P>(&self, event_name: &str, payload: &P) -> Result<Vec<u8>, MarshalError>
    where
        P: Serialize + ?Sized;

    /// Decodes an envelope back into its event name and payload.
    fn to_native(&self, bytes: &[u8]) -> Result<(String, Payload), MarshalError>;
}
