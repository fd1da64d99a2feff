use serde::{Deserialize, Serialize};

use crate::error::MarshalError;
use crate::marshal::{Marshal, Payload};

/// JSON envelope marshal backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshal;

impl JsonMarshal {
    /// Construct a new [`JsonMarshal`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, P: ?Sized> {
    event_name: &'a str,
    payload: &'a P,
}

#[derive(Deserialize)]
struct Envelope {
    event_name: String,
    payload: Payload,
}

impl Marshal for JsonMarshal {
    fn to_bytes<P>(&self, event_name: &str, payload: &P) -> Result<Vec<u8>, MarshalError>
    where
        P: Serialize + ?Sized,
    {
        serde_json::to_vec(&EnvelopeRef {
            event_name,
            payload,
        })
        .map_err(|e| MarshalError::Encode {
            event_name: event_name.to_string(),
            reason: e.to_string(),
        })
    }

    fn to_native(&self, bytes: &[u8]) -> Result<(String, Payload), MarshalError> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| MarshalError::Decode {
                raw: bytes.to_vec(),
                reason: e.to_string(),
            })?;
        Ok((envelope.event_name, envelope.payload))
    }
}
