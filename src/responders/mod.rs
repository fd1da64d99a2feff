//! # Responders and their registry.
//!
//! - [`Respond`] - trait for async event handlers
//! - [`ResponderFn`] - closure-backed responder
//! - [`ResponderRef`] - shared handle (`Arc<dyn Respond>`)
//! - [`RegistryBuilder`] / [`Registry`] - pattern → responders, built once then read-only

mod registry;
mod responder;
mod responder_fn;

pub use registry::{Registry, RegistryBuilder, Responder};
pub use responder::{Call, Respond, ResponderRef};
pub use responder_fn::ResponderFn;
