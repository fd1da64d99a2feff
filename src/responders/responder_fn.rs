//! # Function-backed responder (`ResponderFn`)
//!
//! [`ResponderFn`] wraps a closure `F: Fn(Call) -> Fut`, producing a fresh future per
//! invocation. Shared state between invocations has to be captured explicitly
//! (e.g. an `Arc<...>` cloned into the closure).
//!
//! ## Example
//! ```rust
//! use motion::{Call, ResponderError, ResponderFn, ResponderRef};
//!
//! let r: ResponderRef = ResponderFn::arc("printer", |call: Call| async move {
//!     println!("{}", call.payload);
//!     Ok::<_, ResponderError>(())
//! });
//!
//! assert_eq!(r.name(), "printer");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ResponderError;
use crate::responders::responder::{Call, Respond};

/// Function-backed responder implementation.
#[derive(Debug)]
pub struct ResponderFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ResponderFn<F> {
    /// Creates a new function-backed responder.
    ///
    /// Prefer [`ResponderFn::arc`] when you immediately need a [`ResponderRef`](crate::ResponderRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the responder and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Respond for ResponderFn<F>
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ResponderError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, call: Call) -> Result<(), ResponderError> {
        (self.f)(call).await
    }
}
