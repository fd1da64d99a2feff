//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom observers (metrics, audit,
//! alerting) into the runtime. Each subscriber is driven by a dedicated worker loop fed by
//! a bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they block neither the publisher nor other subscribers.
//! - If a subscriber's queue overflows, events for that subscriber are dropped.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use async_trait::async_trait;
//! use motion::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct DeadSlots(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for DeadSlots {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::SlotDied {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "dead-slots" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for runtime event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
