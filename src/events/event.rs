//! # Runtime events emitted by supervisors, routers and workers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Slot events**: units started or found dead by the supervisor
//! - **Flow events**: records skipped by the router, responders that failed
//! - **Shutdown events**: shutdown requested, finished in time, or overran its grace
//!
//! These are observability records about the runtime, not the user events flowing
//! through the stream.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use motion::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ResponderFailed)
//!     .with_app("billing")
//!     .with_slot("worker 2")
//!     .with_event_name("invoice.paid")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::ResponderFailed);
//! assert_eq!(ev.slot.as_deref(), Some("worker 2"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Slot events ===
    /// A slot had no unit and a new one was spawned.
    ///
    /// Sets: `app`, `slot`
    SlotStarting,

    /// A slot's unit was found dead on a health check and released.
    ///
    /// Sets: `app`, `slot`
    SlotDied,

    // === Flow events ===
    /// The router could not decode a record and skipped it.
    ///
    /// Sets: `app`, `reason`
    RecordSkipped,

    /// A responder returned an error or panicked; the work item was dropped.
    ///
    /// Sets: `app`, `slot`, `event_name`, `pattern`, `reason`
    ResponderFailed,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or caller).
    ShutdownRequested,

    /// All units stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; remaining units were aborted.
    ///
    /// Sets: `reason` (stuck slots)
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `slot` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `slot` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Application name.
    pub app: Option<Arc<str>>,
    /// Slot (or subscriber) name.
    pub slot: Option<Arc<str>>,
    /// User event name involved, if any.
    pub event_name: Option<Arc<str>>,
    /// Responder pattern involved, if any.
    pub pattern: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            app: None,
            slot: None,
            event_name: None,
            pattern: None,
            reason: None,
        }
    }

    /// Attaches an application name.
    #[inline]
    pub fn with_app(mut self, app: impl Into<Arc<str>>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Attaches a slot name.
    #[inline]
    pub fn with_slot(mut self, slot: impl Into<Arc<str>>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// Attaches a user event name.
    #[inline]
    pub fn with_event_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    /// Attaches a responder pattern.
    #[inline]
    pub fn with_pattern(mut self, pattern: impl Into<Arc<str>>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_slot(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_slot(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::SlotStarting);
        let b = Event::new(EventKind::SlotDied);
        assert!(b.seq > a.seq);
    }
}
