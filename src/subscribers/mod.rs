//! # Runtime event subscribers.
//!
//! [`Subscribe`] is the observer contract; [`SubscriberSet`] drives a group of subscribers,
//! one bounded queue and worker task each, fed by the supervisor's bus listener.
//!
//! ```text
//! Worker ── publish(Event) ──► Bus ──► supervisor listener ──► SubscriberSet::emit
//!                                                              ├──► subscriber 1
//!                                                              └──► subscriber N
//! ```

mod set;
mod subscribe;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;
