//! # Global runtime configuration.
//!
//! Provides [`Config`], the settings shared by apps, supervisors and the runtime loop.
//!
//! Config is used in two places:
//! 1. **App creation**: `AppBuilder::with_config(cfg)` (concurrency, poll timeout, bus capacity)
//! 2. **Runtime creation**: `Runtime::new(cfg)` (health-check cadence, shutdown grace)
//!
//! ## Sentinel values
//! - `concurrency = 0` → only the consumer slot is staffed (no workers); the queue is never drained
//! - `poll_timeout = 0s` → clamped to 1ms so idle workers still yield
//! - `check_interval = 0s` → clamped to 1ms
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Global configuration for the motion runtime.
///
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of worker slots per app (`"worker 1"` .. `"worker N"`).
    ///
    /// With `0` the consumer still routes records, but nothing drains the
    /// [`DispatchQueue`](crate::DispatchQueue), which is unbounded and keeps growing.
    /// [`AppBuilder::build`](crate::AppBuilder::build) logs a warning in that case.
    pub concurrency: usize,

    /// Longest time a worker waits on an empty queue before re-checking for shutdown.
    pub poll_timeout: Duration,

    /// Interval between two `check_workers` ticks of the runtime loop.
    pub check_interval: Duration,

    /// Maximum time to wait for units to stop cooperatively before aborting them.
    pub grace: Duration,

    /// Capacity of the runtime event bus ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the worker poll timeout, never zero.
    #[inline]
    pub fn poll_timeout_clamped(&self) -> Duration {
        self.poll_timeout.max(Duration::from_millis(1))
    }

    /// Returns the supervision tick period, never zero.
    #[inline]
    pub fn check_interval_clamped(&self) -> Duration {
        self.check_interval.max(Duration::from_millis(1))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `concurrency = 1`
    /// - `poll_timeout = 500ms`
    /// - `check_interval = 1s`
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_timeout: Duration::from_millis(500),
            check_interval: Duration::from_secs(1),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}
