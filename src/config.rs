//! # Global runtime configuration.
//!
//! [`Config`] defines the framework's timing and capacity knobs: the
//! supervisor's scan period and restart timeout, the watchdog's tick
//! resolution and slot capacity, and the grace period granted to stream
//! drains after a child process exits.
//!
//! Per-call bounds (the `timeout` argument of `start`/`stop`/
//! `wait_for_completion`) are deliberately not configuration: callers pass
//! them at each call site.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskwarden::Config;
//!
//! let mut cfg = Config::default();
//! cfg.monitor_period = Duration::from_secs(2);
//! cfg.capacity = 16;
//!
//! assert_eq!(cfg.capacity, 16);
//! ```

use std::time::Duration;

/// Timing and capacity configuration shared by the framework components.
#[derive(Clone, Debug)]
pub struct Config {
    /// Period between supervisor liveness scans.
    pub monitor_period: Duration,
    /// Bounded wait applied to supervisor-triggered restarts.
    pub restart_timeout: Duration,
    /// Watchdog tick resolution, shared across all monitor slots.
    pub resolution: Duration,
    /// Maximum number of watchdog monitor slots.
    pub capacity: usize,
    /// How long a process waiter waits for each stream drain after child exit.
    pub drain_grace: Duration,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `monitor_period = 5s`
    /// - `restart_timeout = 10s`
    /// - `resolution = 500ms`
    /// - `capacity = 32`
    /// - `drain_grace = 500ms`
    fn default() -> Self {
        Self {
            monitor_period: Duration::from_secs(5),
            restart_timeout: Duration::from_secs(10),
            resolution: Duration::from_millis(500),
            capacity: 32,
            drain_grace: Duration::from_millis(500),
        }
    }
}
