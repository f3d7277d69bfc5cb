//! # Task lifecycle observers.
//!
//! [`TaskObserver`] is the callback contract a
//! [`SupervisedTask`](crate::SupervisedTask) exposes to its supervisor and to
//! arbitrary listeners: `started`, `terminated`, `stop_requested`.

pub(crate) mod observer;

pub use observer::TaskObserver;
