//! # Heartbeat watchdog: hang detection via proactive liveness reports.
//!
//! Components register with a period and a [`FailureResponse`]; a shared
//! timer applies a two-strike probation policy to anything that goes silent.
//!
//! ## Contents
//! - [`HeartbeatWatchdog`], [`MonitorKey`], [`HeartbeatStatus`] — the monitor
//! - [`FailureResponse`], [`ResponseFn`], [`ResponseRef`] — the callback contract

mod monitor;
mod response;

pub use monitor::{HeartbeatStatus, HeartbeatWatchdog, MonitorKey};
pub use response::{FailureResponse, ResponseFn, ResponseRef};
