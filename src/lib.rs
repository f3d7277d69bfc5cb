//! # taskwarden
//!
//! **Taskwarden** is a supervised-task execution library for Rust.
//!
//! It keeps long-running async workers and external child processes alive,
//! detects two independent classes of failure — silent worker death and
//! logical hangs — and avoids the classic child-process pipe deadlock. It is
//! designed as a building block for control consoles and device managers
//! that must keep their pollers, sessions, and helper commands running
//! unattended.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!     │SupervisedTask│  │SupervisedTask│  │SupervisedTask│   (one worker each;
//!     │  (loop body) │  │  (loop body) │  │  (loop body) │    run-flag + bounded
//!     └──────┬───────┘  └──────┬───────┘  └──────┬───────┘    start/stop)
//!            │ started/terminated/stop_requested │
//!            ▼                 ▼                 ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  TaskSupervisor                                           │
//! │  - name→task registry (self-registration via `started`)   │
//! │  - scan loop: run-flag set + worker dead → restart        │
//! └───────────────────────────────────────────────────────────┘
//!
//! ┌───────────────────────────────────────────────────────────┐
//! │  HeartbeatWatchdog (independent)                          │
//! │  - components report liveness on a cadence                │
//! │  - two-strike probation → FailureResponse (detached)      │
//! └───────────────────────────────────────────────────────────┘
//!
//! ┌───────────────────────────────────────────────────────────┐
//! │  ManagedProcess (independent leaf)                        │
//! │  - child spawn, one StreamDrain per monitored stream      │
//! │  - waiter records exit code, bounded wait_for_completion  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Failure model
//! ```text
//! worker died silently        → supervisor scan notices (run-flag set,
//!                               worker dead) and restarts within one period
//! worker alive but stuck      → heartbeat deadline missed → one probation
//!                               period → failure response fires (≈ 2×period)
//! component self-diagnoses    → report Failed → response fires immediately
//! bounded wait expires        → `false` return, never an error
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types                                  |
//! |-----------------|---------------------------------------------------------|--------------------------------------------|
//! | **Supervision** | Registry + liveness scan with automatic restart.        | [`TaskSupervisor`]                         |
//! | **Tasks**       | Restartable workers around closure or trait bodies.     | [`SupervisedTask`], [`TaskBody`], [`BodyFn`] |
//! | **Observers**   | Lifecycle callbacks (started/terminated/stop-requested).| [`TaskObserver`]                           |
//! | **Watchdog**    | Heartbeat monitoring with probation and responses.      | [`HeartbeatWatchdog`], [`FailureResponse`] |
//! | **Processes**   | Child spawn with drained output and bounded waits.      | [`ManagedProcess`]                         |
//! | **Errors**      | Typed errors per failure surface.                       | [`TaskError`], [`WatchdogError`], [`ProcessError`] |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskwarden::{BodyFn, Config, SupervisedTask, TaskError, TaskSupervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let supervisor = TaskSupervisor::new(Config::default());
//!     supervisor.start(Duration::from_secs(5)).await;
//!
//!     let poller = SupervisedTask::new(
//!         "controller-poller",
//!         BodyFn::arc(|ctx: CancellationToken| async move {
//!             loop {
//!                 // poll the device...
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => return Err(TaskError::Canceled),
//!                     _ = tokio::time::sleep(Duration::from_millis(250)) => {}
//!                 }
//!             }
//!         }),
//!     );
//!
//!     // One call wires both execution and restart supervision.
//!     poller
//!         .start(Some(Arc::clone(&supervisor)), Duration::from_secs(5))
//!         .await;
//!
//!     // ... later: graceful stop deregisters, so the task stays down.
//!     poller.stop(Duration::from_secs(5)).await;
//!     supervisor.stop(Duration::from_secs(5)).await;
//! }
//! ```

mod config;
mod core;
mod error;
mod observers;
mod process;
mod tasks;
mod watchdog;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{ProcessError, TaskError, WatchdogError};
pub use self::core::TaskSupervisor;
pub use observers::TaskObserver;
pub use process::ManagedProcess;
pub use tasks::{BodyFn, BodyRef, SupervisedTask, TaskBody};
pub use watchdog::{
    FailureResponse, HeartbeatStatus, HeartbeatWatchdog, MonitorKey, ResponseFn, ResponseRef,
};
