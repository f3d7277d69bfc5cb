//! # Worker: the shared start/stop lifecycle primitive.
//!
//! Every long-running unit in the crate — a supervised task's loop, the
//! supervisor's scan loop, the watchdog's tick loop — is backed by one
//! [`Worker`]: a named spawned task, a run-flag, and bounded start/stop
//! waits.
//!
//! ## Rules
//! - The run-flag means "should be running"; a finished join handle with the
//!   flag still set is the restart trigger the supervisor looks for.
//! - `launch` blocks the caller until the worker future signals readiness or
//!   the bound expires; a late worker keeps running, the caller just gets
//!   `false`.
//! - `halt` clears the flag, cancels the token (waking any blocking wait in
//!   the worker), then joins bounded by the timeout. A worker that does not
//!   wind down in time is detached, logged, and reported as `false`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::panic_message;

/// State of one spawned worker run.
struct WorkerState {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Named lifecycle primitive: run-flag, join handle, cancellation token.
pub(crate) struct Worker {
    name: String,
    run_flag: AtomicBool,
    state: Mutex<Option<WorkerState>>,
}

impl Worker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_flag: AtomicBool::new(false),
            state: Mutex::new(None),
        }
    }

    /// Returns whether the unit *should* be running (set by launch, cleared by halt).
    pub fn run_flag(&self) -> bool {
        self.run_flag.load(Ordering::Acquire)
    }

    /// Returns whether a worker run is currently live.
    pub async fn is_alive(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .map(|s| !s.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawns a fresh worker run and waits (bounded) for it to report started.
    ///
    /// `make` receives the run's cancellation token and a readiness [`Notify`];
    /// the produced future must call `notify_one` on the latter once it is up.
    /// Returns whether readiness was signaled within `timeout`.
    ///
    /// Callers are responsible for stopping a previous run first; launching
    /// over a live run would orphan it.
    pub async fn launch<F, Fut>(&self, timeout: Duration, make: F) -> bool
    where
        F: FnOnce(CancellationToken, Arc<Notify>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let ready = Arc::new(Notify::new());
        let fut = make(cancel.clone(), Arc::clone(&ready));

        self.run_flag.store(true, Ordering::Release);
        let handle = tokio::spawn(fut);
        *self.state.lock().await = Some(WorkerState { handle, cancel });

        match time::timeout(timeout, ready.notified()).await {
            Ok(()) => {
                debug!(worker = %self.name, "worker started");
                true
            }
            Err(_) => {
                warn!(worker = %self.name, ?timeout, "worker did not report started in time");
                false
            }
        }
    }

    /// Stops the current run: clears the flag, cancels, joins bounded by `timeout`.
    ///
    /// Idempotent — with no live run this is a no-op returning `true`.
    pub async fn halt(&self, timeout: Duration) -> bool {
        self.run_flag.store(false, Ordering::Release);

        let state = self.state.lock().await.take();
        let Some(state) = state else {
            return true;
        };

        state.cancel.cancel();
        match time::timeout(timeout, state.handle).await {
            Ok(Ok(())) => {
                debug!(worker = %self.name, "worker stopped");
                true
            }
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    error!(
                        worker = %self.name,
                        panic = %panic_message(join_err.into_panic().as_ref()),
                        "worker panicked"
                    );
                }
                true
            }
            Err(_) => {
                warn!(worker = %self.name, ?timeout, "worker did not stop in time; detaching");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_launch_reports_started() {
        let worker = Worker::new("prompt");
        let ok = worker
            .launch(Duration::from_secs(1), |cancel, ready| async move {
                ready.notify_one();
                cancel.cancelled().await;
            })
            .await;

        assert!(ok);
        assert!(worker.run_flag());
        assert!(worker.is_alive().await);
        assert!(worker.halt(Duration::from_secs(1)).await);
        assert!(!worker.run_flag());
        assert!(!worker.is_alive().await);
    }

    #[tokio::test]
    async fn test_launch_times_out_on_slow_readiness() {
        let worker = Worker::new("sluggish");
        let ok = worker
            .launch(Duration::from_millis(50), |_cancel, ready| async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                ready.notify_one();
            })
            .await;

        assert!(!ok);
        // The run keeps going; halting it is still bounded and clean.
        worker.halt(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_halt_without_launch_is_noop() {
        let worker = Worker::new("idle");
        assert!(worker.halt(Duration::from_millis(10)).await);
        assert!(worker.halt(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_halt_detaches_stuck_worker() {
        let worker = Worker::new("stuck");
        worker
            .launch(Duration::from_secs(1), |_cancel, ready| async move {
                ready.notify_one();
                // Ignores cancellation entirely.
                tokio::time::sleep(Duration::from_secs(30)).await;
            })
            .await;

        assert!(!worker.halt(Duration::from_millis(50)).await);
        // Detached run no longer counts as alive.
        assert!(!worker.is_alive().await);
    }

    #[tokio::test]
    async fn test_finished_run_with_flag_set_reads_as_dead() {
        let worker = Worker::new("oneshot");
        worker
            .launch(Duration::from_secs(1), |_cancel, ready| async move {
                ready.notify_one();
            })
            .await;

        // Give the trivial run a moment to finish.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(worker.run_flag());
        assert!(!worker.is_alive().await);
    }
}
