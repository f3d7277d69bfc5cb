//! # SupervisedTask: one restartable worker around one loop body.
//!
//! A [`SupervisedTask`] binds a unique name, a caller-supplied
//! [`TaskBody`](crate::TaskBody), and a worker lifecycle together, and
//! reports lifecycle transitions to registered
//! [`TaskObserver`](crate::TaskObserver)s.
//!
//! ## Lifecycle
//! ```text
//! start(supervisor, timeout)
//!   ├─► live worker?  → stop it first (bounded) — never overlapping runs
//!   ├─► supervisor given → registered as observer (self-registration)
//!   └─► spawn worker:
//!         notify started ─► signal readiness ─► body.run(cancel)
//!                                                   │
//!                             Ok / Err / panic  ◄───┘  (logged at boundary)
//!                                                   │
//!                                         notify terminated
//!
//! stop(timeout)
//!   ├─► not running and not flagged → no-op (idempotent)
//!   └─► notify stop_requested ─► clear run-flag ─► cancel ─► bounded join
//! ```
//!
//! ## Rules
//! - Termination does **not** clear the run-flag; a dead worker with the flag
//!   still set is exactly what the supervisor restarts.
//! - Body faults (`Err` or panic) are logged and become ordinary termination;
//!   nothing aborts the process.
//! - `start`/`stop` are serialized per task; restart is strictly
//!   stop-then-start.

use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, error, warn};

use crate::core::worker::Worker;
use crate::core::TaskSupervisor;
use crate::error::{panic_message, TaskError};
use crate::observers::observer::ObserverSet;
use crate::observers::TaskObserver;
use crate::tasks::body::BodyRef;

/// A named, restartable unit of supervised work.
pub struct SupervisedTask {
    name: String,
    body: BodyRef,
    worker: Worker,
    observers: ObserverSet,
    /// Serializes start/stop so runs never overlap.
    lifecycle: Mutex<()>,
    me: Weak<SupervisedTask>,
}

impl SupervisedTask {
    /// Creates a task around the given loop body.
    ///
    /// The name is the task's identity: the supervisor registry is keyed by
    /// it, and every log line carries it.
    pub fn new(name: impl Into<String>, body: BodyRef) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            worker: Worker::new(name.clone()),
            name,
            body,
            observers: ObserverSet::new(),
            lifecycle: Mutex::new(()),
            me: me.clone(),
        })
    }

    /// Returns the task's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the task *should* be running (set by start, cleared by stop).
    pub fn should_run(&self) -> bool {
        self.worker.run_flag()
    }

    /// Returns whether a worker is currently live.
    pub async fn is_running(&self) -> bool {
        self.worker.is_alive().await
    }

    /// Registers a lifecycle observer (same instance registers once).
    pub fn add_observer(&self, observer: Arc<dyn TaskObserver>) {
        self.observers.add(observer);
    }

    /// Starts the task, stopping any live worker first.
    ///
    /// If `supervisor` is given it is registered as an observer before the
    /// worker spawns, so a single call wires both execution and supervision:
    /// the `started` notification performs the supervisor's
    /// self-registration.
    ///
    /// Blocks the caller until the worker reports started or `timeout`
    /// elapses; returns whether it started in time. A prior worker that does
    /// not stop within `timeout` aborts the restart (`false`) — runs never
    /// overlap.
    pub async fn start(&self, supervisor: Option<Arc<TaskSupervisor>>, timeout: Duration) -> bool {
        let Some(me) = self.me.upgrade() else {
            return false;
        };
        let _guard = self.lifecycle.lock().await;

        if self.worker.is_alive().await && !self.stop_locked(timeout).await {
            warn!(task = %self.name, "previous worker still live; restart aborted");
            return false;
        }

        if let Some(sup) = supervisor {
            self.observers.add(sup);
        }

        let task = me;
        self.worker
            .launch(timeout, move |cancel, ready| async move {
                task.observers.notify_started(&task).await;
                ready.notify_one();

                let outcome =
                    std::panic::AssertUnwindSafe(task.body.run(cancel)).catch_unwind().await;
                match outcome {
                    Ok(Ok(())) => debug!(task = %task.name, "loop body completed"),
                    Ok(Err(TaskError::Canceled)) => {
                        debug!(task = %task.name, "loop body stopped cooperatively")
                    }
                    Ok(Err(err)) => {
                        warn!(task = %task.name, error = %err, "loop body failed")
                    }
                    Err(payload) => error!(
                        task = %task.name,
                        panic = %panic_message(payload.as_ref()),
                        "loop body panicked"
                    ),
                }

                task.observers.notify_terminated(&task).await;
            })
            .await
    }

    /// Stops the task: stop-request notification, run-flag clear, cancel,
    /// bounded join.
    ///
    /// Idempotent — a second call on a stopped task is a no-op returning
    /// `true`. Returns whether the worker wound down within `timeout`.
    pub async fn stop(&self, timeout: Duration) -> bool {
        let _guard = self.lifecycle.lock().await;
        self.stop_locked(timeout).await
    }

    async fn stop_locked(&self, timeout: Duration) -> bool {
        if !self.worker.run_flag() && !self.worker.is_alive().await {
            return true;
        }

        if let Some(me) = self.me.upgrade() {
            self.observers.notify_stop_requested(&me).await;
        }
        self.worker.halt(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::BodyFn;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio_util::sync::CancellationToken;

    const BOUND: Duration = Duration::from_secs(2);

    fn waiting_task(name: &str) -> Arc<SupervisedTask> {
        SupervisedTask::new(
            name,
            BodyFn::arc(|ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Err(TaskError::Canceled)
            }),
        )
    }

    #[tokio::test]
    async fn test_start_stop_roundtrip() {
        let task = waiting_task("roundtrip");
        assert!(task.start(None, BOUND).await);
        assert!(task.should_run());
        assert!(task.is_running().await);

        assert!(task.stop(BOUND).await);
        assert!(!task.should_run());
        assert!(!task.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let task = waiting_task("twice");
        assert!(task.start(None, BOUND).await);
        assert!(task.stop(BOUND).await);
        assert!(task.stop(BOUND).await);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let task = waiting_task("never-started");
        assert!(task.stop(BOUND).await);
    }

    struct EventLog(Arc<StdMutex<Vec<&'static str>>>);

    #[async_trait]
    impl crate::TaskObserver for EventLog {
        async fn started(&self, _task: &Arc<SupervisedTask>) {
            self.0.lock().unwrap().push("started");
        }
        async fn terminated(&self, _task: &Arc<SupervisedTask>) {
            self.0.lock().unwrap().push("terminated");
        }
        async fn stop_requested(&self, _task: &Arc<SupervisedTask>) {
            self.0.lock().unwrap().push("stop_requested");
        }
    }

    #[tokio::test]
    async fn test_observer_sees_full_lifecycle_in_order() {
        let task = waiting_task("observed");
        let log = Arc::new(StdMutex::new(Vec::new()));
        task.add_observer(Arc::new(EventLog(Arc::clone(&log))));

        assert!(task.start(None, BOUND).await);
        assert!(task.stop(BOUND).await);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["started", "stop_requested", "terminated"]
        );
    }

    #[tokio::test]
    async fn test_failing_body_terminates_but_stays_flagged() {
        let task = SupervisedTask::new(
            "failing",
            BodyFn::arc(|_ctx| async { Err(TaskError::fail("disk on fire")) }),
        );
        let log = Arc::new(StdMutex::new(Vec::new()));
        task.add_observer(Arc::new(EventLog(Arc::clone(&log))));

        assert!(task.start(None, BOUND).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!task.is_running().await);
        // The restart trigger: dead worker, flag still set.
        assert!(task.should_run());
        assert_eq!(*log.lock().unwrap(), vec!["started", "terminated"]);
    }

    #[tokio::test]
    async fn test_panicking_body_still_reports_termination() {
        let task = SupervisedTask::new(
            "panicking",
            BodyFn::arc(|_ctx| async {
                panic!("unexpected");
                #[allow(unreachable_code)]
                Ok::<(), TaskError>(())
            }),
        );
        let log = Arc::new(StdMutex::new(Vec::new()));
        task.add_observer(Arc::new(EventLog(Arc::clone(&log))));

        assert!(task.start(None, BOUND).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!task.is_running().await);
        assert!(task.should_run());
        assert_eq!(*log.lock().unwrap(), vec!["started", "terminated"]);
    }

    #[tokio::test]
    async fn test_restart_never_overlaps() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let (active_c, peak_c, runs_c) =
            (Arc::clone(&active), Arc::clone(&peak), Arc::clone(&runs));
        let task = SupervisedTask::new(
            "relaunch",
            BodyFn::arc(move |ctx: CancellationToken| {
                let active = Arc::clone(&active_c);
                let peak = Arc::clone(&peak_c);
                let runs = Arc::clone(&runs_c);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    ctx.cancelled().await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Err(TaskError::Canceled)
                }
            }),
        );

        assert!(task.start(None, BOUND).await);
        assert!(task.start(None, BOUND).await);
        assert!(task.stop(BOUND).await);

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
