//! # TaskSupervisor: liveness polling and automatic restart.
//!
//! The supervisor keeps a name-keyed registry of [`SupervisedTask`]s and runs
//! a background scan loop that restarts any task whose run-flag is set but
//! whose worker has died. It complements the heartbeat watchdog: polling
//! catches a worker that died without reporting anything, the watchdog
//! catches one that is alive but stuck.
//!
//! ## Architecture
//! ```text
//! caller ──► task.start(Some(supervisor), t)
//!                  │
//!            started event ──► supervisor.started() ──► registry.insert
//!                                                            │
//!                                                   changed.notify (fresh only)
//!                                                            │
//! scan loop:  wait(monitor_period | changed | cancel) ◄──────┘
//!               └─► snapshot registry (lock released)
//!                     └─► for each task:
//!                           run-flag set, worker dead?
//!                             └─► task.start(Some(self), restart_timeout)
//! ```
//!
//! ## Rules
//! - The registry lock is **never** held while calling into a task; the scan
//!   works off a snapshot (self-registration re-enters the registry).
//! - A failed restart stays registered and is retried on the next scan.
//! - A graceful `stop()` deregisters through the `stop_requested` event, so
//!   stopped tasks are not resurrected.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::core::registry::TaskRegistry;
use crate::core::worker::Worker;
use crate::observers::TaskObserver;
use crate::tasks::SupervisedTask;

/// Registry plus scan loop; an explicit instance owned by the caller.
pub struct TaskSupervisor {
    config: Config,
    registry: TaskRegistry,
    worker: Worker,
    me: Weak<TaskSupervisor>,
}

impl TaskSupervisor {
    /// Creates a supervisor with the given configuration.
    ///
    /// Scanning begins once [`start`](Self::start) is called.
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            config,
            registry: TaskRegistry::new(),
            worker: Worker::new("task-supervisor"),
            me: me.clone(),
        })
    }

    /// Starts the scan loop; bounded by `timeout`, idempotent while running.
    pub async fn start(&self, timeout: Duration) -> bool {
        if self.worker.is_alive().await {
            return true;
        }
        let Some(me) = self.me.upgrade() else {
            return false;
        };

        self.worker
            .launch(timeout, move |cancel, ready| async move {
                ready.notify_one();
                me.scan_loop(cancel).await;
            })
            .await
    }

    /// Stops the scan loop; registered tasks are left untouched.
    pub async fn stop(&self, timeout: Duration) -> bool {
        self.worker.halt(timeout).await
    }

    /// Adds a task to the registry (same effect as the `started` event).
    pub fn register_task(&self, task: &Arc<SupervisedTask>) {
        self.registry.insert(task);
    }

    /// Removes the named task from the registry; returns whether it was present.
    pub fn deregister_task(&self, name: &str) -> bool {
        self.registry.remove(name)
    }

    /// Returns sorted names of currently registered tasks.
    pub fn task_names(&self) -> Vec<String> {
        self.registry.names()
    }

    async fn scan_loop(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.registry.changed().notified() => {}
                _ = time::sleep(self.config.monitor_period) => {}
            }
            self.scan_once().await;
        }
    }

    /// One liveness pass over a registry snapshot.
    async fn scan_once(&self) {
        let Some(me) = self.me.upgrade() else {
            return;
        };

        for task in self.registry.snapshot() {
            if !task.should_run() || task.is_running().await {
                continue;
            }
            if !self.registry.contains(task.name()) {
                continue; // deregistered while we were scanning
            }

            warn!(task = %task.name(), "supervised task found dead; restarting");
            if !task
                .start(Some(Arc::clone(&me)), self.config.restart_timeout)
                .await
            {
                warn!(task = %task.name(), "restart did not complete in time; will retry next scan");
            }
        }
    }
}

#[async_trait]
impl TaskObserver for TaskSupervisor {
    /// Self-registration: a task started with this supervisor lands in the registry.
    async fn started(&self, task: &Arc<SupervisedTask>) {
        self.registry.insert(task);
    }

    /// Termination keeps the task registered — that is the restart trigger.
    async fn terminated(&self, _task: &Arc<SupervisedTask>) {}

    /// Graceful stop suppresses auto-restart.
    async fn stop_requested(&self, task: &Arc<SupervisedTask>) {
        self.registry.remove(task.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::tasks::BodyFn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BOUND: Duration = Duration::from_secs(2);

    fn quick_config() -> Config {
        Config {
            monitor_period: Duration::from_millis(50),
            restart_timeout: Duration::from_secs(1),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_start_wires_self_registration() {
        let sup = TaskSupervisor::new(quick_config());
        assert!(sup.start(BOUND).await);

        let task = SupervisedTask::new(
            "wired",
            BodyFn::arc(|ctx: tokio_util::sync::CancellationToken| async move {
                ctx.cancelled().await;
                Err(TaskError::Canceled)
            }),
        );
        assert!(task.start(Some(Arc::clone(&sup)), BOUND).await);
        assert_eq!(sup.task_names(), vec!["wired"]);

        task.stop(BOUND).await;
        sup.stop(BOUND).await;
    }

    #[tokio::test]
    async fn test_dead_task_is_restarted() {
        let sup = TaskSupervisor::new(quick_config());
        assert!(sup.start(BOUND).await);

        let runs = Arc::new(AtomicUsize::new(0));
        let runs_c = Arc::clone(&runs);
        // Dies immediately on every run; only the supervisor brings it back.
        let task = SupervisedTask::new(
            "mayfly",
            BodyFn::arc(move |_ctx| {
                let runs = Arc::clone(&runs_c);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), TaskError>(())
                }
            }),
        );

        assert!(task.start(Some(Arc::clone(&sup)), BOUND).await);
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(
            runs.load(Ordering::SeqCst) >= 3,
            "expected repeated restarts, saw {}",
            runs.load(Ordering::SeqCst)
        );

        task.stop(BOUND).await;
        sup.stop(BOUND).await;
    }

    #[tokio::test]
    async fn test_graceful_stop_suppresses_restart() {
        let sup = TaskSupervisor::new(quick_config());
        assert!(sup.start(BOUND).await);

        let runs = Arc::new(AtomicUsize::new(0));
        let runs_c = Arc::clone(&runs);
        let task = SupervisedTask::new(
            "courteous",
            BodyFn::arc(move |ctx: tokio_util::sync::CancellationToken| {
                let runs = Arc::clone(&runs_c);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    ctx.cancelled().await;
                    Err(TaskError::Canceled)
                }
            }),
        );

        assert!(task.start(Some(Arc::clone(&sup)), BOUND).await);
        assert!(task.stop(BOUND).await);
        assert!(sup.task_names().is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!task.is_running().await);

        sup.stop(BOUND).await;
    }

    #[tokio::test]
    async fn test_manual_registration_and_collision() {
        let sup = TaskSupervisor::new(quick_config());

        let first = SupervisedTask::new("dup", BodyFn::arc(|_ctx| async { Ok::<_, TaskError>(()) }));
        let second =
            SupervisedTask::new("dup", BodyFn::arc(|_ctx| async { Ok::<_, TaskError>(()) }));
        sup.register_task(&first);
        sup.register_task(&second);

        assert_eq!(sup.task_names(), vec!["dup"]);
        let snapshot = sup.registry.snapshot();
        assert!(Arc::ptr_eq(&snapshot[0], &second));

        assert!(sup.deregister_task("dup"));
        assert!(!sup.deregister_task("dup"));
    }
}
