//! # Task lifecycle observer contract.
//!
//! [`TaskObserver`] is the extension point for reacting to a
//! [`SupervisedTask`]'s lifecycle: `started`, `terminated`, `stop_requested`.
//! The supervisor plugs in through the same contract — its `started` handler
//! is what makes self-registration work.
//!
//! ## Delivery rules
//! - Callbacks run on the task's worker (or, for `stop_requested`, on the
//!   stopping caller), **synchronously**, in registration order.
//! - A snapshot of the observer set is taken before notification, so a
//!   handler may add or remove observers without affecting the in-flight
//!   round.
//! - A panicking handler is caught and logged; it never kills the worker and
//!   the remaining observers are still notified.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::error;

use crate::error::panic_message;
use crate::tasks::SupervisedTask;

/// Contract for task lifecycle observers.
///
/// All methods default to no-ops so an observer implements only the events
/// it cares about.
#[async_trait]
pub trait TaskObserver: Send + Sync + 'static {
    /// The task's worker is up and about to enter its loop body.
    async fn started(&self, _task: &Arc<SupervisedTask>) {}

    /// The loop body returned (normally or via a logged fault).
    async fn terminated(&self, _task: &Arc<SupervisedTask>) {}

    /// A caller asked the task to stop, before the worker is signaled.
    async fn stop_requested(&self, _task: &Arc<SupervisedTask>) {}
}

/// Ordered, deduplicated set of observers with snapshot notification.
pub(crate) struct ObserverSet {
    inner: Mutex<Vec<Arc<dyn TaskObserver>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Appends an observer unless the same instance is already registered.
    pub fn add(&self, observer: Arc<dyn TaskObserver>) {
        let mut inner = self.inner.lock().unwrap();
        let present = inner
            .iter()
            .any(|o| std::ptr::eq::<dyn TaskObserver>(&**o as _, &*observer as _));
        if !present {
            inner.push(observer);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn TaskObserver>> {
        self.inner.lock().unwrap().clone()
    }

    pub async fn notify_started(&self, task: &Arc<SupervisedTask>) {
        for obs in self.snapshot() {
            Self::guarded(task, obs.started(task)).await;
        }
    }

    pub async fn notify_terminated(&self, task: &Arc<SupervisedTask>) {
        for obs in self.snapshot() {
            Self::guarded(task, obs.terminated(task)).await;
        }
    }

    pub async fn notify_stop_requested(&self, task: &Arc<SupervisedTask>) {
        for obs in self.snapshot() {
            Self::guarded(task, obs.stop_requested(task)).await;
        }
    }

    /// Runs one observer callback, catching and logging any panic.
    async fn guarded<F>(task: &Arc<SupervisedTask>, fut: F)
    where
        F: std::future::Future<Output = ()>,
    {
        if let Err(payload) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            error!(
                task = %task.name(),
                panic = %panic_message(payload.as_ref()),
                "task observer panicked"
            );
        }
    }
}
