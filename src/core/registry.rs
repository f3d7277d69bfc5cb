//! # Name-keyed registry of supervised tasks.
//!
//! Owned by the [`TaskSupervisor`](crate::TaskSupervisor); guarded by its own
//! lock. The scan loop never calls into a task while holding it — it takes a
//! snapshot and releases the lock first, which is what keeps registry↔task
//! locking acyclic when a starting task re-enters through self-registration.
//!
//! ## Rules
//! - At most one entry per name. Registering a *different* instance under an
//!   existing name is a logged naming collision; last write wins, never fatal.
//! - A registration wakes the scan loop so a fresh task does not wait out a
//!   full idle period. Re-registering the same instance (the restart path)
//!   does not wake it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::tasks::SupervisedTask;

pub(crate) struct TaskRegistry {
    tasks: Mutex<HashMap<String, Arc<SupervisedTask>>>,
    changed: Notify,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            changed: Notify::new(),
        }
    }

    /// Inserts (or replaces) the entry for the task's name.
    pub fn insert(&self, task: &Arc<SupervisedTask>) {
        let name = task.name().to_string();
        let previous = self
            .tasks
            .lock()
            .unwrap()
            .insert(name.clone(), Arc::clone(task));

        match previous {
            Some(prev) if !Arc::ptr_eq(&prev, task) => {
                warn!(task = %name, "task name collision in registry; replacing previous instance");
                self.changed.notify_one();
            }
            Some(_) => {}
            None => {
                debug!(task = %name, "task registered");
                self.changed.notify_one();
            }
        }
    }

    /// Removes the entry for `name`; returns whether one was present.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.tasks.lock().unwrap().remove(name).is_some();
        if removed {
            debug!(task = %name, "task deregistered");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.lock().unwrap().contains_key(name)
    }

    /// Copies out every registered task; the lock is released on return.
    pub fn snapshot(&self) -> Vec<Arc<SupervisedTask>> {
        self.tasks.lock().unwrap().values().cloned().collect()
    }

    /// Returns sorted registered task names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.lock().unwrap().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Wakes whoever waits on registry changes.
    pub fn changed(&self) -> &Notify {
        &self.changed
    }
}
