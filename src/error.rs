//! Error types used by the taskwarden runtime.
//!
//! This module defines three error enums, one per failure surface:
//!
//! - [`TaskError`] — outcomes of a supervised task's loop body.
//! - [`WatchdogError`] — heartbeat-monitor registration failures.
//! - [`ProcessError`] — child-process launch failures.
//!
//! Bounded waits expiring (`start`, `stop`, `wait_for_completion`) are **not**
//! errors; they surface as `false` returns. The enums cover the failures that
//! carry a cause worth propagating.

use thiserror::Error;

/// # Errors produced by a supervised task's loop body.
///
/// A body returning `Err` is logged at the worker boundary and treated as
/// ordinary termination: the task stays eligible for supervisor restart.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The loop body failed; the task terminates and may be restarted.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The loop body observed a stop request and exited cooperatively.
    #[error("stop requested")]
    Canceled,
}

impl TaskError {
    /// Creates a [`TaskError::Fail`] from any displayable cause.
    pub fn fail(error: impl Into<String>) -> Self {
        Self::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskwarden::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }
}

/// # Errors produced by heartbeat-monitor registration.
///
/// Capacity overflow is reported to the caller and logged; it is never a
/// silent drop and never grows the slot table past its configured limit.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WatchdogError {
    /// Every monitor slot is occupied; the component was not registered.
    #[error("monitor capacity exhausted ({capacity} slots)")]
    CapacityExhausted {
        /// The configured slot limit.
        capacity: usize,
    },
}

impl WatchdogError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchdogError::CapacityExhausted { .. } => "watchdog_capacity_exhausted",
        }
    }
}

/// # Errors produced by launching a managed child process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The child could not be spawned.
    #[error("failed to spawn {name}: {reason}")]
    SpawnFailed {
        /// Diagnostic process name.
        name: String,
        /// The underlying OS error message.
        reason: String,
    },
}

impl ProcessError {
    /// Creates a [`ProcessError::SpawnFailed`].
    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::SpawnFailed { .. } => "process_spawn_failed",
        }
    }
}

/// Renders a panic payload into a loggable message.
///
/// Panic payloads are `Box<dyn Any>`; the common cases are `&'static str` and
/// `String`, anything else is reported as unknown.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_labels() {
        assert_eq!(TaskError::fail("x").as_label(), "task_failed");
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    }

    #[test]
    fn test_watchdog_error_display() {
        let err = WatchdogError::CapacityExhausted { capacity: 8 };
        assert!(err.to_string().contains("8 slots"));
        assert_eq!(err.as_label(), "watchdog_capacity_exhausted");
    }

    #[test]
    fn test_process_error_display() {
        let err = ProcessError::spawn_failed("backup", "no such file");
        assert!(err.to_string().contains("backup"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_panic_message_downcasts() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static str panic");
        assert_eq!(panic_message(boxed.as_ref()), "static str panic");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned panic"));
        assert_eq!(panic_message(boxed.as_ref()), "owned panic");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
