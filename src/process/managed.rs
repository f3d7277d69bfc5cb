//! # ManagedProcess: spawn, drain, and bounded wait-for-completion.
//!
//! A [`ManagedProcess`] runs one external command and owns the plumbing
//! around it: a [`drain`](super::drain) per monitored stream, a waiter that
//! records the exit code, and a completion signal callers can block on with a
//! bound.
//!
//! ## Architecture
//! ```text
//! launch(monitor_stderr)
//!   ├─► spawn child (stdout piped; stderr piped only when monitored;
//!   │                PATH augmented with the standard system directories)
//!   ├─► drain task per monitored stream ──► capture buffer + diagnostic sink
//!   └─► waiter task:
//!         child exit (or terminate() → kill)
//!           └─► join drains (bounded by drain_grace each)
//!                 └─► record exit code ─► signal completion
//!
//! wait_for_completion(timeout) ── observes the completion signal, bounded
//! ```
//!
//! ## Rules
//! - `launch` while the child is still running is a no-op (`Ok`).
//! - Captured output is complete only once `wait_for_completion` returned
//!   `true`; before that it holds whatever the drains have consumed so far.
//! - `exit_code()` is `None` until the child exited; a signal-terminated
//!   child reports `-1`.

use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ProcessError;
use crate::process::drain;

/// State of one launched child.
struct ProcessMonitor {
    cancel: CancellationToken,
    #[allow(dead_code)]
    waiter: JoinHandle<()>,
}

/// One external child process with drained output and a bounded wait.
pub struct ManagedProcess {
    name: String,
    argv: Vec<String>,
    drain_grace: Duration,
    stdout: Arc<StdMutex<Vec<u8>>>,
    stderr: Arc<StdMutex<Vec<u8>>>,
    exit: watch::Sender<Option<i32>>,
    pid: StdMutex<Option<u32>>,
    monitor: Mutex<Option<ProcessMonitor>>,
}

impl ManagedProcess {
    /// Creates a process around the given command line (`argv[0]` is the
    /// program). `name` is used only for diagnostics.
    pub fn new(name: impl Into<String>, argv: Vec<String>) -> Self {
        Self::with_config(name, argv, &Config::default())
    }

    /// Like [`new`](Self::new), with an explicit drain grace period from `config`.
    pub fn with_config(name: impl Into<String>, argv: Vec<String>, config: &Config) -> Self {
        let (exit, _) = watch::channel(None);
        Self {
            name: name.into(),
            argv,
            drain_grace: config.drain_grace,
            stdout: Arc::new(StdMutex::new(Vec::new())),
            stderr: Arc::new(StdMutex::new(Vec::new())),
            exit,
            pid: StdMutex::new(None),
            monitor: Mutex::new(None),
        }
    }

    /// Returns the diagnostic process name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns the child and its drains.
    ///
    /// stdout is always monitored; stderr only when `monitor_stderr`.
    /// Idempotent — launching while the child is still running returns `Ok`
    /// without relaunching; launching after completion starts a fresh run
    /// with cleared capture buffers.
    pub async fn launch(&self, monitor_stderr: bool) -> Result<(), ProcessError> {
        let mut monitor = self.monitor.lock().await;
        if monitor.is_some() && self.exit.borrow().is_none() {
            debug!(process = %self.name, "child already running; launch is a no-op");
            return Ok(());
        }

        let Some(program) = self.argv.first() else {
            return Err(ProcessError::spawn_failed(&self.name, "empty command line"));
        };

        let mut cmd = Command::new(program);
        cmd.args(&self.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if monitor_stderr {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if let Some(path) = augmented_path() {
            cmd.env("PATH", path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::spawn_failed(&self.name, e.to_string()))?;
        let pid = child.id();

        *self.pid.lock().unwrap() = pid;
        self.stdout.lock().unwrap().clear();
        self.stderr.lock().unwrap().clear();
        self.exit.send_replace(None);

        let cancel = CancellationToken::new();
        let mut drains = Vec::new();
        if let Some(out) = child.stdout.take() {
            drains.push(drain::spawn(
                self.name.clone(),
                "stdout",
                out,
                Arc::clone(&self.stdout),
                cancel.child_token(),
            ));
        }
        if let Some(err) = child.stderr.take() {
            drains.push(drain::spawn(
                self.name.clone(),
                "stderr",
                err,
                Arc::clone(&self.stderr),
                cancel.child_token(),
            ));
        }

        let waiter = tokio::spawn(Self::supervise_child(
            self.name.clone(),
            child,
            drains,
            cancel.clone(),
            self.exit.clone(),
            self.drain_grace,
        ));

        *monitor = Some(ProcessMonitor { cancel, waiter });
        info!(process = %self.name, ?pid, "child process launched");
        Ok(())
    }

    /// Waiter: child exit → drains joined (bounded) → exit code recorded.
    async fn supervise_child(
        name: String,
        mut child: Child,
        drains: Vec<JoinHandle<()>>,
        cancel: CancellationToken,
        exit: watch::Sender<Option<i32>>,
        drain_grace: Duration,
    ) {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                warn!(process = %name, "terminating child process");
                if let Err(error) = child.start_kill() {
                    warn!(process = %name, %error, "failed to kill child");
                }
                child.wait().await
            }
        };

        for drain in drains {
            if time::timeout(drain_grace, drain).await.is_err() {
                warn!(process = %name, ?drain_grace, "stream drain did not finish in time; detaching");
            }
        }

        let code = match status {
            Ok(status) => status.code().unwrap_or(-1),
            Err(error) => {
                error!(process = %name, %error, "waiting for child failed");
                -1
            }
        };
        info!(process = %name, code, "child process completed");
        exit.send_replace(Some(code));
    }

    /// Blocks until the child has completed (exit code recorded, drains
    /// joined) or `timeout` elapses; `false` means still running. Output
    /// captured so far stays intact either way.
    pub async fn wait_for_completion(&self, timeout: Duration) -> bool {
        let mut rx = self.exit.subscribe();
        let completed = matches!(
            time::timeout(timeout, rx.wait_for(|code| code.is_some())).await,
            Ok(Ok(_))
        );
        completed
    }

    /// Returns the child's exit code, or `None` while it has not exited.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit.borrow()
    }

    /// Cumulative captured stdout (complete once [`wait_for_completion`](Self::wait_for_completion) returned `true`).
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout.lock().unwrap()).into_owned()
    }

    /// Cumulative captured stderr; empty when stderr is not monitored.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr.lock().unwrap()).into_owned()
    }

    /// OS pid of the most recently launched child, while known.
    pub fn id(&self) -> Option<u32> {
        *self.pid.lock().unwrap()
    }

    /// Returns whether a launched child has not yet completed.
    pub fn is_running(&self) -> bool {
        self.id().is_some() && self.exit_code().is_none()
    }

    /// Destroys the child and closes its streams, unblocking the drains.
    pub async fn terminate(&self) {
        let monitor = self.monitor.lock().await;
        if let Some(monitor) = monitor.as_ref() {
            monitor.cancel.cancel();
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if let Ok(monitor) = self.monitor.try_lock() {
            if let Some(monitor) = monitor.as_ref() {
                monitor.cancel.cancel();
            }
        }
    }
}

/// PATH with the standard system directories appended, when PATH is present.
///
/// Compensates for minimal inherited environments (daemons, CI runners) where
/// ordinary tools are otherwise not found.
#[cfg(unix)]
fn augmented_path() -> Option<String> {
    const SYSTEM_PATH_DIRS: &[&str] = &["/usr/local/bin", "/usr/bin", "/bin", "/usr/sbin", "/sbin"];

    let mut path = std::env::var("PATH").ok()?;
    for dir in SYSTEM_PATH_DIRS {
        if !path.split(':').any(|p| p == *dir) {
            path.push(':');
            path.push_str(dir);
        }
    }
    Some(path)
}

#[cfg(not(unix))]
fn augmented_path() -> Option<String> {
    None
}
