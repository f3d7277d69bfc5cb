//! # Loop-body abstraction.
//!
//! This module defines the [`TaskBody`] trait: the single unit of work a
//! [`SupervisedTask`](crate::SupervisedTask) runs to completion on its worker.
//! The common handle type is [`BodyRef`], an `Arc<dyn TaskBody>` suitable for
//! sharing between the task and its restarts.
//!
//! A body receives a [`CancellationToken`] and must treat cancellation as a
//! cooperative stop signal: check it around blocking waits and return
//! promptly when it fires.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared reference to a loop body (`Arc<dyn TaskBody>`).
pub type BodyRef = Arc<dyn TaskBody>;

/// # Asynchronous, cancelable loop body.
///
/// Supplied once per concrete task and expected to run to completion. On
/// return — normal, `Err`, or panic — the owning task reports termination to
/// its observers; a body that exits while its task is still flagged as
/// running is the supervisor's restart trigger.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use taskwarden::{TaskBody, TaskError};
///
/// struct Poller;
///
/// #[async_trait]
/// impl TaskBody for Poller {
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         while !ctx.is_cancelled() {
///             // poll, then sleep cancellably...
///             tokio::select! {
///                 _ = ctx.cancelled() => break,
///                 _ = tokio::time::sleep(std::time::Duration::from_millis(250)) => {}
///             }
///         }
///         Err(TaskError::Canceled)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskBody: Send + Sync + 'static {
    /// Executes the body until completion or cancellation.
    ///
    /// Implementations should check `ctx` at their blocking waits and exit
    /// quickly once it is cancelled, returning [`TaskError::Canceled`].
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;
}
