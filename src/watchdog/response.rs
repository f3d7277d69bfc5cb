//! # Failure-response callback contract.
//!
//! A [`FailureResponse`] is the action a [`HeartbeatWatchdog`](crate::HeartbeatWatchdog)
//! runs when a component's failure is confirmed (or explicitly reported). It
//! fires at most once per detected failure, on a detached task the watchdog
//! does not track further, and must not block indefinitely.
//!
//! [`ResponseFn`] adapts a plain closure, producing a fresh future per
//! invocation.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// Shared reference to a failure response (`Arc<dyn FailureResponse>`).
pub type ResponseRef = Arc<dyn FailureResponse>;

/// Zero-argument failure action.
#[async_trait]
pub trait FailureResponse: Send + Sync + 'static {
    /// Runs the response. Invoked on a detached, fire-and-forget task.
    async fn invoke(&self);
}

/// Function-backed failure response.
pub struct ResponseFn<F> {
    f: F,
}

impl<F> ResponseFn<F> {
    /// Creates a new function-backed response.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the response and returns it as a shared handle.
    ///
    /// ## Example
    /// ```
    /// use taskwarden::{ResponseFn, ResponseRef};
    ///
    /// let resp: ResponseRef = ResponseFn::arc(|| async {
    ///     // restart the stuck service...
    /// });
    /// ```
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> FailureResponse for ResponseFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn invoke(&self) {
        (self.f)().await
    }
}
