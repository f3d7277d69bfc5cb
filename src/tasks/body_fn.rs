//! # Function-backed loop body (`BodyFn`)
//!
//! [`BodyFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a
//! fresh future per run. Each restart re-invokes the closure, so there is no
//! hidden mutable state carried across runs; share state explicitly through
//! an `Arc<...>` captured by the closure when you need it.
//!
//! ## Example
//! ```
//! use tokio_util::sync::CancellationToken;
//! use taskwarden::{BodyFn, BodyRef, TaskError};
//!
//! let body: BodyRef = BodyFn::arc(|ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     // do work...
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::body::TaskBody;

/// Function-backed loop body implementation.
///
/// Wraps a closure that *creates* a new future per run.
pub struct BodyFn<F> {
    f: F,
}

impl<F> BodyFn<F> {
    /// Creates a new function-backed body.
    ///
    /// Prefer [`BodyFn::arc`] when you immediately need a [`BodyRef`](crate::BodyRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the body and returns it as a shared handle (`Arc<Self>`).
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> TaskBody for BodyFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }
}
