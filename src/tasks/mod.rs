//! # Task abstractions and the supervised task itself.
//!
//! This module provides the task-side types:
//! - [`TaskBody`] - trait for implementing async cancelable loop bodies
//! - [`BodyFn`] - function-backed body implementation
//! - [`BodyRef`] - shared reference to a body (`Arc<dyn TaskBody>`)
//! - [`SupervisedTask`] - named, restartable worker around one body

mod body;
mod body_fn;
mod supervised;

pub use body::{BodyRef, TaskBody};
pub use body_fn::BodyFn;
pub use supervised::SupervisedTask;
