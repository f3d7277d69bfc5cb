//! # Managed child processes.
//!
//! [`ManagedProcess`] spawns an external command, drains its output streams
//! on dedicated tasks (the pipe-deadlock guard), and offers a bounded
//! wait-for-completion.

pub(crate) mod drain;
mod managed;

pub use managed::ManagedProcess;
