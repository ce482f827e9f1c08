//! Execution collaborator contract
//!
//! The engine hands work to an [`Executor`] and learns about progress through
//! [`ExecutionEvent`]s sent on an [`ExecutionReporter`].

mod client;
mod local;
mod types;

pub use client::{Executor, RecordingExecutor};
pub use local::LocalExecutor;
pub use types::{DispatchHandle, DispatchRequest, ExecutionEvent, ExecutionReporter};
