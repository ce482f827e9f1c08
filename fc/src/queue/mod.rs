//! Task queue
//!
//! Holds Pending and Delayed coordination tasks ordered by priority and
//! deadline, gates them on dependencies, and expires stale entries.

mod core;
mod entry;

pub use core::{DrainOutcome, QueueStats, TaskQueue};
pub use entry::QueuedTask;
