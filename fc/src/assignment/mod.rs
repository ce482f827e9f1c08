//! Assignment engine
//!
//! Filters agents able to take a task, then selects among them with a
//! pattern-specific strategy and commits the selection.

mod core;
pub mod scoring;

pub use core::{AssignmentEngine, Selection};
