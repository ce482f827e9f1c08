//! Agent registry
//!
//! Owns agent records, the status lifecycle driven by heartbeats and error
//! rates, capability-based coordination groups, and the supervisor forest.

mod core;
mod hierarchy;

pub use core::AgentRegistry;
pub use hierarchy::HierarchyGraph;
