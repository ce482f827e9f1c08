//! Domain types for the coordination engine
//!
//! Core records: Agent, CoordinationTask, and the Topology descriptor an
//! assignment carries.

mod agent;
mod id;
mod task;
mod topology;

pub use agent::{Agent, AgentStatus, AgentType, NEUTRAL_SCORE, metric};
pub use id::{AgentId, GroupId, TaskId, generate_id};
pub use task::{CoordinationPattern, CoordinationTask, TaskStatus};
pub use topology::{Channel, ChannelKind, DecisionPolicy, TiePolicy, Topology};
