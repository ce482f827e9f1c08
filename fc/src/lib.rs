//! fleetcoord - multi-agent task coordination engine
//!
//! fleetcoord keeps a registry of heterogeneous agents (workers,
//! supervisors, specialists, coordinators), accepts prioritized tasks that
//! need a set of capabilities, and assigns each task to a group of agents
//! under a coordination pattern. A periodic cycle watches execution,
//! replaces failed agents, resolves conflicts and rebalances load.
//!
//! # Core Concepts
//!
//! - **Single owner**: One coordinator task owns all state; callers send requests
//! - **Non-blocking cycle**: Dispatch is fire-and-forget, results arrive as events
//! - **Injected edges**: Executor, metrics source and clock are traits
//!
//! # Modules
//!
//! - [`domain`] - Agents, tasks, identifiers and topologies
//! - [`registry`] - Agent registry, capability groups and the hierarchy
//! - [`queue`] - Priority task queue with deadlines and dependencies
//! - [`assignment`] - Agent scoring and selection
//! - [`pattern`] - Topology construction per coordination pattern
//! - [`monitor`] - Execution event handling and agent replacement
//! - [`conflict`] - Resource and pattern-preference conflicts
//! - [`optimizer`] - Load rebalancing
//! - [`engine`] - The coordination cycle
//! - [`coordinator`] - Actor wrapper and client handle
//! - [`executor`] - Dispatch contract and executors
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod assignment;
pub mod cli;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod domain;
pub mod engine;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod monitor;
pub mod optimizer;
pub mod pattern;
pub mod queue;
pub mod registry;
pub mod simulate;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use coordinator::{CoordRequest, Coordinator, CoordinatorHandle, Snapshot};
pub use domain::{
    Agent, AgentId, AgentStatus, AgentType, CoordinationPattern, CoordinationTask, GroupId, TaskId, TaskStatus,
    Topology,
};
pub use engine::{CycleReport, Engine, EngineConfig};
pub use error::{AssignmentError, EngineError, ExecutorError, RegistrationError, SubmitError};
pub use executor::{DispatchHandle, DispatchRequest, ExecutionEvent, ExecutionReporter, Executor, LocalExecutor};
pub use metrics::{MetricsSource, StaticMetrics};
