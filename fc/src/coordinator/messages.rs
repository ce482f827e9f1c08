//! Message types for the Coordinator

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::domain::{Agent, AgentId, CoordinationTask, GroupId, TaskId, TaskStatus};
use crate::engine::CycleReport;
use crate::error::{EngineError, RegistrationError, SubmitError};
use crate::executor::ExecutionEvent;
use crate::queue::QueueStats;

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Add an agent to the registry
    RegisterAgent {
        agent: Box<Agent>,
        reply_tx: oneshot::Sender<Result<GroupId, RegistrationError>>,
    },

    /// Liveness signal from an agent
    Heartbeat {
        agent_id: AgentId,
        reply_tx: oneshot::Sender<Result<(), EngineError>>,
    },

    /// Queue a new task
    SubmitTask {
        task: Box<CoordinationTask>,
        reply_tx: oneshot::Sender<Result<TaskId, SubmitError>>,
    },

    /// Withdraw a queued or active task
    CancelTask {
        task_id: TaskId,
        reply_tx: oneshot::Sender<Result<TaskStatus, EngineError>>,
    },

    /// Toggle operator maintenance on an agent
    SetMaintenance {
        agent_id: AgentId,
        on: bool,
        reply_tx: oneshot::Sender<Result<(), EngineError>>,
    },

    /// Execution progress, applied on the next tick
    Report { event: ExecutionEvent },

    /// Run one coordination cycle now
    Tick { reply_tx: oneshot::Sender<CycleReport> },

    /// Shutdown the coordinator
    Shutdown,
}

/// Read-only copy of engine state, republished after every change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub agents: Vec<Agent>,
    #[serde(rename = "active-tasks")]
    pub active_tasks: Vec<CoordinationTask>,
    pub queue: Vec<CoordinationTask>,
    #[serde(rename = "queue-stats")]
    pub queue_stats: QueueStats,
    pub ticks: u64,
    #[serde(rename = "last-report")]
    pub last_report: Option<CycleReport>,
}

impl Snapshot {
    pub fn agent(&self, agent_id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| &a.id == agent_id)
    }

    /// Where the task currently is, if anywhere visible
    pub fn task(&self, task_id: &TaskId) -> Option<&CoordinationTask> {
        self.active_tasks
            .iter()
            .chain(self.queue.iter())
            .find(|t| &t.id == task_id)
    }
}
