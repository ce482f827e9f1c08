//! Dispatch and execution event types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{AgentId, CoordinationPattern, CoordinationTask, TaskId};
use crate::error::EngineError;

/// Instruction for one agent to start work on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(rename = "task-id")]
    pub task_id: TaskId,

    #[serde(rename = "agent-id")]
    pub agent_id: AgentId,

    #[serde(rename = "task-type")]
    pub task_type: String,

    pub pattern: CoordinationPattern,

    /// Passed through untouched
    #[serde(default)]
    pub command: serde_json::Value,
}

impl DispatchRequest {
    /// Build the request for one of the task's assigned agents
    pub fn for_agent(task: &CoordinationTask, agent_id: &AgentId) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_id: agent_id.clone(),
            task_type: task.task_type.clone(),
            pattern: task.coordination_pattern,
            command: task.command.clone(),
        }
    }

    /// One request per assigned agent, in assignment order
    pub fn for_task(task: &CoordinationTask) -> Vec<Self> {
        task.assigned_agent_ids
            .iter()
            .map(|agent_id| Self::for_agent(task, agent_id))
            .collect()
    }
}

/// Receipt for an accepted dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchHandle {
    #[serde(rename = "dispatch-id")]
    pub dispatch_id: Uuid,

    #[serde(rename = "task-id")]
    pub task_id: TaskId,

    #[serde(rename = "agent-id")]
    pub agent_id: AgentId,
}

impl DispatchHandle {
    pub fn new(request: &DispatchRequest) -> Self {
        Self {
            dispatch_id: Uuid::now_v7(),
            task_id: request.task_id.clone(),
            agent_id: request.agent_id.clone(),
        }
    }
}

/// Asynchronous report from the executor about a dispatched agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ExecutionEvent {
    /// The agent began physical execution
    Started {
        #[serde(rename = "task-id")]
        task_id: TaskId,
        #[serde(rename = "agent-id")]
        agent_id: AgentId,
    },

    /// The agent finished its part of the task
    Finished {
        #[serde(rename = "task-id")]
        task_id: TaskId,
        #[serde(rename = "agent-id")]
        agent_id: AgentId,
        success: bool,
        #[serde(default)]
        metrics: HashMap<String, f64>,
    },

    /// The dispatch never reached the agent
    DispatchFailed {
        #[serde(rename = "task-id")]
        task_id: TaskId,
        #[serde(rename = "agent-id")]
        agent_id: AgentId,
        reason: String,
    },
}

impl ExecutionEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Started { task_id, .. } | Self::Finished { task_id, .. } | Self::DispatchFailed { task_id, .. } => {
                task_id
            }
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::Started { agent_id, .. }
            | Self::Finished { agent_id, .. }
            | Self::DispatchFailed { agent_id, .. } => agent_id,
        }
    }
}

/// Cloneable channel the executor reports execution progress on
///
/// Events are queued and consumed by the next coordination cycle.
#[derive(Debug, Clone)]
pub struct ExecutionReporter {
    tx: mpsc::Sender<ExecutionEvent>,
}

impl ExecutionReporter {
    pub fn new(tx: mpsc::Sender<ExecutionEvent>) -> Self {
        debug!("ExecutionReporter::new: called");
        Self { tx }
    }

    /// Whether the receiving coordinator is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn report(&self, event: ExecutionEvent) -> Result<(), EngineError> {
        debug!(task_id = %event.task_id(), agent_id = %event.agent_id(), "ExecutionReporter::report: called");
        self.tx.send(event).await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn started(&self, handle: &DispatchHandle) -> Result<(), EngineError> {
        self.report(ExecutionEvent::Started {
            task_id: handle.task_id.clone(),
            agent_id: handle.agent_id.clone(),
        })
        .await
    }

    pub async fn finished(
        &self,
        handle: &DispatchHandle,
        success: bool,
        metrics: HashMap<String, f64>,
    ) -> Result<(), EngineError> {
        self.report(ExecutionEvent::Finished {
            task_id: handle.task_id.clone(),
            agent_id: handle.agent_id.clone(),
            success,
            metrics,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_task_builds_one_request_per_agent() {
        let mut task = CoordinationTask::new("t1", "carry").with_command(serde_json::json!({"goal": "dock-3"}));
        task.assigned_agent_ids = vec![AgentId::from("a"), AgentId::from("b")];
        let requests = DispatchRequest::for_task(&task);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].agent_id.as_str(), "b");
        assert_eq!(requests[0].command["goal"], "dock-3");
    }

    #[test]
    fn test_event_serde_tag() {
        let event = ExecutionEvent::Started {
            task_id: TaskId::from("t1"),
            agent_id: AgentId::from("a"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "started");
        assert_eq!(json["task-id"], "t1");
    }

    #[tokio::test]
    async fn test_reporter_sends_and_detects_closed_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let reporter = ExecutionReporter::new(tx);
        let handle = DispatchHandle::new(&DispatchRequest::for_agent(
            &CoordinationTask::new("t1", "carry"),
            &AgentId::from("a"),
        ));

        reporter.started(&handle).await.unwrap();
        assert!(matches!(rx.recv().await, Some(ExecutionEvent::Started { .. })));

        drop(rx);
        assert_eq!(
            reporter.finished(&handle, true, HashMap::new()).await,
            Err(EngineError::ChannelClosed)
        );
    }
}
