//! Error taxonomy for the coordination engine

use thiserror::Error;

use crate::domain::{AgentId, TaskId};

/// Agent registration rejected; nothing was applied
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("duplicate_id: agent {0} is already registered")]
    DuplicateId(AgentId),

    #[error("empty_capabilities: agent {0} declares no capabilities")]
    EmptyCapabilities(AgentId),

    #[error("invalid_capacity: agent {id} has max capacity {capacity}")]
    InvalidCapacity { id: AgentId, capacity: f64 },

    #[error("invalid_load: agent {id} has load {load} outside [0, 1]")]
    InvalidLoad { id: AgentId, load: f64 },
}

/// A task could not be matched to agents; it stays queued
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssignmentError {
    #[error("insufficient_suitable_agents: need {required}, found {suitable} of {total} agents")]
    InsufficientSuitableAgents {
        required: usize,
        suitable: usize,
        total: usize,
    },

    #[error("below_confidence_threshold: selection score {score:.3} below {threshold:.3}")]
    BelowConfidenceThreshold { score: f64, threshold: f64 },

    #[error("missing_supervisor: hierarchical task has no suitable supervisor")]
    MissingSupervisor,
}

impl AssignmentError {
    /// Stable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InsufficientSuitableAgents { .. } => "insufficient_suitable_agents",
            Self::BelowConfidenceThreshold { .. } => "below_confidence_threshold",
            Self::MissingSupervisor => "missing_supervisor",
        }
    }
}

/// A task submission was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("duplicate_task: task {0} is already known")]
    DuplicateTask(TaskId),

    #[error("invalid_task: task {id} {reason}")]
    InvalidTask { id: TaskId, reason: String },
}

/// Internal inconsistencies surfaced during a tick or an API call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Task {task} is not active (status {status})")]
    TaskNotActive { task: TaskId, status: String },

    #[error("Agent {agent} is not assigned to task {task}")]
    NotAssigned { agent: AgentId, task: TaskId },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Coordinator channel closed")]
    ChannelClosed,
}

/// Executor dispatch failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    #[error("Dispatch to {agent} for {task} rejected: {reason}")]
    Rejected { agent: AgentId, task: TaskId, reason: String },

    #[error("Dispatch to {agent} for {task} timed out")]
    Timeout { agent: AgentId, task: TaskId },

    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_error_reason_codes() {
        let err = AssignmentError::InsufficientSuitableAgents {
            required: 3,
            suitable: 2,
            total: 5,
        };
        assert_eq!(err.reason(), "insufficient_suitable_agents");
        assert!(err.to_string().starts_with("insufficient_suitable_agents"));
        assert!(err.to_string().contains("need 3, found 2"));

        let err = AssignmentError::BelowConfidenceThreshold {
            score: 0.2,
            threshold: 0.5,
        };
        assert_eq!(err.reason(), "below_confidence_threshold");
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::DuplicateId(AgentId::from("r1"));
        assert_eq!(err.to_string(), "duplicate_id: agent r1 is already registered");
    }

    #[test]
    fn test_engine_error_wraps_registration() {
        let err: EngineError = RegistrationError::EmptyCapabilities(AgentId::from("r2")).into();
        assert!(matches!(err, EngineError::Registration(_)));
    }
}
