//! Executor trait definition

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{DispatchHandle, DispatchRequest, ExecutionReporter};
use crate::error::ExecutorError;

/// Collaborator that drives physical execution on agents
///
/// `dispatch` returns as soon as the work has been handed off. Progress and
/// completion come back later through the reporter; the coordination loop
/// never waits on the hardware.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn dispatch(
        &self,
        request: DispatchRequest,
        reporter: ExecutionReporter,
    ) -> Result<DispatchHandle, ExecutorError>;
}

/// Executor that accepts every dispatch, records it and never reports
///
/// Events are driven by hand through the coordinator's `report`.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    requests: Mutex<Vec<DispatchRequest>>,
    reject: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        debug!("RecordingExecutor::new: called");
        Self::default()
    }

    /// An executor that refuses everything with `reason`
    pub fn rejecting(reason: impl Into<String>) -> Self {
        debug!("RecordingExecutor::rejecting: called");
        Self {
            requests: Mutex::new(Vec::new()),
            reject: Some(reason.into()),
        }
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn dispatch(
        &self,
        request: DispatchRequest,
        _reporter: ExecutionReporter,
    ) -> Result<DispatchHandle, ExecutorError> {
        debug!(task_id = %request.task_id, agent_id = %request.agent_id, "RecordingExecutor::dispatch: called");
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(reason) = &self.reject {
            return Err(ExecutorError::Rejected {
                agent: request.agent_id,
                task: request.task_id,
                reason: reason.clone(),
            });
        }
        Ok(DispatchHandle::new(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentId, CoordinationTask};
    use tokio::sync::mpsc;

    fn request() -> DispatchRequest {
        DispatchRequest::for_agent(&CoordinationTask::new("t1", "carry"), &AgentId::from("a"))
    }

    #[tokio::test]
    async fn test_recording_executor_records() {
        let (tx, _rx) = mpsc::channel(1);
        let executor = RecordingExecutor::new();
        let handle = executor.dispatch(request(), ExecutionReporter::new(tx)).await.unwrap();
        assert_eq!(handle.agent_id.as_str(), "a");
        assert_eq!(executor.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_rejecting_executor() {
        let (tx, _rx) = mpsc::channel(1);
        let executor = RecordingExecutor::rejecting("arm jammed");
        let err = executor.dispatch(request(), ExecutionReporter::new(tx)).await.unwrap_err();
        assert!(err.to_string().contains("arm jammed"));
        assert_eq!(executor.requests().len(), 1);
    }
}
