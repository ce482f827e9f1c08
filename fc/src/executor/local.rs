//! In-process executor that acknowledges every dispatch

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DispatchHandle, DispatchRequest, ExecutionReporter, Executor};
use crate::error::ExecutorError;

/// Reports Started and then a successful Finished for every dispatch
///
/// Used by `fc simulate`, where there is no hardware behind the agents.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    metrics: HashMap<String, f64>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        debug!("LocalExecutor::new: called");
        Self::default()
    }

    /// Result metrics attached to every Finished report
    pub fn with_result_metrics(mut self, metrics: HashMap<String, f64>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn dispatch(
        &self,
        request: DispatchRequest,
        reporter: ExecutionReporter,
    ) -> Result<DispatchHandle, ExecutorError> {
        debug!(task_id = %request.task_id, agent_id = %request.agent_id, "LocalExecutor::dispatch: called");
        if reporter.is_closed() {
            return Err(ExecutorError::Unavailable("no coordinator to report to".to_string()));
        }
        let handle = DispatchHandle::new(&request);
        let metrics = self.metrics.clone();
        let reported = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = reporter.started(&reported).await {
                warn!(task_id = %reported.task_id, error = %e, "LocalExecutor: could not report start");
                return;
            }
            if let Err(e) = reporter.finished(&reported, true, metrics).await {
                warn!(task_id = %reported.task_id, error = %e, "LocalExecutor: could not report finish");
            }
        });
        Ok(handle)
    }
}
