//! Execution monitoring and agent replacement
//!
//! Applies execution events from the executor and keeps active tasks staffed
//! with healthy agents. A task whose failed agent cannot be replaced is
//! delayed and requeued.

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::domain::{Agent, AgentId, AgentStatus, CoordinationTask, TaskId, TaskStatus, metric};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::executor::{DispatchRequest, ExecutionEvent};
use crate::registry::AgentRegistry;

/// What one monitor pass did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MonitorOutcome {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    pub replacements: usize,
    pub delayed: usize,
    pub dispatches: Vec<DispatchRequest>,
}

/// Best Idle stand-in for `failed` on `task`
///
/// Candidates are Idle, not already on the task, and hold every capability
/// the failed agent had. Physical tasks need a located candidate outside
/// `excluded_location`. Ranked by overall performance, then id.
pub fn find_replacement(
    task: &CoordinationTask,
    failed: &Agent,
    registry: &AgentRegistry,
    excluded_location: Option<&str>,
) -> Option<AgentId> {
    debug!(task_id = %task.id, failed = %failed.id, "find_replacement: called");
    registry
        .agents()
        .filter(|a| a.status == AgentStatus::Idle)
        .filter(|a| !task.assigned_agent_ids.contains(&a.id))
        .filter(|a| failed.capabilities.is_subset(&a.capabilities))
        .filter(|a| !task.physical || a.location.is_some())
        .filter(|a| excluded_location.is_none() || a.location.as_deref() != excluded_location)
        .min_by(|a, b| by_performance(a, b))
        .map(|a| a.id.clone())
}

/// Swap `failed` out of the task or, failing that, delay the whole task
///
/// Returns the dispatch for the replacement, or `None` when the task was
/// delayed.
pub fn replace_or_delay(
    state: &mut EngineState,
    task_id: &TaskId,
    failed: &AgentId,
    excluded_location: Option<&str>,
    reason: &str,
) -> Result<Option<DispatchRequest>, EngineError> {
    debug!(%task_id, %failed, %reason, "replace_or_delay: called");
    let replacement = {
        let task = state
            .active
            .get(task_id)
            .ok_or_else(|| EngineError::UnknownTask(task_id.clone()))?;
        let agent = state
            .registry
            .get(failed)
            .ok_or_else(|| EngineError::UnknownAgent(failed.clone()))?;
        find_replacement(task, agent, &state.registry, excluded_location)
    };

    match replacement {
        Some(to) => state.swap_agent(task_id, failed, &to).map(Some),
        None => {
            info!(%task_id, %failed, "No replacement available");
            state.delay(task_id, reason);
            Ok(None)
        }
    }
}

/// Per-task execution state machine
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionMonitor;

impl ExecutionMonitor {
    pub fn new() -> Self {
        debug!("ExecutionMonitor::new: called");
        Self
    }

    /// Apply one execution event
    ///
    /// Events for tasks that are no longer active, or from agents no longer
    /// on the task, are ignored.
    pub fn ingest(
        &self,
        state: &mut EngineState,
        event: ExecutionEvent,
        outcome: &mut MonitorOutcome,
    ) -> Result<(), EngineError> {
        debug!(task_id = %event.task_id(), agent_id = %event.agent_id(), "ExecutionMonitor::ingest: called");
        let Some(task) = state.active.get_mut(event.task_id()) else {
            debug!(task_id = %event.task_id(), "ExecutionMonitor::ingest: task not active");
            return Ok(());
        };
        if !task.assigned_agent_ids.contains(event.agent_id()) {
            debug!(agent_id = %event.agent_id(), "ExecutionMonitor::ingest: agent not on task");
            return Ok(());
        }

        match event {
            ExecutionEvent::Started { task_id, agent_id } => {
                if task.status == TaskStatus::Assigned {
                    task.status = TaskStatus::Executing;
                    outcome.started += 1;
                    info!(%task_id, %agent_id, "Task executing");
                }
            }

            ExecutionEvent::Finished {
                task_id,
                agent_id,
                success,
                metrics,
            } => {
                task.status = TaskStatus::Executing;
                state.registry.merge_metrics(&agent_id, metrics);
                if !success {
                    warn!(%task_id, %agent_id, "Agent reported failure");
                    if let Some(task) = state.active.get_mut(&task_id) {
                        task.last_error = Some(format!("agent {} reported failure", agent_id));
                    }
                    state.finish(&task_id, TaskStatus::Failed);
                    outcome.failed += 1;
                    return Ok(());
                }

                let assigned = state
                    .active
                    .get(&task_id)
                    .map(|t| t.assigned_agent_ids.clone())
                    .unwrap_or_default();
                let done = state.progress.entry(task_id.clone()).or_default();
                done.insert(agent_id);
                if assigned.iter().all(|id| done.contains(id)) {
                    state.finish(&task_id, TaskStatus::Completed);
                    outcome.completed += 1;
                }
            }

            ExecutionEvent::DispatchFailed {
                task_id,
                agent_id,
                reason,
            } => {
                warn!(%task_id, %agent_id, %reason, "Dispatch failed");
                let why = format!("dispatch to {} failed: {}", agent_id, reason);
                match replace_or_delay(state, &task_id, &agent_id, None, &why)? {
                    Some(request) => {
                        outcome.replacements += 1;
                        outcome.dispatches.push(request);
                    }
                    None => outcome.delayed += 1,
                }
            }
        }
        Ok(())
    }

    /// Replace Offline and Error agents on every active task
    ///
    /// A task that hits an error is skipped; the first error is returned
    /// after every other task has been checked.
    pub fn check_agents(&self, state: &mut EngineState, outcome: &mut MonitorOutcome) -> Result<(), EngineError> {
        debug!(active = state.active.len(), "ExecutionMonitor::check_agents: called");
        let task_ids: Vec<TaskId> = state.active.keys().cloned().collect();
        let mut errors = Vec::new();

        for task_id in task_ids {
            let failed: Vec<AgentId> = match state.active.get(&task_id) {
                Some(task) => task
                    .assigned_agent_ids
                    .iter()
                    .filter(|id| state.registry.get(id).is_none_or(|a| a.status.is_failed()))
                    .cloned()
                    .collect(),
                None => continue,
            };

            for agent_id in failed {
                let status = state
                    .registry
                    .get(&agent_id)
                    .map(|a| a.status)
                    .unwrap_or(AgentStatus::Offline);
                let reason = format!("agent {} is {}", agent_id, status);
                match replace_or_delay(state, &task_id, &agent_id, None, &reason) {
                    Ok(Some(request)) => {
                        outcome.replacements += 1;
                        outcome.dispatches.push(request);
                    }
                    Ok(None) => {
                        outcome.delayed += 1;
                        break;
                    }
                    Err(e) => {
                        warn!(%task_id, %agent_id, error = %e, "Replacement failed");
                        errors.push(e);
                        break;
                    }
                }
            }
        }

        match errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Order agents by overall performance, best first, then id
fn by_performance(a: &Agent, b: &Agent) -> Ordering {
    b.metric(metric::OVERALL_PERFORMANCE)
        .total_cmp(&a.metric(metric::OVERALL_PERFORMANCE))
        .then_with(|| a.id.cmp(&b.id))
}
