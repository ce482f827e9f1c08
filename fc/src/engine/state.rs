//! Mutable state shared by the cycle passes

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::domain::{AgentId, CoordinationTask, TaskId, TaskStatus};
use crate::error::EngineError;
use crate::executor::DispatchRequest;
use crate::pattern::PatternCoordinator;
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;

use super::EngineConfig;

/// Registry, queue and task maps owned by one engine
///
/// Every task id lives in exactly one of `queue`, `active` or `finished`.
pub struct EngineState {
    pub registry: AgentRegistry,
    pub queue: TaskQueue,
    /// Assigned and Executing tasks
    pub active: BTreeMap<TaskId, CoordinationTask>,
    /// Terminal status of every task that left the engine
    pub finished: HashMap<TaskId, TaskStatus>,
    /// Agents that reported a successful finish, per active task
    pub progress: HashMap<TaskId, BTreeSet<AgentId>>,
    pub patterns: PatternCoordinator,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Self {
        debug!("EngineState::new: called");
        Self {
            registry: AgentRegistry::new(config),
            queue: TaskQueue::new(),
            active: BTreeMap::new(),
            finished: HashMap::new(),
            progress: HashMap::new(),
            patterns: PatternCoordinator::new(),
        }
    }

    /// Whether the id is queued, active or finished
    pub fn knows_task(&self, task_id: &TaskId) -> bool {
        self.queue.contains(task_id) || self.active.contains_key(task_id) || self.finished.contains_key(task_id)
    }

    /// Detach every assigned agent from the task, returning their load
    pub fn release_agents(&mut self, task: &CoordinationTask) {
        for agent_id in &task.assigned_agent_ids {
            if let Err(e) = self.registry.detach_task(agent_id, &task.id, task.estimated_duration) {
                warn!(task_id = %task.id, %agent_id, error = %e, "Failed to release agent");
            }
        }
    }

    /// Move an active task to a terminal status
    pub fn finish(&mut self, task_id: &TaskId, status: TaskStatus) -> Option<CoordinationTask> {
        debug!(%task_id, %status, "EngineState::finish: called");
        let mut task = self.active.remove(task_id)?;
        self.release_agents(&task);
        self.progress.remove(task_id);
        task.status = status;
        self.finished.insert(task_id.clone(), status);
        info!(%task_id, %status, "Task finished");
        Some(task)
    }

    /// Record a task dropped before it ever became active
    pub fn drop_queued(&mut self, mut task: CoordinationTask, reason: &str) {
        debug!(task_id = %task.id, %reason, "EngineState::drop_queued: called");
        task.status = TaskStatus::Failed;
        task.last_error = Some(reason.to_string());
        self.finished.insert(task.id.clone(), TaskStatus::Failed);
        info!(task_id = %task.id, %reason, "Task dropped");
    }

    /// Release every agent from an active task and put it back in the queue
    pub fn delay(&mut self, task_id: &TaskId, reason: &str) -> bool {
        debug!(%task_id, %reason, "EngineState::delay: called");
        let Some(mut task) = self.active.remove(task_id) else {
            return false;
        };
        self.release_agents(&task);
        self.progress.remove(task_id);
        task.assigned_agent_ids.clear();
        task.topology = None;
        task.status = TaskStatus::Delayed;
        task.last_error = Some(reason.to_string());
        info!(%task_id, %reason, "Task delayed");
        self.queue.requeue(task)
    }

    /// Put `to` in the slot `from` holds on an active task
    ///
    /// Loads and task lists move with the slot and the topology is rebuilt.
    /// Returns the dispatch the new agent needs.
    pub fn swap_agent(&mut self, task_id: &TaskId, from: &AgentId, to: &AgentId) -> Result<DispatchRequest, EngineError> {
        debug!(%task_id, %from, %to, "EngineState::swap_agent: called");
        let task = self
            .active
            .get_mut(task_id)
            .ok_or_else(|| EngineError::UnknownTask(task_id.clone()))?;
        let slot = task
            .assigned_agent_ids
            .iter()
            .position(|id| id == from)
            .ok_or_else(|| EngineError::NotAssigned {
                agent: from.clone(),
                task: task_id.clone(),
            })?;
        if !self.registry.contains(to) {
            return Err(EngineError::UnknownAgent(to.clone()));
        }

        self.registry.detach_task(from, task_id, task.estimated_duration)?;
        self.registry.attach_task(to, task_id, task.estimated_duration)?;
        task.assigned_agent_ids[slot] = to.clone();
        task.topology = Some(self.patterns.build(task, &mut self.registry));
        if let Some(done) = self.progress.get_mut(task_id) {
            done.remove(from);
        }

        info!(%task_id, %from, %to, "Agent swapped on task");
        Ok(DispatchRequest::for_agent(task, to))
    }
}
