//! Load rebalancing between agents

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::domain::{Agent, AgentId, CoordinationTask, TaskId};
use crate::engine::{EngineConfig, EngineState};
use crate::executor::DispatchRequest;

/// A task moved from one agent to another
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub task_id: TaskId,
    pub from: AgentId,
    pub to: AgentId,
}

/// What one optimizer pass did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OptimizeOutcome {
    pub migrations: Vec<Migration>,
    pub dispatches: Vec<DispatchRequest>,
}

/// Sheds work from overloaded agents onto underloaded ones
///
/// Each overloaded agent gives up at most one task per pass. A task never
/// migrates back onto an agent it was moved off while it stays active.
#[derive(Debug, Clone)]
pub struct LoadOptimizer {
    overload: f64,
    underload: f64,
    /// Agents each active task has been moved off
    left: HashMap<TaskId, HashSet<AgentId>>,
}

impl LoadOptimizer {
    pub fn new(config: &EngineConfig) -> Self {
        debug!("LoadOptimizer::new: called");
        Self {
            overload: config.overload_threshold,
            underload: config.underload_threshold,
            left: HashMap::new(),
        }
    }

    /// Least loaded healthy agent under the underload threshold that can
    /// take `task` and has not already shed it
    fn target_for<'a>(&self, task: &CoordinationTask, agents: impl Iterator<Item = &'a Agent>) -> Option<AgentId> {
        let left = self.left.get(&task.id);
        agents
            .filter(|a| a.status.is_healthy())
            .filter(|a| a.current_load < self.underload)
            .filter(|a| !task.assigned_agent_ids.contains(&a.id))
            .filter(|a| left.is_none_or(|ids| !ids.contains(&a.id)))
            .filter(|a| a.covers(&task.required_capabilities))
            .filter(|a| !task.physical || a.location.is_some())
            .min_by(|a, b| a.current_load.total_cmp(&b.current_load).then_with(|| a.id.cmp(&b.id)))
            .map(|a| a.id.clone())
    }

    pub fn optimize(&mut self, state: &mut EngineState) -> OptimizeOutcome {
        debug!("LoadOptimizer::optimize: called");
        let mut outcome = OptimizeOutcome::default();
        let mut moved: HashSet<TaskId> = HashSet::new();
        self.left.retain(|task_id, _| state.active.contains_key(task_id));

        let overloaded: Vec<AgentId> = state
            .registry
            .agents()
            .filter(|a| a.current_load > self.overload)
            .map(|a| a.id.clone())
            .collect();

        for from in overloaded {
            let held = match state.registry.get(&from) {
                Some(agent) if agent.current_load > self.overload => agent.current_task_ids.clone(),
                _ => continue,
            };

            let choice = held.iter().find_map(|task_id| {
                if moved.contains(task_id) {
                    return None;
                }
                let task = state.active.get(task_id)?;
                self.target_for(task, state.registry.agents())
                    .map(|to| (task_id.clone(), to))
            });
            let Some((task_id, to)) = choice else {
                debug!(agent_id = %from, "LoadOptimizer::optimize: nothing to shed");
                continue;
            };

            match state.swap_agent(&task_id, &from, &to) {
                Ok(request) => {
                    info!(%task_id, %from, %to, "Task rebalanced");
                    moved.insert(task_id.clone());
                    self.left.entry(task_id.clone()).or_default().insert(from.clone());
                    outcome.dispatches.push(request);
                    outcome.migrations.push(Migration { task_id, from, to });
                }
                Err(e) => warn!(%task_id, %from, %to, error = %e, "Rebalance failed"),
            }
        }
        outcome
    }
}
