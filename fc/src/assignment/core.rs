//! AssignmentEngine implementation

use tracing::{debug, info, warn};

use crate::domain::{Agent, AgentId, AgentType, CoordinationPattern, CoordinationTask, TaskStatus, metric};
use crate::engine::EngineConfig;
use crate::error::AssignmentError;
use crate::pattern::PatternCoordinator;
use crate::registry::AgentRegistry;

use super::scoring::{auction_bid, consensus_score, peer_score, rank_by, worker_order};

/// Agents chosen for a task, with the score each was chosen on
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub agents: Vec<AgentId>,
    pub scores: Vec<f64>,
}

impl Selection {
    /// Mean selection score
    pub fn confidence(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }
}

/// Matches tasks to concrete sets of agents
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    config: EngineConfig,
}

impl AssignmentEngine {
    pub fn new(config: EngineConfig) -> Self {
        debug!("AssignmentEngine::new: called");
        Self { config }
    }

    /// Agents able to take the task right now
    pub fn find_suitable<'a>(
        &self,
        task: &CoordinationTask,
        registry: &'a AgentRegistry,
    ) -> Result<Vec<&'a Agent>, AssignmentError> {
        debug!(task_id = %task.id, required = task.required_agents, "AssignmentEngine::find_suitable: called");
        let suitable: Vec<&Agent> = registry
            .agents()
            .filter(|a| a.status.is_healthy())
            .filter(|a| a.covers(&task.required_capabilities))
            .filter(|a| a.current_load <= self.config.max_assignable_load)
            .filter(|a| !task.physical || a.location.is_some())
            .collect();

        if suitable.len() < task.required_agents {
            debug!(task_id = %task.id, suitable = suitable.len(), "AssignmentEngine::find_suitable: not enough agents");
            return Err(AssignmentError::InsufficientSuitableAgents {
                required: task.required_agents,
                suitable: suitable.len(),
                total: registry.len(),
            });
        }
        Ok(suitable)
    }

    /// Choose `required_agents` of the suitable agents for the task's pattern
    pub fn select_optimal(&self, task: &CoordinationTask, suitable: &[&Agent]) -> Result<Selection, AssignmentError> {
        debug!(task_id = %task.id, pattern = %task.coordination_pattern, candidates = suitable.len(), "AssignmentEngine::select_optimal: called");
        let n = task.required_agents;
        let selection = match task.coordination_pattern {
            CoordinationPattern::Hierarchical => select_hierarchical(task, suitable)?,
            CoordinationPattern::Consensus => top(rank_by(suitable, consensus_score), n),
            CoordinationPattern::Auction => top(rank_by(suitable, |a| auction_bid(a, task)), n),
            CoordinationPattern::PeerToPeer => top(rank_by(suitable, peer_score), n),
        };

        if selection.agents.len() < n {
            return Err(AssignmentError::InsufficientSuitableAgents {
                required: n,
                suitable: selection.agents.len(),
                total: suitable.len(),
            });
        }

        let confidence = selection.confidence();
        if confidence < self.config.min_confidence {
            debug!(task_id = %task.id, confidence, "AssignmentEngine::select_optimal: below threshold");
            return Err(AssignmentError::BelowConfidenceThreshold {
                score: confidence,
                threshold: self.config.min_confidence,
            });
        }
        Ok(selection)
    }

    /// Find, select and commit agents to the task
    ///
    /// On success the task is Assigned with a topology, and each agent holds
    /// the task with its load share added. On failure only the attempt
    /// counter moves.
    pub fn assign_task(
        &self,
        task: &mut CoordinationTask,
        registry: &mut AgentRegistry,
        patterns: &PatternCoordinator,
    ) -> Result<Selection, AssignmentError> {
        debug!(task_id = %task.id, "AssignmentEngine::assign_task: called");
        task.attempts += 1;
        let selection = {
            let suitable = self.find_suitable(task, registry)?;
            self.select_optimal(task, &suitable)?
        };

        for agent_id in &selection.agents {
            if let Err(e) = registry.attach_task(agent_id, &task.id, task.estimated_duration) {
                warn!(task_id = %task.id, %agent_id, error = %e, "Failed to attach task to agent");
            }
        }
        task.assigned_agent_ids = selection.agents.clone();
        task.status = TaskStatus::Assigned;
        task.last_error = None;
        task.topology = Some(patterns.build(task, registry));

        info!(
            task_id = %task.id,
            pattern = %task.coordination_pattern,
            agents = ?task.assigned_agent_ids,
            confidence = selection.confidence(),
            "Task assigned"
        );
        Ok(selection)
    }
}

fn top(ranked: Vec<(&Agent, f64)>, n: usize) -> Selection {
    let (agents, scores) = ranked
        .into_iter()
        .take(n)
        .map(|(a, score)| (a.id.clone(), score))
        .unzip();
    Selection { agents, scores }
}

/// Best-coordinating Supervisor plus the top-ranked Workers
///
/// Other non-supervisor agents fill in, in the same order, when Workers run
/// short.
fn select_hierarchical(task: &CoordinationTask, suitable: &[&Agent]) -> Result<Selection, AssignmentError> {
    let supervisor = suitable
        .iter()
        .filter(|a| a.agent_type == AgentType::Supervisor)
        .max_by(|a, b| {
            a.metric(metric::COORDINATION_SCORE)
                .total_cmp(&b.metric(metric::COORDINATION_SCORE))
                .then_with(|| b.id.cmp(&a.id))
        })
        .ok_or(AssignmentError::MissingSupervisor)?;

    let mut workers: Vec<&Agent> = suitable
        .iter()
        .copied()
        .filter(|a| a.agent_type == AgentType::Worker)
        .collect();
    workers.sort_by(|a, b| worker_order(a, b));

    let mut others: Vec<&Agent> = suitable
        .iter()
        .copied()
        .filter(|a| !matches!(a.agent_type, AgentType::Worker | AgentType::Supervisor))
        .collect();
    others.sort_by(|a, b| worker_order(a, b));

    let mut selection = Selection {
        agents: vec![supervisor.id.clone()],
        scores: vec![supervisor.metric(metric::COORDINATION_SCORE)],
    };
    for agent in workers
        .into_iter()
        .chain(others)
        .take(task.required_agents.saturating_sub(1))
    {
        selection.agents.push(agent.id.clone());
        selection.scores.push(agent.metric(metric::TASK_SUCCESS_RATE));
    }
    Ok(selection)
}
