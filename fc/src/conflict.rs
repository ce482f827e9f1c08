//! Resource and pattern-preference conflict resolution

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::domain::{AgentId, CoordinationPattern, TaskId};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::executor::DispatchRequest;
use crate::monitor::replace_or_delay;

/// What one conflict pass did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConflictOutcome {
    pub detected: usize,
    pub resolved: usize,
    pub replacements: usize,
    pub delayed: usize,
    pub dispatches: Vec<DispatchRequest>,
}

/// A location claimed by more than one physical task
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConflict {
    pub location: String,
    /// Keeps its agents
    pub winner: TaskId,
    /// Must move its agents off the location
    pub yielding: Vec<TaskId>,
}

/// Detects and resolves conflicts once per cycle
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        debug!("ConflictResolver::new: called");
        Self
    }

    /// Locations where different agents serve different physical tasks
    ///
    /// The highest-priority task keeps the location; ties go to the smaller
    /// task id.
    pub fn detect_resource_conflicts(&self, state: &EngineState) -> Vec<ResourceConflict> {
        debug!("ConflictResolver::detect_resource_conflicts: called");
        let mut claims: BTreeMap<String, Vec<(AgentId, TaskId)>> = BTreeMap::new();
        for task in state.active.values().filter(|t| t.physical) {
            for agent_id in &task.assigned_agent_ids {
                if let Some(location) = state.registry.get(agent_id).and_then(|a| a.location.clone()) {
                    claims
                        .entry(location)
                        .or_default()
                        .push((agent_id.clone(), task.id.clone()));
                }
            }
        }

        claims
            .into_iter()
            .filter_map(|(location, pairs)| {
                let contested = pairs
                    .iter()
                    .any(|(a1, t1)| pairs.iter().any(|(a2, t2)| a1 != a2 && t1 != t2));
                if !contested {
                    return None;
                }
                let tasks: BTreeSet<TaskId> = pairs.into_iter().map(|(_, t)| t).collect();
                let winner = tasks
                    .iter()
                    .max_by(|a, b| {
                        let pa = state.active.get(*a).map(|t| t.priority).unwrap_or(i32::MIN);
                        let pb = state.active.get(*b).map(|t| t.priority).unwrap_or(i32::MIN);
                        pa.cmp(&pb).then_with(|| b.cmp(a))
                    })?
                    .clone();
                let yielding = tasks.into_iter().filter(|t| *t != winner).collect();
                Some(ResourceConflict {
                    location,
                    winner,
                    yielding,
                })
            })
            .collect()
    }

    /// Move yielding tasks' agents off each contested location
    ///
    /// Each yielding agent is replaced by an Idle agent elsewhere; when none
    /// exists the yielding task is delayed and requeued.
    pub fn resolve_resource_conflicts(
        &self,
        state: &mut EngineState,
        outcome: &mut ConflictOutcome,
    ) -> Result<(), EngineError> {
        let conflicts = self.detect_resource_conflicts(state);
        debug!(count = conflicts.len(), "ConflictResolver::resolve_resource_conflicts: called");

        for conflict in conflicts {
            for task_id in &conflict.yielding {
                outcome.detected += 1;
                warn!(location = %conflict.location, winner = %conflict.winner, yielding = %task_id, "Resource conflict");

                let at_location: Vec<AgentId> = match state.active.get(task_id) {
                    Some(task) => task
                        .assigned_agent_ids
                        .iter()
                        .filter(|id| {
                            state.registry.get(id).and_then(|a| a.location.as_deref()) == Some(conflict.location.as_str())
                        })
                        .cloned()
                        .collect(),
                    None => continue,
                };

                let reason = format!("yielded location {} to {}", conflict.location, conflict.winner);
                for agent_id in at_location {
                    match replace_or_delay(state, task_id, &agent_id, Some(&conflict.location), &reason)? {
                        Some(request) => {
                            outcome.replacements += 1;
                            outcome.dispatches.push(request);
                        }
                        None => {
                            outcome.delayed += 1;
                            break;
                        }
                    }
                }
                outcome.resolved += 1;
            }
        }
        Ok(())
    }

    /// Rewrite task patterns where the assigned agents' preferences disagree
    ///
    /// The majority preference wins. On a tied count the current pattern is
    /// kept if it is among the tied values, otherwise the first in declaration
    /// order. Agents stay as they are; only the topology is rebuilt.
    pub fn resolve_pattern_conflicts(&self, state: &mut EngineState, outcome: &mut ConflictOutcome) {
        debug!("ConflictResolver::resolve_pattern_conflicts: called");
        let task_ids: Vec<TaskId> = state.active.keys().cloned().collect();

        for task_id in task_ids {
            let Some(task) = state.active.get(&task_id) else {
                continue;
            };
            let mut votes: BTreeMap<CoordinationPattern, usize> = BTreeMap::new();
            for agent_id in &task.assigned_agent_ids {
                if let Some(pattern) = state.registry.get(agent_id).and_then(|a| a.preferred_coordination) {
                    *votes.entry(pattern).or_default() += 1;
                }
            }
            if votes.len() < 2 {
                continue;
            }

            let current = task.coordination_pattern;
            let Some(majority) = majority_pattern(&votes, current) else {
                continue;
            };
            if majority == current {
                continue;
            }

            outcome.detected += 1;
            if let Some(task) = state.active.get_mut(&task_id) {
                info!(%task_id, from = %current, to = %majority, ?votes, "Pattern conflict resolved");
                task.coordination_pattern = majority;
                task.topology = Some(state.patterns.build(task, &mut state.registry));
                outcome.resolved += 1;
            }
        }
    }
}

fn majority_pattern(
    votes: &BTreeMap<CoordinationPattern, usize>,
    current: CoordinationPattern,
) -> Option<CoordinationPattern> {
    let top = votes.values().copied().max()?;
    let tied: Vec<CoordinationPattern> = votes
        .iter()
        .filter(|(_, count)| **count == top)
        .map(|(pattern, _)| *pattern)
        .collect();
    if tied.contains(&current) {
        Some(current)
    } else {
        tied.first().copied()
    }
}
