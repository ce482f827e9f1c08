//! Supervisor/subordinate forest as an explicit adjacency map

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::domain::AgentId;

/// Parent and child edges keyed by agent id
///
/// Every agent has at most one supervisor and edges never form a cycle.
#[derive(Debug, Default, Clone)]
pub struct HierarchyGraph {
    parent: HashMap<AgentId, AgentId>,
    children: BTreeMap<AgentId, BTreeSet<AgentId>>,
}

impl HierarchyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a supervisor edge, refusing anything that would break the forest
    pub fn attach(&mut self, supervisor: &AgentId, subordinate: &AgentId) -> bool {
        debug!(%supervisor, %subordinate, "HierarchyGraph::attach: called");
        if supervisor == subordinate || self.parent.contains_key(subordinate) {
            return false;
        }
        if self.is_ancestor(subordinate, supervisor) {
            debug!(%supervisor, %subordinate, "HierarchyGraph::attach: would create cycle");
            return false;
        }
        self.parent.insert(subordinate.clone(), supervisor.clone());
        self.children
            .entry(supervisor.clone())
            .or_default()
            .insert(subordinate.clone());
        true
    }

    /// Remove the edge above `subordinate`, returning its former supervisor
    pub fn detach(&mut self, subordinate: &AgentId) -> Option<AgentId> {
        let supervisor = self.parent.remove(subordinate)?;
        if let Some(set) = self.children.get_mut(&supervisor) {
            set.remove(subordinate);
            if set.is_empty() {
                self.children.remove(&supervisor);
            }
        }
        Some(supervisor)
    }

    /// Remove every edge below `supervisor`, returning the released subordinates
    pub fn detach_children(&mut self, supervisor: &AgentId) -> Vec<AgentId> {
        let released: Vec<AgentId> = self
            .children
            .remove(supervisor)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for child in &released {
            self.parent.remove(child);
        }
        released
    }

    pub fn supervisor_of(&self, agent: &AgentId) -> Option<&AgentId> {
        self.parent.get(agent)
    }

    pub fn subordinates_of(&self, agent: &AgentId) -> impl Iterator<Item = &AgentId> {
        self.children.get(agent).into_iter().flatten()
    }

    /// Whether `ancestor` sits above `agent` in the forest
    pub fn is_ancestor(&self, ancestor: &AgentId, agent: &AgentId) -> bool {
        let mut current = self.parent.get(agent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent.get(id);
        }
        false
    }

    /// Walk from every node to its root; true when no walk revisits a node
    pub fn is_forest(&self) -> bool {
        let limit = self.parent.len();
        self.parent.keys().all(|start| {
            let mut steps = 0;
            let mut current = self.parent.get(start);
            while let Some(id) = current {
                steps += 1;
                if steps > limit || id == start {
                    return false;
                }
                current = self.parent.get(id);
            }
            true
        })
    }

    pub fn edge_count(&self) -> usize {
        self.parent.len()
    }
}
