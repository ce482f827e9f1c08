//! AgentRegistry implementation

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{Agent, AgentId, AgentStatus, AgentType, GroupId, TaskId, metric};
use crate::engine::EngineConfig;
use crate::error::{EngineError, RegistrationError};

use super::hierarchy::HierarchyGraph;

/// Capability cluster used to scope hierarchy formation
#[derive(Debug, Clone, Default)]
struct Group {
    capabilities: BTreeSet<String>,
    members: BTreeSet<AgentId>,
}

/// Owns every agent record, its status lifecycle and the hierarchy
pub struct AgentRegistry {
    config: EngineConfig,
    agents: BTreeMap<AgentId, Agent>,
    groups: BTreeMap<GroupId, Group>,
    hierarchy: HierarchyGraph,
    next_group: u32,
}

impl AgentRegistry {
    pub fn new(config: EngineConfig) -> Self {
        debug!("AgentRegistry::new: called");
        Self {
            config,
            agents: BTreeMap::new(),
            groups: BTreeMap::new(),
            hierarchy: HierarchyGraph::new(),
            next_group: 1,
        }
    }

    /// Register a new agent
    ///
    /// Registration counts as a heartbeat. Returns the coordination group the
    /// agent joined.
    pub fn register(&mut self, mut agent: Agent, now: DateTime<Utc>) -> Result<GroupId, RegistrationError> {
        debug!(agent_id = %agent.id, agent_type = %agent.agent_type, "AgentRegistry::register: called");
        if self.agents.contains_key(&agent.id) {
            return Err(RegistrationError::DuplicateId(agent.id));
        }
        if agent.capabilities.is_empty() {
            return Err(RegistrationError::EmptyCapabilities(agent.id));
        }
        if !(agent.max_capacity > 0.0) {
            return Err(RegistrationError::InvalidCapacity {
                id: agent.id,
                capacity: agent.max_capacity,
            });
        }
        if !(0.0..=1.0).contains(&agent.current_load) {
            return Err(RegistrationError::InvalidLoad {
                id: agent.id,
                load: agent.current_load,
            });
        }

        agent.last_heartbeat = now;
        agent.supervisor_id = None;
        agent.subordinates.clear();
        agent.current_task_ids.clear();
        agent.task_loads.clear();
        if agent.status != AgentStatus::Maintenance {
            agent.status = self.load_status(agent.current_load);
        }

        let group_id = self.choose_group(&agent.capabilities);
        let group = self.groups.entry(group_id).or_default();
        group.capabilities.extend(agent.capabilities.iter().cloned());
        group.members.insert(agent.id.clone());
        agent.coordination_group = Some(group_id);

        let agent_id = agent.id.clone();
        let is_supervisor = agent.agent_type == AgentType::Supervisor;
        self.agents.insert(agent_id.clone(), agent);

        if is_supervisor {
            let adopted = self.adopt_workers(&agent_id, group_id);
            debug!(%agent_id, adopted, "AgentRegistry::register: supervisor adopted workers");
        }

        info!(%agent_id, group = %group_id, "Agent registered");
        Ok(group_id)
    }

    /// Pick the group sharing the most of `capabilities`, or open a new one
    fn choose_group(&mut self, capabilities: &BTreeSet<String>) -> GroupId {
        let total = capabilities.len() as f64;
        let best = self
            .groups
            .iter()
            .map(|(id, group)| {
                let shared = capabilities.intersection(&group.capabilities).count() as f64;
                (*id, shared / total)
            })
            .filter(|(_, overlap)| *overlap >= self.config.group_overlap_threshold)
            // Highest overlap wins, lowest group id on ties
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)));

        match best {
            Some((id, overlap)) => {
                debug!(group = %id, overlap, "AgentRegistry::choose_group: joining existing group");
                id
            }
            None => {
                let id = GroupId(self.next_group);
                self.next_group += 1;
                debug!(group = %id, "AgentRegistry::choose_group: creating group");
                id
            }
        }
    }

    /// Attach unsupervised, reachable Workers of the group to a new supervisor
    fn adopt_workers(&mut self, supervisor: &AgentId, group_id: GroupId) -> usize {
        let candidates: Vec<AgentId> = self
            .groups
            .get(&group_id)
            .map(|group| group.members.iter().cloned().collect())
            .unwrap_or_default();

        let mut adopted = 0;
        for worker_id in candidates {
            if adopted >= self.config.max_subordinates {
                break;
            }
            let eligible = self.agents.get(&worker_id).is_some_and(|w| {
                w.agent_type == AgentType::Worker && w.supervisor_id.is_none() && w.status != AgentStatus::Offline
            });
            if eligible && self.attach_subordinate(supervisor, &worker_id) {
                adopted += 1;
            }
        }
        adopted
    }

    /// Record a supervisor edge within a coordination group
    ///
    /// Refused unless `supervisor` is a Supervisor with room under
    /// `max_subordinates`. Also refused when the agents are in different
    /// groups, either is Offline, the subordinate already has a supervisor, or
    /// the edge would form a cycle.
    pub fn attach_subordinate(&mut self, supervisor: &AgentId, subordinate: &AgentId) -> bool {
        let (Some(sup), Some(sub)) = (self.agents.get(supervisor), self.agents.get(subordinate)) else {
            return false;
        };
        if sup.agent_type != AgentType::Supervisor || sup.subordinates.len() >= self.config.max_subordinates {
            debug!(%supervisor, %subordinate, "AgentRegistry::attach_subordinate: not a supervisor or no room");
            return false;
        }
        if sup.coordination_group != sub.coordination_group
            || sup.status == AgentStatus::Offline
            || sub.status == AgentStatus::Offline
        {
            return false;
        }
        if !self.hierarchy.attach(supervisor, subordinate) {
            return false;
        }
        if let Some(sub) = self.agents.get_mut(subordinate) {
            sub.supervisor_id = Some(supervisor.clone());
        }
        if let Some(sup) = self.agents.get_mut(supervisor) {
            sup.subordinates.insert(subordinate.clone());
        }
        debug!(%supervisor, %subordinate, "AgentRegistry::attach_subordinate: edge recorded");
        true
    }

    /// Drop every subordinate edge below `supervisor`
    fn release_subordinates(&mut self, supervisor: &AgentId) {
        for child in self.hierarchy.detach_children(supervisor) {
            if let Some(agent) = self.agents.get_mut(&child) {
                agent.supervisor_id = None;
            }
        }
        if let Some(agent) = self.agents.get_mut(supervisor) {
            agent.subordinates.clear();
        }
    }

    /// Record a liveness signal
    ///
    /// This is the only way an agent leaves Offline.
    pub fn heartbeat(&mut self, agent_id: &AgentId, now: DateTime<Utc>) -> Result<(), EngineError> {
        debug!(%agent_id, "AgentRegistry::heartbeat: called");
        let status = {
            let agent = self
                .agents
                .get(agent_id)
                .ok_or_else(|| EngineError::UnknownAgent(agent_id.clone()))?;
            self.load_status(agent.current_load)
        };
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.clone()))?;
        agent.last_heartbeat = now;
        if agent.status == AgentStatus::Offline {
            info!(%agent_id, %status, "Agent back online");
            agent.status = status;
        }
        Ok(())
    }

    /// Recompute every agent's status; returns the number that changed
    pub fn refresh_statuses(&mut self, now: DateTime<Utc>) -> usize {
        debug!("AgentRegistry::refresh_statuses: called");
        let timeout = self.config.heartbeat_timeout();
        let mut changed = 0;
        let mut gone_offline = Vec::new();

        let updates: Vec<(AgentId, AgentStatus)> = self
            .agents
            .values()
            .map(|agent| {
                let next = if now - agent.last_heartbeat > timeout {
                    AgentStatus::Offline
                } else if agent.status == AgentStatus::Offline {
                    // Stale Offline without a heartbeat stays Offline
                    AgentStatus::Offline
                } else if agent
                    .performance_metrics
                    .get(metric::ERROR_RATE)
                    .is_some_and(|rate| *rate > self.config.error_rate_threshold)
                {
                    AgentStatus::Error
                } else if agent.status == AgentStatus::Maintenance {
                    AgentStatus::Maintenance
                } else {
                    self.load_status(agent.current_load)
                };
                (agent.id.clone(), next)
            })
            .collect();

        for (agent_id, next) in updates {
            let Some(agent) = self.agents.get_mut(&agent_id) else {
                continue;
            };
            if agent.status != next {
                if next == AgentStatus::Offline {
                    warn!(%agent_id, last_heartbeat = %agent.last_heartbeat, "Agent went offline");
                    gone_offline.push(agent_id.clone());
                } else if next == AgentStatus::Error {
                    warn!(%agent_id, error_rate = agent.metric(metric::ERROR_RATE), "Agent error rate too high");
                }
                debug!(%agent_id, from = %agent.status, to = %next, "AgentRegistry::refresh_statuses: transition");
                agent.status = next;
                changed += 1;
            }
        }

        for agent_id in gone_offline {
            self.release_subordinates(&agent_id);
        }
        changed
    }

    /// Toggle operator maintenance mode
    pub fn set_maintenance(&mut self, agent_id: &AgentId, on: bool) -> Result<(), EngineError> {
        debug!(%agent_id, on, "AgentRegistry::set_maintenance: called");
        let derived = {
            let agent = self
                .agents
                .get(agent_id)
                .ok_or_else(|| EngineError::UnknownAgent(agent_id.clone()))?;
            self.load_status(agent.current_load)
        };
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.clone()))?;
        match (on, agent.status) {
            (true, status) if status.is_load_derived() => agent.status = AgentStatus::Maintenance,
            (false, AgentStatus::Maintenance) => agent.status = derived,
            _ => {}
        }
        Ok(())
    }

    /// Commit an agent to a task, adding its load share
    ///
    /// Returns the load actually added, which is less than the share when
    /// the agent saturates at 1.0.
    pub fn attach_task(&mut self, agent_id: &AgentId, task_id: &TaskId, duration: f64) -> Result<f64, EngineError> {
        debug!(%agent_id, %task_id, duration, "AgentRegistry::attach_task: called");
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.clone()))?;
        if agent.has_task(task_id) {
            debug!(%agent_id, %task_id, "AgentRegistry::attach_task: agent already holds task");
            return Ok(agent.task_loads.get(task_id).copied().unwrap_or(0.0));
        }
        let before = agent.current_load;
        agent.current_load = (before + agent.load_share(duration)).clamp(0.0, 1.0);
        let applied = agent.current_load - before;
        agent.current_task_ids.push(task_id.clone());
        agent.task_loads.insert(task_id.clone(), applied);
        self.rederive(agent_id);
        Ok(applied)
    }

    /// Release an agent from a task, removing the load it added
    pub fn detach_task(&mut self, agent_id: &AgentId, task_id: &TaskId, duration: f64) -> Result<(), EngineError> {
        debug!(%agent_id, %task_id, "AgentRegistry::detach_task: called");
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.clone()))?;
        if !agent.has_task(task_id) {
            debug!(%agent_id, %task_id, "AgentRegistry::detach_task: agent does not hold task");
            return Ok(());
        }
        agent.current_task_ids.retain(|id| id != task_id);
        let applied = agent
            .task_loads
            .remove(task_id)
            .unwrap_or_else(|| agent.load_share(duration));
        agent.current_load = (agent.current_load - applied).clamp(0.0, 1.0);
        if agent.current_task_ids.is_empty() && agent.current_load < 1e-9 {
            agent.current_load = 0.0;
        }
        self.rederive(agent_id);
        Ok(())
    }

    /// Re-derive a healthy agent's status after a load change
    fn rederive(&mut self, agent_id: &AgentId) {
        let Some(load) = self.agents.get(agent_id).map(|a| a.current_load) else {
            return;
        };
        let status = self.load_status(load);
        if let Some(agent) = self.agents.get_mut(agent_id)
            && agent.status.is_load_derived()
        {
            agent.status = status;
        }
    }

    /// Merge fresh performance metrics into an agent's record
    pub fn merge_metrics(&mut self, agent_id: &AgentId, metrics: HashMap<String, f64>) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(agent) => {
                let mut changed = false;
                for (name, value) in metrics {
                    if agent.performance_metrics.get(&name) != Some(&value) {
                        agent.performance_metrics.insert(name, value);
                        changed = true;
                    }
                }
                changed
            }
            None => false,
        }
    }

    fn load_status(&self, load: f64) -> AgentStatus {
        AgentStatus::from_load(load, self.config.busy_load_threshold, self.config.idle_load_threshold)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Agents in id order
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn group_members(&self, group_id: GroupId) -> Vec<AgentId> {
        self.groups
            .get(&group_id)
            .map(|g| g.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn hierarchy(&self) -> &HierarchyGraph {
        &self.hierarchy
    }

    /// Copy of every agent in id order
    pub fn snapshot(&self) -> Vec<Agent> {
        self.agents.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(EngineConfig::default())
    }

    fn worker(id: &str, caps: &[&str]) -> Agent {
        Agent::new(id, AgentType::Worker, caps.iter().copied())
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty_capabilities() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("w1", &["nav"]), now).unwrap();

        let err = reg.register(worker("w1", &["nav"]), now).unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateId(AgentId::from("w1")));

        let err = reg.register(worker("w2", &[]), now).unwrap_err();
        assert_eq!(err, RegistrationError::EmptyCapabilities(AgentId::from("w2")));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.group_count(), 1);
    }

    #[test]
    fn test_register_rejects_bad_capacity_and_load() {
        let mut reg = registry();
        let now = Utc::now();
        assert!(matches!(
            reg.register(worker("w1", &["nav"]).with_capacity(0.0), now),
            Err(RegistrationError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            reg.register(worker("w1", &["nav"]).with_load(1.2), now),
            Err(RegistrationError::InvalidLoad { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_group_overlap_heuristic() {
        let mut reg = registry();
        let now = Utc::now();
        let g1 = reg.register(worker("w1", &["nav", "manip"]), now).unwrap();
        // 1 of 2 shared = 50%, joins
        let g2 = reg.register(worker("w2", &["nav", "lift"]), now).unwrap();
        // 1 of 3 shared < 50%, new group
        let g3 = reg.register(worker("w3", &["weld", "paint", "nav"]), now).unwrap();
        assert_eq!(g1, g2);
        assert_ne!(g1, g3);
        assert_eq!(reg.group_members(g1), vec![AgentId::from("w1"), AgentId::from("w2")]);
    }

    #[test]
    fn test_supervisor_adopts_up_to_five_workers() {
        let mut reg = registry();
        let now = Utc::now();
        for i in 0..7 {
            reg.register(worker(&format!("w{}", i), &["nav"]), now).unwrap();
        }
        reg.register(Agent::new("sup", AgentType::Supervisor, ["nav"]), now)
            .unwrap();

        let sup = reg.get(&AgentId::from("sup")).unwrap();
        assert_eq!(sup.subordinates.len(), 5);
        assert!(sup.subordinates.contains(&AgentId::from("w0")));
        assert!(!sup.subordinates.contains(&AgentId::from("w6")));
        assert_eq!(
            reg.get(&AgentId::from("w0")).unwrap().supervisor_id,
            Some(AgentId::from("sup"))
        );
        assert!(reg.get(&AgentId::from("w6")).unwrap().supervisor_id.is_none());
        assert!(reg.hierarchy().is_forest());

        // A second supervisor only gets what is left
        reg.register(Agent::new("sup2", AgentType::Supervisor, ["nav"]), now)
            .unwrap();
        assert_eq!(reg.get(&AgentId::from("sup2")).unwrap().subordinates.len(), 2);
    }

    #[test]
    fn test_only_supervisors_take_subordinates() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("w1", &["nav"]), now).unwrap();
        reg.register(worker("w2", &["nav"]), now).unwrap();
        assert!(!reg.attach_subordinate(&AgentId::from("w1"), &AgentId::from("w2")));
        assert!(reg.get(&AgentId::from("w1")).unwrap().subordinates.is_empty());
        assert_eq!(reg.hierarchy().edge_count(), 0);
    }

    #[test]
    fn test_refresh_marks_offline_after_timeout() {
        let mut reg = registry();
        let t0 = Utc::now();
        reg.register(worker("w1", &["nav"]), t0).unwrap();

        assert_eq!(reg.refresh_statuses(t0 + Duration::minutes(5)), 0);
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().status, AgentStatus::Idle);

        assert_eq!(reg.refresh_statuses(t0 + Duration::minutes(5) + Duration::seconds(1)), 1);
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().status, AgentStatus::Offline);
    }

    #[test]
    fn test_heartbeat_is_the_only_way_out_of_offline() {
        let mut reg = registry();
        let t0 = Utc::now();
        reg.register(worker("w1", &["nav"]).with_load(0.85), t0).unwrap();
        let late = t0 + Duration::minutes(6);
        reg.refresh_statuses(late);
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().status, AgentStatus::Offline);

        // Still Offline on the next refresh
        reg.refresh_statuses(late);
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().status, AgentStatus::Offline);

        reg.heartbeat(&AgentId::from("w1"), late).unwrap();
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().status, AgentStatus::Busy);
    }

    #[test]
    fn test_offline_supervisor_releases_subordinates() {
        let mut reg = registry();
        let t0 = Utc::now();
        reg.register(worker("w1", &["nav"]), t0).unwrap();
        reg.register(Agent::new("sup", AgentType::Supervisor, ["nav"]), t0)
            .unwrap();
        let later = t0 + Duration::minutes(4);
        reg.heartbeat(&AgentId::from("w1"), later).unwrap();

        reg.refresh_statuses(t0 + Duration::minutes(6));
        assert!(reg.get(&AgentId::from("sup")).unwrap().subordinates.is_empty());
        assert!(reg.get(&AgentId::from("w1")).unwrap().supervisor_id.is_none());
        assert_eq!(reg.hierarchy().edge_count(), 0);
    }

    #[test]
    fn test_error_rate_marks_error() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("w1", &["nav"]).with_metric(metric::ERROR_RATE, 0.2), now)
            .unwrap();
        reg.register(worker("w2", &["nav"]), now).unwrap();
        assert_eq!(reg.refresh_statuses(now), 1);
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().status, AgentStatus::Error);
        assert_eq!(reg.get(&AgentId::from("w2")).unwrap().status, AgentStatus::Idle);

        let mut fixed = HashMap::new();
        fixed.insert(metric::ERROR_RATE.to_string(), 0.01);
        reg.merge_metrics(&AgentId::from("w1"), fixed);
        reg.refresh_statuses(now);
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().status, AgentStatus::Idle);
    }

    #[test]
    fn test_attach_and_detach_task_update_load_and_status() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("w1", &["nav"]).with_capacity(100.0), now).unwrap();
        let id = AgentId::from("w1");
        let task = TaskId::from("t1");

        let share = reg.attach_task(&id, &task, 85.0).unwrap();
        assert!((share - 0.85).abs() < 1e-9);
        let agent = reg.get(&id).unwrap();
        assert_eq!(agent.status, AgentStatus::Busy);
        assert_eq!(agent.current_task_ids, vec![task.clone()]);

        reg.detach_task(&id, &task, 85.0).unwrap();
        let agent = reg.get(&id).unwrap();
        assert_eq!(agent.current_load, 0.0);
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task_ids.is_empty());
    }

    #[test]
    fn test_load_is_clamped() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("w1", &["nav"]).with_capacity(10.0), now).unwrap();
        let id = AgentId::from("w1");
        reg.attach_task(&id, &TaskId::from("t1"), 50.0).unwrap();
        assert_eq!(reg.get(&id).unwrap().current_load, 1.0);
    }

    #[test]
    fn test_release_after_clamp_keeps_remaining_load() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("a", &["nav"]).with_capacity(100.0), now).unwrap();
        let id = AgentId::from("a");
        let (t1, t2) = (TaskId::from("t1"), TaskId::from("t2"));

        reg.attach_task(&id, &t1, 85.0).unwrap();
        let applied = reg.attach_task(&id, &t2, 50.0).unwrap();
        assert!((applied - 0.15).abs() < 1e-9);
        assert_eq!(reg.get(&id).unwrap().current_load, 1.0);

        reg.detach_task(&id, &t2, 50.0).unwrap();
        let agent = reg.get(&id).unwrap();
        assert!((agent.current_load - 0.85).abs() < 1e-9);
        assert!((agent.task_load() - 0.85).abs() < 1e-9);
        assert_eq!(agent.status, AgentStatus::Busy);
        assert_eq!(agent.current_task_ids, vec![t1.clone()]);

        reg.detach_task(&id, &t1, 85.0).unwrap();
        assert_eq!(reg.get(&id).unwrap().current_load, 0.0);
    }

    #[test]
    fn test_attach_same_task_twice_adds_load_once() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("a", &["nav"]).with_capacity(100.0), now).unwrap();
        let id = AgentId::from("a");
        let t1 = TaskId::from("t1");
        reg.attach_task(&id, &t1, 30.0).unwrap();
        reg.attach_task(&id, &t1, 30.0).unwrap();
        let agent = reg.get(&id).unwrap();
        assert!((agent.current_load - 0.3).abs() < 1e-9);
        assert_eq!(agent.current_task_ids.len(), 1);
    }

    #[test]
    fn test_maintenance_toggle() {
        let mut reg = registry();
        let now = Utc::now();
        reg.register(worker("w1", &["nav"]), now).unwrap();
        let id = AgentId::from("w1");
        reg.set_maintenance(&id, true).unwrap();
        assert_eq!(reg.get(&id).unwrap().status, AgentStatus::Maintenance);
        reg.refresh_statuses(now);
        assert_eq!(reg.get(&id).unwrap().status, AgentStatus::Maintenance);
        reg.set_maintenance(&id, false).unwrap();
        assert_eq!(reg.get(&id).unwrap().status, AgentStatus::Idle);
        assert!(reg.set_maintenance(&AgentId::from("nobody"), true).is_err());
    }
}
