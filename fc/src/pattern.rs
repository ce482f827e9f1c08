//! PatternCoordinator - topology setup per coordination pattern

use tracing::debug;

use crate::domain::{
    AgentId, AgentType, Channel, ChannelKind, CoordinationPattern, CoordinationTask, DecisionPolicy, TiePolicy,
    Topology, metric,
};
use crate::registry::AgentRegistry;

/// Fraction of consensus participants needed to pass a vote
pub const CONSENSUS_THRESHOLD: f64 = 2.0 / 3.0;

/// Auctions run one sealed round, no rebidding
pub const AUCTION_ROUNDS: u32 = 1;

/// Builds the communication and decision topology for an assignment
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternCoordinator;

impl PatternCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Build the topology for the task's current pattern and agents
    ///
    /// Hierarchical topologies led by a Supervisor also record supervisor
    /// edges in the registry where the forest and `max_subordinates` allow.
    /// A fallback leader gets channels but no edges.
    pub fn build(&self, task: &CoordinationTask, registry: &mut AgentRegistry) -> Topology {
        debug!(task_id = %task.id, pattern = %task.coordination_pattern, agents = task.assigned_agent_ids.len(), "PatternCoordinator::build: called");
        let members = task.assigned_agent_ids.clone();
        match task.coordination_pattern {
            CoordinationPattern::Hierarchical => {
                let leader = hierarchical_leader(&members, registry);
                let mut channels = Vec::new();
                if let Some(ref leader) = leader {
                    for member in members.iter().filter(|m| *m != leader) {
                        channels.push(Channel::new(leader, member, ChannelKind::BroadcastDown));
                        channels.push(Channel::new(member, leader, ChannelKind::ReportUp));
                        if registry.attach_subordinate(leader, member) {
                            debug!(%leader, %member, "PatternCoordinator::build: hierarchy edge recorded");
                        }
                    }
                }
                let decision = match leader.clone() {
                    Some(supervisor) => DecisionPolicy::Escalate { supervisor },
                    None => DecisionPolicy::Distributed {
                        dynamic_load_balancing: false,
                    },
                };
                Topology {
                    pattern: task.coordination_pattern,
                    leader,
                    members,
                    channels,
                    decision,
                }
            }
            CoordinationPattern::Consensus => Topology {
                pattern: task.coordination_pattern,
                leader: None,
                channels: mesh(&members, ChannelKind::AllToAll),
                members,
                decision: DecisionPolicy::Vote {
                    threshold: CONSENSUS_THRESHOLD,
                    on_tie: TiePolicy::Revote,
                },
            },
            CoordinationPattern::Auction => Topology {
                pattern: task.coordination_pattern,
                leader: None,
                members,
                channels: Vec::new(),
                decision: DecisionPolicy::SealedBid { rounds: AUCTION_ROUNDS },
            },
            CoordinationPattern::PeerToPeer => Topology {
                pattern: task.coordination_pattern,
                leader: None,
                channels: mesh(&members, ChannelKind::Direct),
                members,
                decision: DecisionPolicy::Distributed {
                    dynamic_load_balancing: true,
                },
            },
        }
    }
}

/// Best-scoring Supervisor among the members, else the first member
fn hierarchical_leader(members: &[AgentId], registry: &AgentRegistry) -> Option<AgentId> {
    members
        .iter()
        .filter_map(|id| registry.get(id))
        .filter(|a| a.agent_type == AgentType::Supervisor)
        .max_by(|a, b| {
            a.metric(metric::COORDINATION_SCORE)
                .total_cmp(&b.metric(metric::COORDINATION_SCORE))
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|a| a.id.clone())
        .or_else(|| members.first().cloned())
}

/// Directed channel between every ordered pair of members
fn mesh(members: &[AgentId], kind: ChannelKind) -> Vec<Channel> {
    members
        .iter()
        .flat_map(|from| {
            members
                .iter()
                .filter(move |to| *to != from)
                .map(move |to| Channel::new(from, to, kind))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Agent;
    use crate::engine::EngineConfig;
    use chrono::Utc;

    fn setup() -> AgentRegistry {
        let mut reg = AgentRegistry::new(EngineConfig::default());
        let now = Utc::now();
        for id in ["w1", "w2", "w3"] {
            reg.register(Agent::new(id, AgentType::Worker, ["nav"]), now).unwrap();
        }
        reg
    }

    fn task(pattern: CoordinationPattern, agents: &[&str]) -> CoordinationTask {
        let mut t = CoordinationTask::new("t1", "survey").with_pattern(pattern);
        t.assigned_agent_ids = agents.iter().map(|a| AgentId::from(*a)).collect();
        t
    }

    #[test]
    fn test_hierarchical_topology_records_edges() {
        let mut reg = setup();
        // Adopts w1..w3 on registration; build keeps the existing edges
        reg.register(
            Agent::new("sup", AgentType::Supervisor, ["nav"]).with_metric(metric::COORDINATION_SCORE, 0.9),
            Utc::now(),
        )
        .unwrap();
        let topo = PatternCoordinator::new().build(
            &task(CoordinationPattern::Hierarchical, &["sup", "w1", "w2"]),
            &mut reg,
        );
        assert_eq!(topo.leader, Some(AgentId::from("sup")));
        assert_eq!(topo.channels_of(ChannelKind::BroadcastDown).count(), 2);
        assert_eq!(topo.channels_of(ChannelKind::ReportUp).count(), 2);
        assert_eq!(
            topo.decision,
            DecisionPolicy::Escalate {
                supervisor: AgentId::from("sup")
            }
        );
        assert_eq!(
            reg.get(&AgentId::from("w1")).unwrap().supervisor_id,
            Some(AgentId::from("sup"))
        );
        assert!(reg.hierarchy().is_forest());
    }

    #[test]
    fn test_hierarchical_without_supervisor_uses_first_member() {
        let mut reg = setup();
        let topo = PatternCoordinator::new().build(&task(CoordinationPattern::Hierarchical, &["w2", "w1"]), &mut reg);
        assert_eq!(topo.leader, Some(AgentId::from("w2")));
        assert_eq!(topo.channels_of(ChannelKind::ReportUp).count(), 1);
        assert_eq!(reg.get(&AgentId::from("w1")).unwrap().supervisor_id, None);
        assert!(reg.get(&AgentId::from("w2")).unwrap().subordinates.is_empty());
        assert_eq!(reg.hierarchy().edge_count(), 0);
    }

    #[test]
    fn test_hierarchical_edges_respect_max_subordinates() {
        let mut reg = AgentRegistry::new(EngineConfig::default());
        let now = Utc::now();
        for i in 0..7 {
            reg.register(Agent::new(format!("w{}", i), AgentType::Worker, ["nav"]), now)
                .unwrap();
        }
        // Adoption fills the supervisor with w0..w4
        reg.register(Agent::new("sup", AgentType::Supervisor, ["nav"]), now).unwrap();

        let topo = PatternCoordinator::new().build(
            &task(CoordinationPattern::Hierarchical, &["sup", "w5", "w6"]),
            &mut reg,
        );
        assert_eq!(topo.channels_of(ChannelKind::BroadcastDown).count(), 2);
        assert_eq!(reg.get(&AgentId::from("sup")).unwrap().subordinates.len(), 5);
        assert_eq!(reg.get(&AgentId::from("w5")).unwrap().supervisor_id, None);
        assert_eq!(reg.get(&AgentId::from("w6")).unwrap().supervisor_id, None);
    }

    #[test]
    fn test_consensus_topology() {
        let mut reg = setup();
        let topo = PatternCoordinator::new().build(&task(CoordinationPattern::Consensus, &["w1", "w2", "w3"]), &mut reg);
        assert_eq!(topo.channels_of(ChannelKind::AllToAll).count(), 6);
        match topo.decision {
            DecisionPolicy::Vote { threshold, on_tie } => {
                assert!((threshold - 2.0 / 3.0).abs() < 1e-9);
                assert_eq!(on_tie, TiePolicy::Revote);
            }
            other => panic!("unexpected decision {:?}", other),
        }
        assert_eq!(reg.hierarchy().edge_count(), 0);
    }

    #[test]
    fn test_peer_to_peer_topology() {
        let mut reg = setup();
        let topo = PatternCoordinator::new().build(&task(CoordinationPattern::PeerToPeer, &["w1", "w2"]), &mut reg);
        assert_eq!(topo.channels_of(ChannelKind::Direct).count(), 2);
        assert_eq!(
            topo.decision,
            DecisionPolicy::Distributed {
                dynamic_load_balancing: true
            }
        );
    }

    #[test]
    fn test_auction_topology() {
        let mut reg = setup();
        let topo = PatternCoordinator::new().build(&task(CoordinationPattern::Auction, &["w1"]), &mut reg);
        assert!(topo.channels.is_empty());
        assert_eq!(topo.decision, DecisionPolicy::SealedBid { rounds: 1 });
    }
}
