//! Topology descriptors attached to assigned tasks
//!
//! A topology is metadata for the layer that drives execution: who talks to
//! whom and how decisions are made. Nothing here executes anything.

use serde::{Deserialize, Serialize};

use super::id::AgentId;
use super::task::CoordinationPattern;

/// Direction and purpose of a communication channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Supervisor to subordinate instructions
    BroadcastDown,
    /// Subordinate to supervisor status reports
    ReportUp,
    /// Consensus participant to participant
    AllToAll,
    /// Peer-to-peer direct messaging
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub from: AgentId,
    pub to: AgentId,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn new(from: &AgentId, to: &AgentId, kind: ChannelKind) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            kind,
        }
    }
}

/// What happens when a vote ties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TiePolicy {
    Revote,
}

/// How the assigned agents reach decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DecisionPolicy {
    /// Conflicts escalate to the supervisor
    Escalate { supervisor: AgentId },
    /// Votes pass at `threshold` of participants
    Vote { threshold: f64, on_tie: TiePolicy },
    /// Sealed bids, fixed number of rounds
    SealedBid { rounds: u32 },
    /// Every peer decides locally
    Distributed { dynamic_load_balancing: bool },
}

/// Communication and decision topology for one assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub pattern: CoordinationPattern,
    #[serde(default)]
    pub leader: Option<AgentId>,
    pub members: Vec<AgentId>,
    pub channels: Vec<Channel>,
    pub decision: DecisionPolicy,
}

impl Topology {
    /// Channels of a given kind
    pub fn channels_of(&self, kind: ChannelKind) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(move |c| c.kind == kind)
    }
}
