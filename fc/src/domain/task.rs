//! Coordination tasks and their lifecycle

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AgentId, TaskId};
use super::topology::Topology;

/// Decision and communication topology governing how assigned agents cooperate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinationPattern {
    Hierarchical,
    Consensus,
    Auction,
    #[default]
    PeerToPeer,
}

impl std::fmt::Display for CoordinationPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hierarchical => write!(f, "hierarchical"),
            Self::Consensus => write!(f, "consensus"),
            Self::Auction => write!(f, "auction"),
            Self::PeerToPeer => write!(f, "peer-to-peer"),
        }
    }
}

impl std::str::FromStr for CoordinationPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hierarchical" => Ok(Self::Hierarchical),
            "consensus" => Ok(Self::Consensus),
            "auction" => Ok(Self::Auction),
            "peer-to-peer" | "peer_to_peer" | "p2p" => Ok(Self::PeerToPeer),
            _ => Err(format!("Unknown coordination pattern: {}", s)),
        }
    }
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Assigned,
    Executing,
    Delayed,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Waiting in the queue for agents
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Pending | Self::Delayed)
    }

    /// Holding agents
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::Executing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Assigned => write!(f, "assigned"),
            Self::Executing => write!(f, "executing"),
            Self::Delayed => write!(f, "delayed"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of work requiring a count and capability set of agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationTask {
    /// Left empty to have one generated on submit
    #[serde(default)]
    pub id: TaskId,

    #[serde(rename = "task-type")]
    pub task_type: String,

    /// Higher is more urgent
    #[serde(default)]
    pub priority: i32,

    #[serde(rename = "required-agents", default = "default_required_agents")]
    pub required_agents: usize,

    #[serde(rename = "required-capabilities", default)]
    pub required_capabilities: BTreeSet<String>,

    #[serde(rename = "coordination-pattern", default)]
    pub coordination_pattern: CoordinationPattern,

    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,

    #[serde(rename = "assigned-agent-ids", default)]
    pub assigned_agent_ids: Vec<AgentId>,

    #[serde(default)]
    pub status: TaskStatus,

    /// Tasks that must complete before this one is assignable
    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    /// Seconds
    #[serde(rename = "estimated-duration", default)]
    pub estimated_duration: f64,

    /// Needs agents with a physical location
    #[serde(default)]
    pub physical: bool,

    /// Opaque command handed to the executor
    #[serde(default)]
    pub command: serde_json::Value,

    #[serde(rename = "submitted-at", default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,

    /// Number of assignment attempts so far
    #[serde(default)]
    pub attempts: u32,

    #[serde(rename = "last-error", default)]
    pub last_error: Option<String>,

    #[serde(default)]
    pub topology: Option<Topology>,
}

fn default_required_agents() -> usize {
    1
}

impl CoordinationTask {
    /// Create a pending task needing one agent
    pub fn new(id: impl Into<TaskId>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            priority: 0,
            required_agents: default_required_agents(),
            required_capabilities: BTreeSet::new(),
            coordination_pattern: CoordinationPattern::default(),
            deadline: None,
            assigned_agent_ids: Vec::new(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            estimated_duration: 0.0,
            physical: false,
            command: serde_json::Value::Null,
            submitted_at: Utc::now(),
            attempts: 0,
            last_error: None,
            topology: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_required_agents(mut self, count: usize) -> Self {
        self.required_agents = count;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pattern(mut self, pattern: CoordinationPattern) -> Self {
        self.coordination_pattern = pattern;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.estimated_duration = seconds;
        self
    }

    pub fn with_dependencies<I, T>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_command(mut self, command: serde_json::Value) -> Self {
        self.command = command;
        self
    }

    pub fn physical(mut self) -> Self {
        self.physical = true;
        self
    }

    /// Whether the deadline has elapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}
