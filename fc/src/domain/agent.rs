//! Agent records and their status lifecycle

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AgentId, GroupId, TaskId};
use super::task::CoordinationPattern;

/// Score returned for any performance metric the agent has no value for
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Well-known performance metric keys
pub mod metric {
    pub const TASK_SUCCESS_RATE: &str = "task_success_rate";
    pub const COORDINATION_SCORE: &str = "coordination_score";
    pub const RESPONSE_TIME: &str = "response_time";
    pub const CONSENSUS_PARTICIPATION: &str = "consensus_participation";
    pub const COMMUNICATION_RELIABILITY: &str = "communication_reliability";
    pub const OVERALL_PERFORMANCE: &str = "overall_performance";
    pub const ERROR_RATE: &str = "error_rate";
}

/// Role an agent plays in coordination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Supervisor,
    #[default]
    Worker,
    Specialist,
    Coordinator,
    Monitor,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supervisor => write!(f, "supervisor"),
            Self::Worker => write!(f, "worker"),
            Self::Specialist => write!(f, "specialist"),
            Self::Coordinator => write!(f, "coordinator"),
            Self::Monitor => write!(f, "monitor"),
        }
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supervisor" => Ok(Self::Supervisor),
            "worker" => Ok(Self::Worker),
            "specialist" => Ok(Self::Specialist),
            "coordinator" => Ok(Self::Coordinator),
            "monitor" => Ok(Self::Monitor),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

/// Agent status
///
/// `Idle`, `Active` and `Busy` are derived from load. `Maintenance` is an
/// operator toggle. `Error` and `Offline` come from status refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Active,
    Busy,
    Maintenance,
    Error,
    Offline,
}

impl AgentStatus {
    /// Status implied by a load value for a healthy agent
    pub fn from_load(load: f64, busy_threshold: f64, idle_threshold: f64) -> Self {
        if load > busy_threshold {
            Self::Busy
        } else if load < idle_threshold {
            Self::Idle
        } else {
            Self::Active
        }
    }

    /// Whether the status is derived from load (and may be recomputed)
    pub fn is_load_derived(&self) -> bool {
        matches!(self, Self::Idle | Self::Active | Self::Busy)
    }

    /// Whether the agent can take or keep work
    pub fn is_healthy(&self) -> bool {
        self.is_load_derived()
    }

    /// Whether an agent in this status has failed its tasks
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Offline | Self::Error)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Busy => write!(f, "busy"),
            Self::Maintenance => write!(f, "maintenance"),
            Self::Error => write!(f, "error"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// A schedulable worker unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,

    #[serde(rename = "type", default)]
    pub agent_type: AgentType,

    pub capabilities: BTreeSet<String>,

    /// Committed fraction of capacity, always in [0, 1]
    #[serde(rename = "current-load", default)]
    pub current_load: f64,

    /// Capacity in the same unit as a task's estimated duration (seconds)
    #[serde(rename = "max-capacity", default = "default_max_capacity")]
    pub max_capacity: f64,

    #[serde(default)]
    pub status: AgentStatus,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(rename = "last-heartbeat", default = "Utc::now")]
    pub last_heartbeat: DateTime<Utc>,

    #[serde(rename = "performance-metrics", default)]
    pub performance_metrics: HashMap<String, f64>,

    #[serde(rename = "current-task-ids", default)]
    pub current_task_ids: Vec<TaskId>,

    /// Load each held task actually added, after clamping at 1.0
    ///
    /// Releasing a task removes exactly this amount.
    #[serde(rename = "task-loads", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_loads: BTreeMap<TaskId, f64>,

    #[serde(rename = "coordination-group", default)]
    pub coordination_group: Option<GroupId>,

    #[serde(rename = "supervisor-id", default)]
    pub supervisor_id: Option<AgentId>,

    #[serde(default)]
    pub subordinates: BTreeSet<AgentId>,

    #[serde(rename = "preferred-coordination", default)]
    pub preferred_coordination: Option<CoordinationPattern>,
}

fn default_max_capacity() -> f64 {
    3600.0
}

impl Agent {
    /// Create an idle agent with the given capabilities
    pub fn new<I, S>(id: impl Into<AgentId>, agent_type: AgentType, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            agent_type,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            current_load: 0.0,
            max_capacity: default_max_capacity(),
            status: AgentStatus::Idle,
            location: None,
            last_heartbeat: Utc::now(),
            performance_metrics: HashMap::new(),
            current_task_ids: Vec::new(),
            task_loads: BTreeMap::new(),
            coordination_group: None,
            supervisor_id: None,
            subordinates: BTreeSet::new(),
            preferred_coordination: None,
        }
    }

    pub fn with_capacity(mut self, max_capacity: f64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_load(mut self, load: f64) -> Self {
        self.current_load = load;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.performance_metrics.insert(name.to_string(), value);
        self
    }

    pub fn with_preferred_coordination(mut self, pattern: CoordinationPattern) -> Self {
        self.preferred_coordination = Some(pattern);
        self
    }

    /// Read a performance metric, defaulting to the neutral score
    pub fn metric(&self, name: &str) -> f64 {
        self.performance_metrics.get(name).copied().unwrap_or(NEUTRAL_SCORE)
    }

    /// Whether this agent's capabilities cover every required capability
    pub fn covers(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }

    /// Load this agent takes on for a task of the given duration
    pub fn load_share(&self, estimated_duration: f64) -> f64 {
        if self.max_capacity <= 0.0 {
            return 1.0;
        }
        (estimated_duration / self.max_capacity).max(0.0)
    }

    pub fn has_task(&self, task_id: &TaskId) -> bool {
        self.current_task_ids.contains(task_id)
    }

    /// Load carried by held tasks
    pub fn task_load(&self) -> f64 {
        self.task_loads.values().sum()
    }
}
