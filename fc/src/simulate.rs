//! Scenario runner behind `fc simulate`
//!
//! A scenario is a YAML file naming the fleet, the tasks to submit and the
//! fixed metric values each agent reports. The run drives a real
//! [`Coordinator`] with manual ticks and an in-process executor, on a clock
//! that advances one tick interval per cycle.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colored::*;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, ManualClock};
use crate::coordinator::{Coordinator, Snapshot};
use crate::domain::{Agent, AgentId, CoordinationTask};
use crate::engine::{CycleReport, Engine, EngineConfig};
use crate::executor::LocalExecutor;
use crate::metrics::StaticMetrics;

/// Time given to executor reports to reach the coordinator between ticks
const SETTLE: Duration = Duration::from_millis(20);

/// A task as written in a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioTask {
    #[serde(flatten)]
    pub task: CoordinationTask,

    /// Deadline relative to the start of the run
    #[serde(rename = "deadline-secs", default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<i64>,
}

/// Fleet, workload and metric table for one simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Registered in file order
    pub agents: Vec<Agent>,

    /// Submitted in file order before the first tick
    pub tasks: Vec<ScenarioTask>,

    /// Agent id to metric name to value
    pub metrics: HashMap<AgentId, HashMap<String, f64>>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!(path = %path.as_ref().display(), "Scenario::load: called");
        let content = fs::read_to_string(&path).context("Failed to read scenario file")?;
        let scenario: Self = serde_yaml::from_str(&content).context("Failed to parse scenario file")?;
        info!(
            agents = scenario.agents.len(),
            tasks = scenario.tasks.len(),
            "Loaded scenario from: {}",
            path.as_ref().display()
        );
        Ok(scenario)
    }
}

/// Per-tick reports and the state after the last tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub reports: Vec<CycleReport>,
    pub snapshot: Snapshot,
}

/// Run `scenario` for `ticks` coordination cycles
pub async fn run(config: &EngineConfig, scenario: Scenario, ticks: u32) -> Result<SimulationResult> {
    debug!(ticks, "simulate::run: called");
    let clock = ManualClock::new(Utc::now());
    let start = clock.now();
    let step = chrono::Duration::milliseconds(config.tick_interval_ms as i64);

    let engine = Engine::new(
        config.clone(),
        Arc::new(StaticMetrics::from_table(scenario.metrics)),
        Arc::new(clock.clone()),
    );
    let coordinator = Coordinator::new(engine, Arc::new(LocalExecutor::new())).manual_ticks();
    let handle = coordinator.handle();
    let join = tokio::spawn(coordinator.run());

    let mut agent_ids = Vec::with_capacity(scenario.agents.len());
    for agent in scenario.agents {
        let id = agent.id.clone();
        let group = handle
            .register_agent(agent)
            .await
            .context(format!("Failed to register agent {}", id))?;
        debug!(agent_id = %id, %group, "simulate::run: registered");
        agent_ids.push(id);
    }

    for entry in scenario.tasks {
        let mut task = entry.task;
        if let Some(secs) = entry.deadline_secs {
            task.deadline = Some(start + chrono::Duration::seconds(secs));
        }
        let id = task.id.clone();
        if let Err(e) = handle.submit_task(task).await {
            warn!(task_id = %id, error = %e, "Scenario task rejected");
        }
    }

    let mut reports = Vec::with_capacity(ticks as usize);
    for _ in 0..ticks {
        clock.advance(step);
        // The simulated fleet is always alive
        for id in &agent_ids {
            handle.heartbeat(id).await?;
        }
        reports.push(handle.tick().await?);
        tokio::time::sleep(SETTLE).await;
    }

    let snapshot = handle.snapshot();
    handle.shutdown().await?;
    join.await.context("Coordinator task panicked")?;

    info!(ticks = reports.len(), "Simulation finished");
    Ok(SimulationResult { reports, snapshot })
}

pub fn render_json(result: &SimulationResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize simulation result")
}

pub fn render_text(result: &SimulationResult) -> String {
    let mut out = String::new();

    for report in &result.reports {
        out.push_str(&format!(
            "{} {:>3}  assigned {}  started {}  completed {}  failed {}  delayed {}  rebalanced {}  queue {}  active {}\n",
            "tick".bold(),
            report.tick,
            report.tasks_assigned.to_string().green(),
            report.tasks_started,
            report.tasks_completed.to_string().green(),
            report.tasks_failed.to_string().red(),
            report.tasks_delayed.to_string().yellow(),
            report.tasks_rebalanced,
            report.queue_depth,
            report.active_tasks,
        ));
        for error in &report.errors {
            out.push_str(&format!("       {} {}\n", "error".red(), error));
        }
    }

    out.push_str(&format!("\n{}\n", "Agents".bold()));
    for agent in &result.snapshot.agents {
        out.push_str(&format!(
            "  {:<16} {:<10} {:<12} load {:.2}  tasks {}\n",
            agent.id.as_str().cyan(),
            agent.agent_type.to_string(),
            agent.status.to_string(),
            agent.current_load,
            agent.current_task_ids.len(),
        ));
    }

    out.push_str(&format!("\n{}\n", "Active tasks".bold()));
    if result.snapshot.active_tasks.is_empty() {
        out.push_str(&format!("  {}\n", "none".dimmed()));
    }
    for task in &result.snapshot.active_tasks {
        let agents: Vec<&str> = task.assigned_agent_ids.iter().map(|id| id.as_str()).collect();
        out.push_str(&format!(
            "  {:<16} {:<10} {:<14} [{}]\n",
            task.id.as_str().cyan(),
            task.status.to_string(),
            task.coordination_pattern.to_string(),
            agents.join(", "),
        ));
    }

    out.push_str(&format!("\n{}\n", "Queue".bold()));
    if result.snapshot.queue.is_empty() {
        out.push_str(&format!("  {}\n", "empty".dimmed()));
    }
    for task in &result.snapshot.queue {
        out.push_str(&format!(
            "  {:<16} {:<10} priority {}  attempts {}{}\n",
            task.id.as_str().cyan(),
            task.status.to_string(),
            task.priority,
            task.attempts,
            task.last_error
                .as_deref()
                .map(|e| format!("  ({})", e))
                .unwrap_or_default(),
        ));
    }

    out
}
