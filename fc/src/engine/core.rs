//! Engine implementation: the coordination cycle

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assignment::AssignmentEngine;
use crate::clock::Clock;
use crate::conflict::{ConflictOutcome, ConflictResolver};
use crate::domain::{Agent, AgentId, CoordinationTask, GroupId, TaskId, TaskStatus};
use crate::error::{EngineError, RegistrationError, SubmitError};
use crate::executor::{DispatchRequest, ExecutionEvent};
use crate::metrics::MetricsSource;
use crate::monitor::{ExecutionMonitor, MonitorOutcome};
use crate::optimizer::LoadOptimizer;
use crate::queue::QueueStats;

use super::{EngineConfig, EngineState};

/// Summary of one coordination tick
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub tick: u64,
    #[serde(rename = "started-at")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "status-changes")]
    pub status_changes: usize,
    /// Tasks that left the queue: assigned, expired or dropped
    #[serde(rename = "tasks-processed")]
    pub tasks_processed: usize,
    #[serde(rename = "tasks-assigned")]
    pub tasks_assigned: usize,
    #[serde(rename = "assignment-failures")]
    pub assignment_failures: usize,
    #[serde(rename = "tasks-expired")]
    pub tasks_expired: usize,
    #[serde(rename = "tasks-started")]
    pub tasks_started: usize,
    #[serde(rename = "tasks-completed")]
    pub tasks_completed: usize,
    #[serde(rename = "tasks-failed")]
    pub tasks_failed: usize,
    pub replacements: usize,
    #[serde(rename = "tasks-delayed")]
    pub tasks_delayed: usize,
    #[serde(rename = "metrics-updated")]
    pub metrics_updated: usize,
    #[serde(rename = "conflicts-detected")]
    pub conflicts_detected: usize,
    #[serde(rename = "conflicts-resolved")]
    pub conflicts_resolved: usize,
    #[serde(rename = "tasks-rebalanced")]
    pub tasks_rebalanced: usize,
    #[serde(rename = "queue-depth")]
    pub queue_depth: usize,
    #[serde(rename = "active-tasks")]
    pub active_tasks: usize,
    /// New work for the executor
    #[serde(default)]
    pub dispatches: Vec<DispatchRequest>,
    /// Step failures; the tick carried on past each one
    #[serde(default)]
    pub errors: Vec<String>,
}

type Step = fn(&mut Engine, DateTime<Utc>, &mut CycleReport) -> Result<(), EngineError>;

/// The coordination engine
///
/// Owns every agent and task. All mutation goes through `&mut self`, so one
/// owner serializes callers and ticks.
pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    assignment: AssignmentEngine,
    monitor: ExecutionMonitor,
    conflicts: ConflictResolver,
    optimizer: LoadOptimizer,
    metrics: Arc<dyn MetricsSource>,
    clock: Arc<dyn Clock>,
    pending_events: Vec<ExecutionEvent>,
    ticks: u64,
    last_report: Option<CycleReport>,
}

impl Engine {
    pub fn new(config: EngineConfig, metrics: Arc<dyn MetricsSource>, clock: Arc<dyn Clock>) -> Self {
        debug!("Engine::new: called");
        Self {
            state: EngineState::new(config.clone()),
            assignment: AssignmentEngine::new(config.clone()),
            monitor: ExecutionMonitor::new(),
            conflicts: ConflictResolver::new(),
            optimizer: LoadOptimizer::new(&config),
            config,
            metrics,
            clock,
            pending_events: Vec::new(),
            ticks: 0,
            last_report: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn register_agent(&mut self, agent: Agent) -> Result<GroupId, RegistrationError> {
        debug!(agent_id = %agent.id, "Engine::register_agent: called");
        let now = self.clock.now();
        self.state.registry.register(agent, now)
    }

    pub fn heartbeat(&mut self, agent_id: &AgentId) -> Result<(), EngineError> {
        let now = self.clock.now();
        self.state.registry.heartbeat(agent_id, now)
    }

    pub fn set_maintenance(&mut self, agent_id: &AgentId, on: bool) -> Result<(), EngineError> {
        self.state.registry.set_maintenance(agent_id, on)
    }

    /// Queue a new task as Pending
    pub fn submit_task(&mut self, mut task: CoordinationTask) -> Result<TaskId, SubmitError> {
        debug!(task_id = %task.id, "Engine::submit_task: called");
        if task.id.is_empty() {
            task.id = TaskId::generate(&task.task_type);
        }
        if self.state.knows_task(&task.id) {
            return Err(SubmitError::DuplicateTask(task.id));
        }
        if task.required_agents == 0 {
            return Err(SubmitError::InvalidTask {
                id: task.id,
                reason: "requires at least one agent".to_string(),
            });
        }
        if !task.estimated_duration.is_finite() || task.estimated_duration < 0.0 {
            return Err(SubmitError::InvalidTask {
                id: task.id,
                reason: format!("has invalid duration {}", task.estimated_duration),
            });
        }

        task.status = TaskStatus::Pending;
        task.assigned_agent_ids.clear();
        task.topology = None;
        task.attempts = 0;
        task.last_error = None;
        task.submitted_at = self.clock.now();

        let task_id = task.id.clone();
        info!(%task_id, task_type = %task.task_type, priority = task.priority, "Task submitted");
        self.state.queue.push(task);
        Ok(task_id)
    }

    /// Withdraw a queued or active task; it ends as Failed
    ///
    /// Returns the status the task had.
    pub fn cancel_task(&mut self, task_id: &TaskId) -> Result<TaskStatus, EngineError> {
        debug!(%task_id, "Engine::cancel_task: called");
        if let Some(task) = self.state.queue.remove(task_id) {
            let previous = task.status;
            self.state.drop_queued(task, "cancelled");
            return Ok(previous);
        }
        if let Some(task) = self.state.active.get_mut(task_id) {
            let previous = task.status;
            task.last_error = Some("cancelled".to_string());
            self.state.finish(task_id, TaskStatus::Failed);
            return Ok(previous);
        }
        match self.state.finished.get(task_id) {
            Some(status) => Err(EngineError::TaskNotActive {
                task: task_id.clone(),
                status: status.to_string(),
            }),
            None => Err(EngineError::UnknownTask(task_id.clone())),
        }
    }

    /// Queue an execution event for the next tick
    pub fn report(&mut self, event: ExecutionEvent) {
        debug!(task_id = %event.task_id(), "Engine::report: called");
        self.pending_events.push(event);
    }

    /// Run one coordination cycle
    ///
    /// Steps run in a fixed order. A failing step is logged and recorded in
    /// the report; later steps still run and earlier mutations stand.
    pub fn tick(&mut self) -> CycleReport {
        self.ticks += 1;
        let now = self.clock.now();
        debug!(tick = self.ticks, %now, "Engine::tick: called");

        let mut report = CycleReport {
            tick: self.ticks,
            started_at: Some(now),
            ..Default::default()
        };

        let steps: [(&str, Step); 6] = [
            ("refresh-statuses", Engine::refresh_statuses),
            ("assign", Engine::assign_ready),
            ("monitor", Engine::monitor_execution),
            ("refresh-metrics", Engine::refresh_metrics),
            ("resolve-conflicts", Engine::resolve_conflicts),
            ("optimize-load", Engine::optimize_load),
        ];
        for (name, step) in steps {
            if let Err(e) = step(self, now, &mut report) {
                warn!(tick = self.ticks, step = name, error = %e, "Cycle step failed");
                report.errors.push(format!("{}: {}", name, e));
            }
        }

        report.queue_depth = self.state.queue.len();
        report.active_tasks = self.state.active.len();
        info!(
            tick = report.tick,
            assigned = report.tasks_assigned,
            completed = report.tasks_completed,
            delayed = report.tasks_delayed,
            rebalanced = report.tasks_rebalanced,
            queue = report.queue_depth,
            active = report.active_tasks,
            "Cycle complete"
        );
        self.last_report = Some(report.clone());
        report
    }

    fn refresh_statuses(&mut self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<(), EngineError> {
        report.status_changes = self.state.registry.refresh_statuses(now);
        Ok(())
    }

    /// Drain the queue and try to assign everything that is ready
    fn assign_ready(&mut self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<(), EngineError> {
        let drained = self.state.queue.drain(now, &self.state.finished);
        debug!(
            ready = drained.ready.len(),
            expired = drained.expired.len(),
            "Engine::assign_ready: drained"
        );

        for task in drained.expired {
            report.tasks_expired += 1;
            report.tasks_processed += 1;
            self.state.drop_queued(task, "deadline elapsed");
        }
        for task in drained.dependency_failed {
            report.tasks_failed += 1;
            report.tasks_processed += 1;
            self.state.drop_queued(task, "dependency failed");
        }

        for mut task in drained.ready {
            match self
                .assignment
                .assign_task(&mut task, &mut self.state.registry, &self.state.patterns)
            {
                Ok(_) => {
                    report.tasks_assigned += 1;
                    report.tasks_processed += 1;
                    report.dispatches.extend(DispatchRequest::for_task(&task));
                    self.state.active.insert(task.id.clone(), task);
                }
                Err(e) => {
                    debug!(task_id = %task.id, reason = e.reason(), "Engine::assign_ready: assignment failed");
                    report.assignment_failures += 1;
                    task.last_error = Some(e.to_string());
                    self.state.queue.requeue(task);
                }
            }
        }
        Ok(())
    }

    /// Apply queued execution events, then replace failed agents
    fn monitor_execution(&mut self, _now: DateTime<Utc>, report: &mut CycleReport) -> Result<(), EngineError> {
        let mut outcome = MonitorOutcome::default();
        for event in std::mem::take(&mut self.pending_events) {
            if let Err(e) = self.monitor.ingest(&mut self.state, event, &mut outcome) {
                warn!(error = %e, "Execution event not applied");
                report.errors.push(format!("monitor: {}", e));
            }
        }
        let checked = self.monitor.check_agents(&mut self.state, &mut outcome);

        report.tasks_started += outcome.started;
        report.tasks_completed += outcome.completed;
        report.tasks_failed += outcome.failed;
        report.replacements += outcome.replacements;
        report.tasks_delayed += outcome.delayed;
        report.dispatches.extend(outcome.dispatches);
        checked
    }

    /// Pull fresh performance metrics for every agent
    fn refresh_metrics(&mut self, _now: DateTime<Utc>, report: &mut CycleReport) -> Result<(), EngineError> {
        for agent_id in self.state.registry.ids() {
            let fresh = self.metrics.snapshot(&agent_id);
            if !fresh.is_empty() && self.state.registry.merge_metrics(&agent_id, fresh) {
                report.metrics_updated += 1;
            }
        }
        Ok(())
    }

    fn resolve_conflicts(&mut self, _now: DateTime<Utc>, report: &mut CycleReport) -> Result<(), EngineError> {
        let mut outcome = ConflictOutcome::default();
        let resources = self.conflicts.resolve_resource_conflicts(&mut self.state, &mut outcome);
        self.conflicts.resolve_pattern_conflicts(&mut self.state, &mut outcome);

        report.conflicts_detected += outcome.detected;
        report.conflicts_resolved += outcome.resolved;
        report.replacements += outcome.replacements;
        report.tasks_delayed += outcome.delayed;
        report.dispatches.extend(outcome.dispatches);
        resources
    }

    fn optimize_load(&mut self, _now: DateTime<Utc>, report: &mut CycleReport) -> Result<(), EngineError> {
        let outcome = self.optimizer.optimize(&mut self.state);
        report.tasks_rebalanced += outcome.migrations.len();
        report.dispatches.extend(outcome.dispatches);
        Ok(())
    }

    pub fn snapshot_agents(&self) -> Vec<Agent> {
        self.state.registry.snapshot()
    }

    pub fn snapshot_active_tasks(&self) -> Vec<CoordinationTask> {
        self.state.active.values().cloned().collect()
    }

    pub fn snapshot_queue(&self) -> Vec<CoordinationTask> {
        self.state.queue.snapshot()
    }

    pub fn task_status(&self, task_id: &TaskId) -> Option<TaskStatus> {
        if let Some(task) = self.state.active.get(task_id) {
            return Some(task.status);
        }
        if let Some(task) = self.state.queue.get(task_id) {
            return Some(task.status);
        }
        self.state.finished.get(task_id).copied()
    }

    pub fn agent(&self, agent_id: &AgentId) -> Option<&Agent> {
        self.state.registry.get(agent_id)
    }

    pub fn queue_stats(&self) -> &QueueStats {
        self.state.queue.stats()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }
}
