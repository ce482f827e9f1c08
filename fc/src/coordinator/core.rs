//! Main Coordinator task implementation

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::{CycleReport, Engine};
use crate::error::ExecutorError;
use crate::executor::{DispatchRequest, ExecutionEvent, ExecutionReporter, Executor};

use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, Snapshot};

/// Actor that owns the engine and runs the coordination loop
///
/// Every mutation arrives as a [`CoordRequest`] and is applied in order, so
/// ticks never overlap with each other or with API calls. Readers use the
/// published [`Snapshot`] and never wait on the loop.
pub struct Coordinator {
    engine: Engine,
    executor: Arc<dyn Executor>,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
    events_tx: mpsc::Sender<ExecutionEvent>,
    events_rx: mpsc::Receiver<ExecutionEvent>,
    snapshot_tx: watch::Sender<Snapshot>,
    snapshot_rx: watch::Receiver<Snapshot>,
    auto_tick: bool,
}

impl Coordinator {
    /// Create a Coordinator around an engine and an executor
    pub fn new(engine: Engine, executor: Arc<dyn Executor>) -> Self {
        debug!("Coordinator::new: called");
        let buffer = engine.config().channel_buffer;
        let (tx, rx) = mpsc::channel(buffer);
        let (events_tx, events_rx) = mpsc::channel(buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot_of(&engine));
        Self {
            engine,
            executor,
            tx,
            rx,
            events_tx,
            events_rx,
            snapshot_tx,
            snapshot_rx,
            auto_tick: true,
        }
    }

    /// Only tick when asked through the handle
    pub fn manual_ticks(mut self) -> Self {
        debug!("Coordinator::manual_ticks: called");
        self.auto_tick = false;
        self
    }

    /// Get a sender for raw requests
    pub fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    /// Reporter that feeds execution events into this coordinator
    pub fn reporter(&self) -> ExecutionReporter {
        ExecutionReporter::new(self.events_tx.clone())
    }

    /// Create a client handle
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone(), self.snapshot_rx.clone())
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested or
    /// every sender is gone.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.engine.config().tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval fires at once
        interval.tick().await;

        info!(auto_tick = self.auto_tick, interval_ms = self.engine.config().tick_interval_ms, "Coordinator started");

        loop {
            tokio::select! {
                _ = interval.tick(), if self.auto_tick => {
                    self.run_tick();
                }
                Some(event) = self.events_rx.recv() => {
                    self.engine.report(event);
                }
                req = self.rx.recv() => {
                    let Some(req) = req else {
                        debug!("Coordinator: all senders dropped");
                        break;
                    };
                    if !self.handle_request(req) {
                        break;
                    }
                }
            }
        }

        info!(ticks = self.engine.ticks(), "Coordinator stopped");
    }

    /// Apply one request; returns false on shutdown
    fn handle_request(&mut self, req: CoordRequest) -> bool {
        match req {
            CoordRequest::RegisterAgent { agent, reply_tx } => {
                let result = self.engine.register_agent(*agent);
                self.publish();
                let _ = reply_tx.send(result);
            }

            CoordRequest::Heartbeat { agent_id, reply_tx } => {
                let result = self.engine.heartbeat(&agent_id);
                self.publish();
                let _ = reply_tx.send(result);
            }

            CoordRequest::SubmitTask { task, reply_tx } => {
                let result = self.engine.submit_task(*task);
                self.publish();
                let _ = reply_tx.send(result);
            }

            CoordRequest::CancelTask { task_id, reply_tx } => {
                let result = self.engine.cancel_task(&task_id);
                self.publish();
                let _ = reply_tx.send(result);
            }

            CoordRequest::SetMaintenance { agent_id, on, reply_tx } => {
                let result = self.engine.set_maintenance(&agent_id, on);
                self.publish();
                let _ = reply_tx.send(result);
            }

            CoordRequest::Report { event } => {
                self.engine.report(event);
            }

            CoordRequest::Tick { reply_tx } => {
                let report = self.run_tick();
                let _ = reply_tx.send(report);
            }

            CoordRequest::Shutdown => {
                info!("Coordinator shutdown requested");
                return false;
            }
        }
        true
    }

    fn run_tick(&mut self) -> CycleReport {
        // Pick up everything reported since the last tick
        while let Ok(event) = self.events_rx.try_recv() {
            self.engine.report(event);
        }
        let report = self.engine.tick();
        for request in &report.dispatches {
            self.dispatch(request.clone());
        }
        self.publish();
        report
    }

    /// Hand a request to the executor without waiting on it
    ///
    /// A rejection or timeout comes back as a DispatchFailed event.
    fn dispatch(&self, request: DispatchRequest) {
        debug!(task_id = %request.task_id, agent_id = %request.agent_id, "Coordinator::dispatch: called");
        let executor = self.executor.clone();
        let reporter = ExecutionReporter::new(self.events_tx.clone());
        let timeout = self.engine.config().dispatch_timeout();

        tokio::spawn(async move {
            let task_id = request.task_id.clone();
            let agent_id = request.agent_id.clone();
            let reason = match tokio::time::timeout(timeout, executor.dispatch(request, reporter.clone())).await {
                Ok(Ok(handle)) => {
                    debug!(%task_id, %agent_id, dispatch_id = %handle.dispatch_id, "Dispatch accepted");
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => ExecutorError::Timeout {
                    agent: agent_id.clone(),
                    task: task_id.clone(),
                }
                .to_string(),
            };

            warn!(%task_id, %agent_id, %reason, "Dispatch failed");
            let event = ExecutionEvent::DispatchFailed {
                task_id,
                agent_id,
                reason,
            };
            if let Err(e) = reporter.report(event).await {
                debug!(error = %e, "Coordinator::dispatch: coordinator gone before failure was reported");
            }
        });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(snapshot_of(&self.engine));
    }
}

fn snapshot_of(engine: &Engine) -> Snapshot {
    Snapshot {
        agents: engine.snapshot_agents(),
        active_tasks: engine.snapshot_active_tasks(),
        queue: engine.snapshot_queue(),
        queue_stats: engine.queue_stats().clone(),
        ticks: engine.ticks(),
        last_report: engine.last_report().cloned(),
    }
}
