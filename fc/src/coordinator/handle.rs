//! CoordinatorHandle - Client interface to the coordination loop

use eyre::{Result, eyre};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::domain::{Agent, AgentId, CoordinationTask, GroupId, TaskId, TaskStatus};
use crate::engine::CycleReport;
use crate::executor::ExecutionEvent;

use super::messages::{CoordRequest, Snapshot};

/// Handle for callers to interact with the Coordinator
///
/// Cloneable. Mutations are queued to the Coordinator task and awaited;
/// reads come from the latest published snapshot and never block the loop.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
    snapshot_rx: watch::Receiver<Snapshot>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>, snapshot_rx: watch::Receiver<Snapshot>) -> Self {
        debug!("CoordinatorHandle::new: called");
        Self { tx, snapshot_rx }
    }

    async fn send(&self, req: CoordRequest) -> Result<()> {
        self.tx
            .send(req)
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))
    }

    /// Register an agent; returns the coordination group it joined
    pub async fn register_agent(&self, agent: Agent) -> Result<GroupId> {
        debug!(agent_id = %agent.id, "CoordinatorHandle::register_agent: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::RegisterAgent {
            agent: Box::new(agent),
            reply_tx,
        })
        .await?;
        let group = reply_rx.await.map_err(|_| eyre!("Coordinator shut down"))??;
        Ok(group)
    }

    pub async fn heartbeat(&self, agent_id: &AgentId) -> Result<()> {
        debug!(%agent_id, "CoordinatorHandle::heartbeat: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::Heartbeat {
            agent_id: agent_id.clone(),
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| eyre!("Coordinator shut down"))??;
        Ok(())
    }

    /// Queue a task; it is attempted on the next tick
    pub async fn submit_task(&self, task: CoordinationTask) -> Result<TaskId> {
        debug!(task_id = %task.id, "CoordinatorHandle::submit_task: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::SubmitTask {
            task: Box::new(task),
            reply_tx,
        })
        .await?;
        let task_id = reply_rx.await.map_err(|_| eyre!("Coordinator shut down"))??;
        Ok(task_id)
    }

    /// Cancel a task; returns the status it had
    pub async fn cancel_task(&self, task_id: &TaskId) -> Result<TaskStatus> {
        debug!(%task_id, "CoordinatorHandle::cancel_task: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::CancelTask {
            task_id: task_id.clone(),
            reply_tx,
        })
        .await?;
        let status = reply_rx.await.map_err(|_| eyre!("Coordinator shut down"))??;
        Ok(status)
    }

    pub async fn set_maintenance(&self, agent_id: &AgentId, on: bool) -> Result<()> {
        debug!(%agent_id, on, "CoordinatorHandle::set_maintenance: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::SetMaintenance {
            agent_id: agent_id.clone(),
            on,
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| eyre!("Coordinator shut down"))??;
        Ok(())
    }

    /// Report execution progress; applied on the next tick
    pub async fn report(&self, event: ExecutionEvent) -> Result<()> {
        debug!(task_id = %event.task_id(), "CoordinatorHandle::report: called");
        self.send(CoordRequest::Report { event }).await
    }

    /// Run a coordination cycle now and wait for its report
    pub async fn tick(&self) -> Result<CycleReport> {
        debug!("CoordinatorHandle::tick: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CoordRequest::Tick { reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Coordinator shut down"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.send(CoordRequest::Shutdown).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn snapshot_agents(&self) -> Vec<Agent> {
        self.snapshot_rx.borrow().agents.clone()
    }

    pub fn snapshot_active_tasks(&self) -> Vec<CoordinationTask> {
        self.snapshot_rx.borrow().active_tasks.clone()
    }

    pub fn snapshot_queue(&self) -> Vec<CoordinationTask> {
        self.snapshot_rx.borrow().queue.clone()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.snapshot_rx.borrow().last_report.clone()
    }

    /// Receiver that wakes on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }
}
