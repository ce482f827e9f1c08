//! TaskQueue implementation

use std::collections::{BinaryHeap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{CoordinationTask, TaskId, TaskStatus};

use super::entry::QueuedTask;

/// Counters kept by the queue
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_enqueued: u64,
    pub total_requeued: u64,
    pub total_expired: u64,
    pub total_dependency_failures: u64,
    pub peak_depth: usize,
}

/// Result of draining the queue at one instant
#[derive(Debug, Default)]
pub struct DrainOutcome {
    /// Dependencies satisfied, in queue order
    pub ready: Vec<CoordinationTask>,
    /// Deadline elapsed before assignment
    pub expired: Vec<CoordinationTask>,
    /// A dependency ended in Failed
    pub dependency_failed: Vec<CoordinationTask>,
}

/// Pending and delayed tasks ordered by priority then deadline
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    ids: HashSet<TaskId>,
    stats: QueueStats,
}

impl TaskQueue {
    pub fn new() -> Self {
        debug!("TaskQueue::new: called");
        Self::default()
    }

    /// Add a newly submitted task
    pub fn push(&mut self, task: CoordinationTask) -> bool {
        debug!(task_id = %task.id, priority = task.priority, "TaskQueue::push: called");
        if !self.insert(task) {
            return false;
        }
        self.stats.total_enqueued += 1;
        true
    }

    /// Put a task back after a failed assignment or a delay
    pub fn requeue(&mut self, task: CoordinationTask) -> bool {
        debug!(task_id = %task.id, status = %task.status, "TaskQueue::requeue: called");
        if !self.insert(task) {
            return false;
        }
        self.stats.total_requeued += 1;
        true
    }

    fn insert(&mut self, task: CoordinationTask) -> bool {
        if !self.ids.insert(task.id.clone()) {
            debug!(task_id = %task.id, "TaskQueue::insert: already queued");
            return false;
        }
        self.heap.push(QueuedTask(task));
        self.stats.peak_depth = self.stats.peak_depth.max(self.heap.len());
        true
    }

    /// Take every task that can be attempted now
    ///
    /// Expired tasks and tasks with a failed dependency are removed and
    /// returned separately. Tasks still waiting on dependencies stay queued.
    pub fn drain(&mut self, now: DateTime<Utc>, finished: &HashMap<TaskId, TaskStatus>) -> DrainOutcome {
        debug!(depth = self.heap.len(), "TaskQueue::drain: called");
        let mut outcome = DrainOutcome::default();
        let mut blocked = Vec::new();

        while let Some(QueuedTask(task)) = self.heap.pop() {
            if task.is_expired(now) {
                info!(task_id = %task.id, deadline = ?task.deadline, "Task expired in queue");
                self.stats.total_expired += 1;
                self.ids.remove(&task.id);
                outcome.expired.push(task);
                continue;
            }

            let failed_dep = task
                .dependencies
                .iter()
                .any(|dep| finished.get(dep) == Some(&TaskStatus::Failed));
            if failed_dep {
                info!(task_id = %task.id, "Task dependency failed");
                self.stats.total_dependency_failures += 1;
                self.ids.remove(&task.id);
                outcome.dependency_failed.push(task);
                continue;
            }

            let ready = task
                .dependencies
                .iter()
                .all(|dep| finished.get(dep) == Some(&TaskStatus::Completed));
            if ready {
                self.ids.remove(&task.id);
                outcome.ready.push(task);
            } else {
                debug!(task_id = %task.id, "TaskQueue::drain: waiting on dependencies");
                blocked.push(QueuedTask(task));
            }
        }

        self.heap.extend(blocked);
        outcome
    }

    /// Remove a queued task
    pub fn remove(&mut self, task_id: &TaskId) -> Option<CoordinationTask> {
        debug!(%task_id, "TaskQueue::remove: called");
        if !self.ids.remove(task_id) {
            return None;
        }
        let mut removed = None;
        let kept: Vec<QueuedTask> = self
            .heap
            .drain()
            .filter_map(|entry| {
                if &entry.0.id == task_id {
                    removed = Some(entry.0);
                    None
                } else {
                    Some(entry)
                }
            })
            .collect();
        self.heap = kept.into_iter().collect();
        removed
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.ids.contains(task_id)
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&CoordinationTask> {
        self.heap.iter().map(|e| &e.0).find(|t| &t.id == task_id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Copy of the queue in drain order
    pub fn snapshot(&self) -> Vec<CoordinationTask> {
        let mut entries: Vec<QueuedTask> = self.heap.iter().cloned().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(id: &str, priority: i32) -> CoordinationTask {
        CoordinationTask::new(id, "survey").with_priority(priority)
    }

    #[test]
    fn test_drain_orders_by_priority() {
        let mut queue = TaskQueue::new();
        queue.push(task("low", 1));
        queue.push(task("high", 9));
        queue.push(task("mid", 5));

        let outcome = queue.drain(Utc::now(), &HashMap::new());
        let ids: Vec<&str> = outcome.ready.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicate_push_rejected() {
        let mut queue = TaskQueue::new();
        assert!(queue.push(task("a", 1)));
        assert!(!queue.push(task("a", 2)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats().total_enqueued, 1);
    }

    #[test]
    fn test_expired_tasks_are_dropped() {
        let mut queue = TaskQueue::new();
        let now = Utc::now();
        queue.push(task("stale", 9).with_deadline(now - Duration::seconds(5)));
        queue.push(task("fresh", 1).with_deadline(now + Duration::minutes(5)));

        let outcome = queue.drain(now, &HashMap::new());
        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(outcome.expired[0].id.as_str(), "stale");
        assert_eq!(outcome.ready.len(), 1);
        assert!(!queue.contains(&TaskId::from("stale")));
        assert_eq!(queue.stats().total_expired, 1);
    }

    #[test]
    fn test_dependencies_gate_readiness() {
        let mut queue = TaskQueue::new();
        queue.push(task("child", 5).with_dependencies(["parent"]));

        let outcome = queue.drain(Utc::now(), &HashMap::new());
        assert!(outcome.ready.is_empty());
        assert_eq!(queue.len(), 1);

        let mut finished = HashMap::new();
        finished.insert(TaskId::from("parent"), TaskStatus::Completed);
        let outcome = queue.drain(Utc::now(), &finished);
        assert_eq!(outcome.ready.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_failed_dependency_drops_task() {
        let mut queue = TaskQueue::new();
        queue.push(task("child", 5).with_dependencies(["parent"]));
        let mut finished = HashMap::new();
        finished.insert(TaskId::from("parent"), TaskStatus::Failed);

        let outcome = queue.drain(Utc::now(), &finished);
        assert_eq!(outcome.dependency_failed.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_and_remove() {
        let mut queue = TaskQueue::new();
        queue.push(task("a", 1));
        let outcome = queue.drain(Utc::now(), &HashMap::new());
        assert!(queue.requeue(outcome.ready.into_iter().next().unwrap()));
        assert_eq!(queue.stats().total_requeued, 1);

        queue.push(task("b", 2));
        let removed = queue.remove(&TaskId::from("a")).unwrap();
        assert_eq!(removed.id.as_str(), "a");
        assert!(queue.remove(&TaskId::from("a")).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_snapshot_in_drain_order() {
        let mut queue = TaskQueue::new();
        queue.push(task("low", 1));
        queue.push(task("high", 3));
        let ids: Vec<String> = queue.snapshot().into_iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids, vec!["high", "low"]);
        assert_eq!(queue.len(), 2);
    }
}
