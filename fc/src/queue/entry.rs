//! Queue entry ordering

use std::cmp::Ordering;

use crate::domain::CoordinationTask;

/// A queued task ordered for a max-heap
///
/// Higher priority first, then earlier deadline (tasks without one last),
/// then earlier submission, then task id.
#[derive(Debug, Clone)]
pub struct QueuedTask(pub CoordinationTask);

impl Eq for QueuedTask {}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        a.priority
            .cmp(&b.priority)
            .then_with(|| match (a.deadline, b.deadline) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| b.submitted_at.cmp(&a.submitted_at))
            .then_with(|| b.id.cmp(&a.id))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
