//! Pull-model performance metrics

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::domain::AgentId;

/// Supplies fresh performance metrics for an agent once per cycle
///
/// Missing keys are left alone; reads of an absent metric fall back to the
/// neutral score.
pub trait MetricsSource: Send + Sync {
    fn snapshot(&self, agent_id: &AgentId) -> HashMap<String, f64>;
}

/// Fixed metrics table, settable at runtime
#[derive(Debug, Default)]
pub struct StaticMetrics {
    table: RwLock<HashMap<AgentId, HashMap<String, f64>>>,
}

impl StaticMetrics {
    pub fn new() -> Self {
        debug!("StaticMetrics::new: called");
        Self::default()
    }

    pub fn from_table(table: HashMap<AgentId, HashMap<String, f64>>) -> Self {
        debug!(agents = table.len(), "StaticMetrics::from_table: called");
        Self {
            table: RwLock::new(table),
        }
    }

    pub fn set(&self, agent_id: &AgentId, name: &str, value: f64) {
        debug!(%agent_id, %name, value, "StaticMetrics::set: called");
        if let Ok(mut table) = self.table.write() {
            table
                .entry(agent_id.clone())
                .or_default()
                .insert(name.to_string(), value);
        }
    }
}

impl MetricsSource for StaticMetrics {
    fn snapshot(&self, agent_id: &AgentId) -> HashMap<String, f64> {
        self.table
            .read()
            .ok()
            .and_then(|table| table.get(agent_id).cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric;

    #[test]
    fn test_static_metrics() {
        let metrics = StaticMetrics::new();
        let id = AgentId::from("a");
        assert!(metrics.snapshot(&id).is_empty());

        metrics.set(&id, metric::ERROR_RATE, 0.3);
        assert_eq!(metrics.snapshot(&id).get(metric::ERROR_RATE), Some(&0.3));
        assert!(metrics.snapshot(&AgentId::from("b")).is_empty());
    }
}
