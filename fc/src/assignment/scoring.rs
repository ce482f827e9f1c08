//! Selection scores per coordination pattern
//!
//! Every function reads metrics through `Agent::metric`, so a missing metric
//! counts as the neutral 0.5.

use std::cmp::Ordering;

use crate::domain::{Agent, CoordinationTask, metric};

/// `0.4·consensus_participation + 0.3·communication_reliability + 0.3·(1−load)`
pub fn consensus_score(agent: &Agent) -> f64 {
    0.4 * agent.metric(metric::CONSENSUS_PARTICIPATION)
        + 0.3 * agent.metric(metric::COMMUNICATION_RELIABILITY)
        + 0.3 * (1.0 - agent.current_load)
}

/// `0.4·(1−load) + 0.3·capability_match_ratio + 0.3·task_success_rate`
pub fn auction_bid(agent: &Agent, task: &CoordinationTask) -> f64 {
    0.4 * (1.0 - agent.current_load)
        + 0.3 * capability_match_ratio(agent, task)
        + 0.3 * agent.metric(metric::TASK_SUCCESS_RATE)
}

/// `0.5·(1−load) + 0.5·overall_performance`
pub fn peer_score(agent: &Agent) -> f64 {
    0.5 * (1.0 - agent.current_load) + 0.5 * agent.metric(metric::OVERALL_PERFORMANCE)
}

/// Share of the agent's capabilities the task actually uses
///
/// Specialists bid higher than generalists for the same task.
pub fn capability_match_ratio(agent: &Agent, task: &CoordinationTask) -> f64 {
    if task.required_capabilities.is_empty() || agent.capabilities.is_empty() {
        return 1.0;
    }
    let used = task
        .required_capabilities
        .intersection(&agent.capabilities)
        .count() as f64;
    used / agent.capabilities.len() as f64
}

/// Hierarchical worker order: success rate desc, load asc, response time asc, id asc
pub fn worker_order(a: &Agent, b: &Agent) -> Ordering {
    b.metric(metric::TASK_SUCCESS_RATE)
        .total_cmp(&a.metric(metric::TASK_SUCCESS_RATE))
        .then_with(|| a.current_load.total_cmp(&b.current_load))
        .then_with(|| {
            a.metric(metric::RESPONSE_TIME)
                .total_cmp(&b.metric(metric::RESPONSE_TIME))
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Score each agent and sort best first, ties by id
pub fn rank_by<'a, F>(agents: &[&'a Agent], score: F) -> Vec<(&'a Agent, f64)>
where
    F: Fn(&Agent) -> f64,
{
    let mut scored: Vec<(&'a Agent, f64)> = agents.iter().map(|a| (*a, score(a))).collect();
    scored.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.id.cmp(&b.id)));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentType;

    fn agent(id: &str, load: f64) -> Agent {
        Agent::new(id, AgentType::Worker, ["nav", "manip"]).with_load(load)
    }

    #[test]
    fn test_neutral_scores() {
        let a = agent("a", 0.0);
        assert!((consensus_score(&a) - 0.65).abs() < 1e-9);
        assert!((peer_score(&a) - 0.75).abs() < 1e-9);
        let task = CoordinationTask::new("t", "x").with_capabilities(["nav"]);
        // 0.4 + 0.3 * 0.5 + 0.3 * 0.5
        assert!((auction_bid(&a, &task) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_capability_match_ratio() {
        let a = agent("a", 0.0);
        let task = CoordinationTask::new("t", "x").with_capabilities(["nav"]);
        assert_eq!(capability_match_ratio(&a, &task), 0.5);
        let open = CoordinationTask::new("t", "x");
        assert_eq!(capability_match_ratio(&a, &open), 1.0);
    }

    #[test]
    fn test_worker_order() {
        let strong = agent("b", 0.5).with_metric(metric::TASK_SUCCESS_RATE, 0.9);
        let weak = agent("a", 0.0).with_metric(metric::TASK_SUCCESS_RATE, 0.6);
        assert_eq!(worker_order(&strong, &weak), Ordering::Less);

        let light = agent("z", 0.1);
        let heavy = agent("a", 0.4);
        assert_eq!(worker_order(&light, &heavy), Ordering::Less);

        let fast = agent("z", 0.1).with_metric(metric::RESPONSE_TIME, 0.1);
        let slow = agent("a", 0.1).with_metric(metric::RESPONSE_TIME, 0.9);
        assert_eq!(worker_order(&fast, &slow), Ordering::Less);
    }

    #[test]
    fn test_rank_by_breaks_ties_by_id() {
        let b = agent("b", 0.2);
        let a = agent("a", 0.2);
        let c = agent("c", 0.0);
        let ranked = rank_by(&[&b, &a, &c], peer_score);
        let ids: Vec<&str> = ranked.iter().map(|(a, _)| a.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
