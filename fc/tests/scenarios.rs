//! End-to-end coordination scenarios against the engine
//!
//! Each test drives `Engine::tick` directly on a manual clock, so timing is
//! exact and no runtime is needed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Duration;
use fleetcoord::domain::metric;
use fleetcoord::{
    Agent, AgentId, AgentStatus, AgentType, CoordinationPattern, CoordinationTask, Engine, EngineConfig,
    ExecutionEvent, ManualClock, StaticMetrics, TaskId, TaskStatus,
};

fn engine() -> (Engine, ManualClock) {
    let clock = ManualClock::default();
    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(StaticMetrics::new()),
        Arc::new(clock.clone()),
    );
    (engine, clock)
}

fn worker(id: &str, caps: &[&str]) -> Agent {
    Agent::new(id, AgentType::Worker, caps.iter().copied()).with_capacity(100.0)
}

fn start(engine: &mut Engine, task: &str, agents: &[&str]) {
    for agent in agents {
        engine.report(ExecutionEvent::Started {
            task_id: TaskId::from(task),
            agent_id: AgentId::from(*agent),
        });
    }
}

fn active(engine: &Engine, task: &str) -> CoordinationTask {
    engine
        .snapshot_active_tasks()
        .into_iter()
        .find(|t| t.id.as_str() == task)
        .expect("task should be active")
}

// =============================================================================
// Assignment
// =============================================================================

#[test]
fn test_hierarchical_takes_supervisor_and_best_workers() {
    let (mut engine, _clock) = engine();
    let ranks = [("w1", 0.5), ("w2", 0.9), ("w3", 0.7), ("w4", 0.6)];
    for (id, rate) in ranks {
        engine
            .register_agent(worker(id, &["nav", "manip"]).with_metric(metric::TASK_SUCCESS_RATE, rate))
            .unwrap();
    }
    engine
        .register_agent(
            Agent::new("boss", AgentType::Supervisor, ["nav", "manip"])
                .with_metric(metric::COORDINATION_SCORE, 0.8),
        )
        .unwrap();

    let task = CoordinationTask::new("survey", "inspect")
        .with_required_agents(3)
        .with_capabilities(["nav", "manip"])
        .with_pattern(CoordinationPattern::Hierarchical);
    engine.submit_task(task).unwrap();

    let report = engine.tick();
    assert_eq!(report.tasks_assigned, 1);

    let task = active(&engine, "survey");
    assert_eq!(task.status, TaskStatus::Assigned);
    let assigned: BTreeSet<&str> = task.assigned_agent_ids.iter().map(|id| id.as_str()).collect();
    assert_eq!(assigned, BTreeSet::from(["boss", "w2", "w3"]));
    assert_eq!(report.dispatches.len(), 3);
    assert_eq!(task.topology.unwrap().pattern, CoordinationPattern::Hierarchical);
}

#[test]
fn test_too_few_suitable_agents_leaves_task_pending() {
    let (mut engine, _clock) = engine();
    engine.register_agent(worker("a", &["nav"])).unwrap();
    engine.register_agent(worker("b", &["nav"])).unwrap();
    engine
        .submit_task(CoordinationTask::new("big", "haul").with_required_agents(3).with_capabilities(["nav"]))
        .unwrap();

    let report = engine.tick();
    assert_eq!(report.tasks_assigned, 0);
    assert_eq!(report.assignment_failures, 1);

    let queued = engine.snapshot_queue();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status, TaskStatus::Pending);
    assert!(queued[0].assigned_agent_ids.is_empty());
    assert!(
        queued[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("insufficient_suitable_agents")
    );
    assert!(engine.snapshot_agents().iter().all(|a| a.current_task_ids.is_empty()));
}

#[test]
fn test_assigned_tasks_respect_size_and_capabilities() {
    let (mut engine, _clock) = engine();
    for (id, caps) in [("a", &["nav", "lift"][..]), ("b", &["nav"][..]), ("c", &["nav", "lift", "weld"][..])] {
        engine.register_agent(worker(id, caps)).unwrap();
    }
    engine
        .submit_task(CoordinationTask::new("t1", "haul").with_required_agents(2).with_capabilities(["lift"]))
        .unwrap();
    engine
        .submit_task(CoordinationTask::new("t2", "scan").with_capabilities(["nav"]))
        .unwrap();
    engine.tick();

    let agents: HashMap<AgentId, Agent> = engine
        .snapshot_agents()
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();
    for task in engine.snapshot_active_tasks() {
        assert!(task.assigned_agent_ids.len() <= task.required_agents);
        let union: BTreeSet<String> = task
            .assigned_agent_ids
            .iter()
            .flat_map(|id| agents[id].capabilities.iter().cloned())
            .collect();
        assert!(task.required_capabilities.is_subset(&union));
    }
}

// =============================================================================
// Execution monitoring
// =============================================================================

#[test]
fn test_offline_agent_is_replaced_by_idle_superset() {
    let (mut engine, clock) = engine();
    engine.register_agent(worker("w1", &["nav"])).unwrap();
    engine
        .submit_task(CoordinationTask::new("t1", "haul").with_capabilities(["nav"]).with_duration(30.0))
        .unwrap();
    engine.tick();
    start(&mut engine, "t1", &["w1"]);
    let report = engine.tick();
    assert_eq!(report.tasks_started, 1);
    assert_eq!(active(&engine, "t1").status, TaskStatus::Executing);

    engine.register_agent(worker("spare", &["nav", "lift"])).unwrap();
    clock.advance(Duration::minutes(6));
    engine.heartbeat(&AgentId::from("spare")).unwrap();

    let report = engine.tick();
    assert_eq!(report.replacements, 1);
    assert!(report.dispatches.iter().any(|d| d.agent_id.as_str() == "spare"));

    let task = active(&engine, "t1");
    assert_eq!(task.status, TaskStatus::Executing);
    assert_eq!(task.assigned_agent_ids, vec![AgentId::from("spare")]);
    let spare = engine.agent(&AgentId::from("spare")).unwrap();
    assert!(spare.current_task_ids.contains(&TaskId::from("t1")));
    assert!((spare.current_load - 0.3).abs() < 1e-9);
    assert!(engine.agent(&AgentId::from("w1")).unwrap().current_task_ids.is_empty());
}

#[test]
fn test_offline_agent_without_replacement_delays_task() {
    let (mut engine, clock) = engine();
    engine.register_agent(worker("w1", &["nav"])).unwrap();
    engine.register_agent(worker("w2", &["nav"])).unwrap();
    engine
        .submit_task(
            CoordinationTask::new("t1", "haul")
                .with_required_agents(2)
                .with_capabilities(["nav"])
                .with_duration(20.0),
        )
        .unwrap();
    engine.tick();
    start(&mut engine, "t1", &["w1", "w2"]);
    engine.tick();

    clock.advance(Duration::minutes(6));
    engine.heartbeat(&AgentId::from("w2")).unwrap();
    let report = engine.tick();
    assert_eq!(report.tasks_delayed, 1);

    assert_eq!(engine.task_status(&TaskId::from("t1")), Some(TaskStatus::Delayed));
    let queued = engine.snapshot_queue();
    assert_eq!(queued.len(), 1);
    assert!(queued[0].assigned_agent_ids.is_empty());

    // The healthy agent was released
    let w2 = engine.agent(&AgentId::from("w2")).unwrap();
    assert!(w2.current_task_ids.is_empty());
    assert!(w2.current_load.abs() < 1e-9);
}

#[test]
fn test_finished_reports_complete_task_and_release_load() {
    let (mut engine, _clock) = engine();
    engine.register_agent(worker("w1", &["nav"])).unwrap();
    engine
        .submit_task(CoordinationTask::new("t1", "haul").with_duration(50.0))
        .unwrap();
    engine.tick();
    assert!((engine.agent(&AgentId::from("w1")).unwrap().current_load - 0.5).abs() < 1e-9);

    start(&mut engine, "t1", &["w1"]);
    engine.report(ExecutionEvent::Finished {
        task_id: TaskId::from("t1"),
        agent_id: AgentId::from("w1"),
        success: true,
        metrics: HashMap::from([(metric::TASK_SUCCESS_RATE.to_string(), 0.95)]),
    });
    let report = engine.tick();
    assert_eq!(report.tasks_completed, 1);
    assert_eq!(engine.task_status(&TaskId::from("t1")), Some(TaskStatus::Completed));
    assert!(engine.snapshot_active_tasks().is_empty());

    let w1 = engine.agent(&AgentId::from("w1")).unwrap();
    assert!(w1.current_load.abs() < 1e-9);
    assert_eq!(w1.status, AgentStatus::Idle);
    assert_eq!(w1.metric(metric::TASK_SUCCESS_RATE), 0.95);
}

#[test]
fn test_release_after_saturation_leaves_held_load() {
    let (mut engine, _clock) = engine();
    engine.register_agent(worker("a", &["nav"])).unwrap();
    engine
        .submit_task(CoordinationTask::new("t1", "haul").with_duration(85.0))
        .unwrap();
    engine.tick();
    engine
        .submit_task(CoordinationTask::new("t2", "haul").with_duration(50.0))
        .unwrap();
    engine.tick();
    assert_eq!(engine.agent(&AgentId::from("a")).unwrap().current_load, 1.0);

    start(&mut engine, "t2", &["a"]);
    engine.report(ExecutionEvent::Finished {
        task_id: TaskId::from("t2"),
        agent_id: AgentId::from("a"),
        success: true,
        metrics: HashMap::new(),
    });
    let report = engine.tick();
    assert_eq!(report.tasks_completed, 1);

    let a = engine.agent(&AgentId::from("a")).unwrap();
    assert_eq!(a.current_task_ids, vec![TaskId::from("t1")]);
    assert!((a.current_load - 0.85).abs() < 1e-9);
    assert_eq!(a.status, AgentStatus::Busy);
}

// =============================================================================
// Load balancing
// =============================================================================

#[test]
fn test_overloaded_agent_sheds_a_task_to_underloaded_one() {
    let (mut engine, _clock) = engine();
    engine.register_agent(worker("busy", &["nav"])).unwrap();
    engine
        .submit_task(CoordinationTask::new("t1", "haul").with_capabilities(["nav"]).with_duration(45.0))
        .unwrap();
    engine
        .submit_task(CoordinationTask::new("t2", "haul").with_capabilities(["nav"]).with_duration(40.0))
        .unwrap();
    let report = engine.tick();
    assert_eq!(report.tasks_assigned, 2);
    assert_eq!(report.tasks_rebalanced, 0);

    let busy = engine.agent(&AgentId::from("busy")).unwrap();
    assert!((busy.current_load - 0.85).abs() < 1e-9);
    assert_eq!(busy.status, AgentStatus::Busy);

    engine.register_agent(worker("light", &["nav"]).with_load(0.2)).unwrap();
    let report = engine.tick();
    assert_eq!(report.tasks_rebalanced, 1);

    let busy = engine.agent(&AgentId::from("busy")).unwrap();
    let light = engine.agent(&AgentId::from("light")).unwrap();
    assert!((busy.current_load - 0.40).abs() < 1e-9);
    assert!((light.current_load - 0.65).abs() < 1e-9);
    assert_eq!(busy.current_task_ids.len(), 1);
    assert_eq!(light.current_task_ids.len(), 1);

    let moved = &light.current_task_ids[0];
    assert_eq!(active(&engine, moved.as_str()).assigned_agent_ids, vec![AgentId::from("light")]);
}

#[test]
fn test_single_large_task_moves_to_underloaded_agent() {
    let (mut engine, _clock) = engine();
    engine.register_agent(worker("busy", &["nav"])).unwrap();
    engine
        .submit_task(CoordinationTask::new("t1", "haul").with_capabilities(["nav"]).with_duration(85.0))
        .unwrap();
    engine.tick();
    engine.register_agent(worker("light", &["nav"]).with_load(0.2)).unwrap();

    let report = engine.tick();
    assert_eq!(report.tasks_rebalanced, 1);
    assert_eq!(active(&engine, "t1").assigned_agent_ids, vec![AgentId::from("light")]);
    let busy = engine.agent(&AgentId::from("busy")).unwrap();
    assert_eq!(busy.current_load, 0.0);
    assert!(busy.current_task_ids.is_empty());
    assert_eq!(engine.agent(&AgentId::from("light")).unwrap().current_load, 1.0);

    // The task stays put on later passes
    for _ in 0..3 {
        assert_eq!(engine.tick().tasks_rebalanced, 0);
    }
    assert_eq!(active(&engine, "t1").assigned_agent_ids, vec![AgentId::from("light")]);
}

// =============================================================================
// Deadlines and idempotence
// =============================================================================

#[test]
fn test_expired_task_never_reaches_assigned() {
    let (mut engine, clock) = engine();
    engine.register_agent(worker("w1", &["nav"])).unwrap();
    let deadline = engine.now() + Duration::seconds(1);
    engine
        .submit_task(CoordinationTask::new("late", "haul").with_deadline(deadline))
        .unwrap();

    clock.advance(Duration::seconds(2));
    let report = engine.tick();
    assert_eq!(report.tasks_expired, 1);
    assert_eq!(report.tasks_assigned, 0);
    assert!(report.dispatches.is_empty());
    assert!(engine.snapshot_queue().is_empty());
    assert_eq!(engine.task_status(&TaskId::from("late")), Some(TaskStatus::Failed));
    assert!(engine.agent(&AgentId::from("w1")).unwrap().current_task_ids.is_empty());
}

#[test]
fn test_quiet_tick_changes_nothing() {
    let (mut engine, _clock) = engine();
    engine
        .register_agent(worker("a", &["nav"]).with_preferred_coordination(CoordinationPattern::Consensus))
        .unwrap();
    engine
        .register_agent(worker("b", &["nav"]).with_preferred_coordination(CoordinationPattern::Auction))
        .unwrap();
    engine
        .submit_task(CoordinationTask::new("pair", "scan").with_required_agents(2))
        .unwrap();
    // Nobody can do this one; it stays queued
    engine
        .submit_task(CoordinationTask::new("weld", "weld").with_capabilities(["weld"]))
        .unwrap();

    engine.tick();
    engine.tick();
    let report = engine.tick();
    assert_eq!(report.tasks_processed, 0);
    assert_eq!(report.conflicts_resolved, 0);
    assert_eq!(report.tasks_rebalanced, 0);
    assert!(report.dispatches.is_empty());
}

// =============================================================================
// Registry properties
// =============================================================================

#[test]
fn test_registered_agent_appears_in_snapshot() {
    let (mut engine, _clock) = engine();
    let agent = worker("scout", &["nav", "camera"])
        .with_location("bay-3")
        .with_metric(metric::OVERALL_PERFORMANCE, 0.7);
    engine.register_agent(agent.clone()).unwrap();

    let snapshot = engine.snapshot_agents();
    let stored = snapshot.iter().find(|a| a.id == agent.id).unwrap();
    assert_eq!(stored.agent_type, agent.agent_type);
    assert_eq!(stored.capabilities, agent.capabilities);
    assert_eq!(stored.location, agent.location);
    assert_eq!(stored.max_capacity, agent.max_capacity);
    assert_eq!(stored.current_load, agent.current_load);
    assert_eq!(stored.performance_metrics, agent.performance_metrics);
    assert_eq!(stored.status, AgentStatus::Idle);
}

#[test]
fn test_heartbeat_keeps_agent_online() {
    let (mut engine, clock) = engine();
    let id = AgentId::from("w1");
    engine.register_agent(worker("w1", &["nav"])).unwrap();

    clock.advance(Duration::minutes(4));
    engine.heartbeat(&id).unwrap();
    clock.advance(Duration::minutes(4));
    engine.tick();
    assert_ne!(engine.agent(&id).unwrap().status, AgentStatus::Offline);

    clock.advance(Duration::minutes(2));
    engine.tick();
    let agent = engine.agent(&id).unwrap();
    assert_eq!(agent.status, AgentStatus::Offline);
    assert!(engine.now() - agent.last_heartbeat > Duration::minutes(5));

    engine.heartbeat(&id).unwrap();
    engine.tick();
    assert_eq!(engine.agent(&id).unwrap().status, AgentStatus::Idle);
}
