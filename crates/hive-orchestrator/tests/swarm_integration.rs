//! End-to-end swarm tests.
//!
//! Drives a real orchestrator control loop with in-process mock backends and
//! checks pool bounds, dispatch order, back-pressure spawning, health-driven
//! replacement, message routing and shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use hive_core::{HiveError, HiveResult, SwarmConfig};
use hive_orchestrator::*;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// Mock backends
// ---------------------------------------------------------------------------

/// Finishes every task after a short sleep and records what it saw.
#[derive(Default)]
struct Recorder {
    latency_ms: u64,
    tasks: Mutex<Vec<serde_json::Value>>,
    messages: Mutex<Vec<(AgentId, serde_json::Value)>>,
}

#[async_trait]
impl AgentBackend for Recorder {
    async fn execute(&self, _agent_id: AgentId, task: &Task) -> HiveResult<serde_json::Value> {
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        self.tasks.lock().push(task.content.clone());
        Ok(serde_json::json!({ "echo": task.content }))
    }

    async fn handle_message(&self, agent_id: AgentId, envelope: &MessageEnvelope) -> HiveResult<()> {
        self.messages.lock().push((agent_id, envelope.content().clone()));
        Ok(())
    }
}

/// Blocks every task until the test releases permits.
struct Gate {
    permits: Semaphore,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            permits: Semaphore::new(0),
        })
    }

    fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }
}

#[async_trait]
impl AgentBackend for Gate {
    async fn execute(&self, _agent_id: AgentId, _task: &Task) -> HiveResult<serde_json::Value> {
        let permit = self.permits.acquire().await.expect("gate closed");
        permit.forget();
        Ok(serde_json::Value::Null)
    }
}

/// Fails tasks by type: "fault" breaks the agent, anything else is a plain failure.
struct Failing;

#[async_trait]
impl AgentBackend for Failing {
    async fn execute(&self, _agent_id: AgentId, task: &Task) -> HiveResult<serde_json::Value> {
        if task.task_type == "fault" {
            Err(HiveError::Fault("lost connection to model".into()))
        } else {
            Err(HiveError::Agent("bad input".into()))
        }
    }
}

/// Task "fault" waits for a permit and then breaks its agent; others echo.
struct FaultAfterGate {
    permits: Semaphore,
}

#[async_trait]
impl AgentBackend for FaultAfterGate {
    async fn execute(&self, _agent_id: AgentId, task: &Task) -> HiveResult<serde_json::Value> {
        if task.task_type == "fault" {
            let permit = self.permits.acquire().await.expect("gate closed");
            permit.forget();
            return Err(HiveError::Fault("device reset".into()));
        }
        Ok(task.content.clone())
    }
}

/// Initializes until `refuse_init` is set.
#[derive(Default)]
struct Flaky {
    refuse_init: AtomicBool,
}

#[async_trait]
impl AgentBackend for Flaky {
    async fn initialize(&self, _agent_id: AgentId) -> HiveResult<()> {
        if self.refuse_init.load(Ordering::SeqCst) {
            return Err(HiveError::Agent("quota exhausted".into()));
        }
        Ok(())
    }

    async fn execute(&self, _agent_id: AgentId, _task: &Task) -> HiveResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hive_orchestrator=debug")
        .with_test_writer()
        .try_init();
}

fn backends(backend: Arc<dyn AgentBackend>) -> BackendRegistry {
    BackendRegistry::new().with(Arc::new(SharedBackend::new("default", backend)))
}

/// Health timer far in the future so tests control every cycle.
fn config(min: usize, max: usize) -> SwarmConfig {
    SwarmConfig::default()
        .with_bounds(min, max)
        .with_health_interval_ms(60_000)
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

fn message(to: &str, content: serde_json::Value) -> SendMessageRequest {
    SendMessageRequest {
        from_agent_id: Some("tester".into()),
        to_agent_id: Some(to.into()),
        content: Some(content),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_start_brings_up_min_agents() {
    let swarm = Orchestrator::start(config(3, 5), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();

    let agents = swarm.list_agents().await.unwrap();
    assert_eq!(agents.len(), 3);
    assert!(agents.iter().all(|a| a.state == AgentState::Ready));
    assert_eq!(agents[0].rank, 1);
    assert!(agents[1..].iter().all(|a| a.rank == 0));

    let status = swarm.status().await.unwrap();
    assert_eq!(status.queued_tasks, 0);
    assert_eq!(status.health, HealthTier::Healthy);
    assert_eq!(status.agents_by_state.get(&AgentState::Ready), Some(&3));

    let live = swarm.liveness().await;
    assert!(live.alive);
    assert_eq!(live.agent_count, 3);
}

#[tokio::test]
async fn test_start_rejects_invalid_bounds() {
    let result = Orchestrator::start(config(6, 5), backends(Arc::new(Recorder::default()))).await;
    assert!(matches!(result, Err(HiveError::Config(_))));
}

#[tokio::test]
async fn test_start_rejects_unregistered_default_kind() {
    let result = Orchestrator::start(config(1, 2), BackendRegistry::new()).await;
    let err = result.err().unwrap();
    assert!(err.to_string().contains("default"));
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_task_goes_to_lowest_id_among_idle_agents() {
    let gate = Gate::new();
    let swarm = Orchestrator::start(config(3, 5), backends(gate.clone())).await.unwrap();

    let outcome = swarm
        .submit_task(SubmitTaskRequest::new("work", serde_json::json!(1)))
        .await
        .unwrap();
    assert!(!outcome.queued);
    assert_eq!(outcome.queue_position, None);
    assert_eq!(outcome.assigned_to, Some(AgentId::new(1)));

    let agent = swarm.get_agent(AgentId::new(1)).await.unwrap();
    assert_eq!(agent.state, AgentState::Executing);
    assert_eq!(agent.active_tasks, vec![outcome.task_id]);
    gate.release(1);
}

#[tokio::test]
async fn test_task_completes_with_result() {
    let swarm = Orchestrator::start(config(1, 2), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();

    let outcome = swarm
        .submit_task(SubmitTaskRequest::new("echo", serde_json::json!("hi")))
        .await
        .unwrap();

    eventually(|| async {
        swarm.get_task(outcome.task_id).await.unwrap().status == TaskStatus::Completed
    })
    .await;

    let task = swarm.get_task(outcome.task_id).await.unwrap();
    assert_eq!(task.result, Some(serde_json::json!({ "echo": "hi" })));
    assert!(task.started_at.is_some());
    assert!(task.completed_at.is_some());

    let agent = swarm.get_agent(AgentId::new(1)).await.unwrap();
    assert_eq!(agent.state, AgentState::Ready);
    assert_eq!(agent.tasks_completed, 1);
    assert_eq!(swarm.metrics().await.unwrap().tasks_completed, 1);
}

#[tokio::test]
async fn test_submit_without_type_is_rejected() {
    let swarm = Orchestrator::start(config(1, 1), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();
    let err = swarm
        .submit_task(SubmitTaskRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(swarm.metrics().await.unwrap().tasks_submitted, 0);
}

#[tokio::test]
async fn test_queue_drains_in_submission_order() {
    let recorder = Arc::new(Recorder {
        latency_ms: 10,
        ..Default::default()
    });
    let swarm = Orchestrator::start(
        config(1, 1).with_spawn_threshold(100),
        backends(recorder.clone()),
    )
    .await
    .unwrap();

    for i in 0..6 {
        swarm
            .submit_task(SubmitTaskRequest::new("seq", serde_json::json!(i)))
            .await
            .unwrap();
    }

    eventually(|| async { swarm.metrics().await.unwrap().tasks_completed == 6 }).await;
    let seen: Vec<i64> = recorder
        .tasks
        .lock()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(swarm.status().await.unwrap().queued_tasks, 0);
}

#[tokio::test]
async fn test_back_pressure_spawns_agents_up_to_max() {
    init_tracing();
    let gate = Gate::new();
    let swarm = Orchestrator::start(
        config(3, 5).with_spawn_threshold(10),
        backends(gate.clone()),
    )
    .await
    .unwrap();

    let mut immediate = 0;
    for i in 0..20 {
        let outcome = swarm
            .submit_task(SubmitTaskRequest::new("burst", serde_json::json!(i)))
            .await
            .unwrap();
        if !outcome.queued {
            immediate += 1;
        }
    }
    assert_eq!(immediate, 3);

    let status = swarm.status().await.unwrap();
    assert_eq!(status.total_agents, 5);
    assert_eq!(status.metrics.agents_spawned, 5);
    // Each agent holds one task; everything else waits.
    assert_eq!(status.in_flight_tasks, 5);
    assert_eq!(status.queued_tasks, 15);

    gate.release(20);
    eventually(|| async { swarm.metrics().await.unwrap().tasks_completed == 20 }).await;
    assert_eq!(swarm.status().await.unwrap().queued_tasks, 0);
}

#[tokio::test]
async fn test_failed_task_leaves_agent_ready() {
    let swarm = Orchestrator::start(config(1, 1), backends(Arc::new(Failing))).await.unwrap();
    let outcome = swarm
        .submit_task(SubmitTaskRequest::new("parse", serde_json::json!({})))
        .await
        .unwrap();

    eventually(|| async {
        matches!(
            swarm.get_task(outcome.task_id).await.unwrap().status,
            TaskStatus::Failed { .. }
        )
    })
    .await;

    let agent = swarm.get_agent(AgentId::new(1)).await.unwrap();
    assert_eq!(agent.state, AgentState::Ready);
    assert_eq!(agent.tasks_failed, 1);
    assert_eq!(swarm.metrics().await.unwrap().tasks_failed, 1);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_check_replaces_error_agents() {
    init_tracing();
    let swarm = Orchestrator::start(config(5, 5), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();

    assert!(swarm.report_fault(AgentId::new(2), "stuck").await.unwrap());
    assert!(swarm.report_fault(AgentId::new(4), "stuck").await.unwrap());

    let before = swarm.status().await.unwrap();
    assert_eq!(before.healthy_agents, 3);
    assert_eq!(before.health, HealthTier::Degraded);

    let report = swarm.run_health_check().await.unwrap();
    assert_eq!(report.replaced, vec![AgentId::new(2), AgentId::new(4)]);
    assert_eq!(report.total_agents, 5);
    assert_eq!(report.healthy_agents, 5);
    assert_eq!(report.tier, HealthTier::Healthy);

    let ids: Vec<AgentId> = swarm
        .list_agents()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert!(!ids.contains(&AgentId::new(2)));
    assert!(!ids.contains(&AgentId::new(4)));
    assert!(ids.contains(&AgentId::new(6)));
    assert!(ids.contains(&AgentId::new(7)));

    let metrics = swarm.metrics().await.unwrap();
    assert_eq!(metrics.agents_replaced, 2);
    assert_eq!(metrics.agents_terminated, 2);
}

#[tokio::test]
async fn test_backend_fault_marks_agent_error() {
    init_tracing();
    let swarm = Orchestrator::start(config(1, 1), backends(Arc::new(Failing))).await.unwrap();
    swarm
        .submit_task(SubmitTaskRequest::new("fault", serde_json::json!(null)))
        .await
        .unwrap();

    eventually(|| async {
        swarm.get_agent(AgentId::new(1)).await.unwrap().state == AgentState::Error
    })
    .await;
    assert_eq!(swarm.status().await.unwrap().health, HealthTier::Unhealthy);

    let report = swarm.run_health_check().await.unwrap();
    assert_eq!(report.replaced, vec![AgentId::new(1)]);
    assert_eq!(swarm.list_agents().await.unwrap()[0].id, AgentId::new(2));
}

#[tokio::test]
async fn test_faulted_agent_gets_no_queued_work() {
    init_tracing();
    let backend = Arc::new(FaultAfterGate {
        permits: Semaphore::new(0),
    });
    let swarm = Orchestrator::start(
        config(1, 1).with_spawn_threshold(100),
        backends(backend.clone()),
    )
    .await
    .unwrap();

    let first = swarm
        .submit_task(SubmitTaskRequest::new("fault", serde_json::Value::Null))
        .await
        .unwrap();
    let second = swarm
        .submit_task(SubmitTaskRequest::new("ok", serde_json::json!("after")))
        .await
        .unwrap();
    assert_eq!(first.assigned_to, Some(AgentId::new(1)));
    assert!(second.queued);

    backend.permits.add_permits(1);
    eventually(|| async {
        matches!(
            swarm.get_task(first.task_id).await.unwrap().status,
            TaskStatus::Failed { .. }
        )
    })
    .await;

    assert_eq!(
        swarm.get_agent(AgentId::new(1)).await.unwrap().state,
        AgentState::Error
    );
    let waiting = swarm.get_task(second.task_id).await.unwrap();
    assert_eq!(waiting.status, TaskStatus::Queued);
    assert_eq!(waiting.assigned_to, None);
    assert_eq!(swarm.status().await.unwrap().queued_tasks, 1);

    // The replacement picks the queued task up.
    swarm.run_health_check().await.unwrap();
    eventually(|| async {
        swarm.get_task(second.task_id).await.unwrap().status == TaskStatus::Completed
    })
    .await;
    let done = swarm.get_task(second.task_id).await.unwrap();
    assert_eq!(done.assigned_to, Some(AgentId::new(2)));
}

#[tokio::test]
async fn test_repeated_health_checks_change_nothing() {
    let swarm = Orchestrator::start(config(3, 5), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();

    let first = swarm.run_health_check().await.unwrap();
    let second = swarm.run_health_check().await.unwrap();
    assert!(first.replaced.is_empty());
    assert!(second.replaced.is_empty());
    assert_eq!(first.total_agents, 3);
    assert_eq!(second.total_agents, first.total_agents);
    assert_eq!(second.tier, first.tier);

    swarm.report_fault(AgentId::new(3), "stuck").await.unwrap();
    let repaired = swarm.run_health_check().await.unwrap();
    assert_eq!(repaired.replaced, vec![AgentId::new(3)]);
    let again = swarm.run_health_check().await.unwrap();
    assert!(again.replaced.is_empty());
    assert_eq!(again.total_agents, repaired.total_agents);
    assert_eq!(again.tier, repaired.tier);
    assert_eq!(swarm.metrics().await.unwrap().agents_replaced, 1);
}

#[tokio::test]
async fn test_failed_replacement_is_counted_and_retried() {
    init_tracing();
    let backend = Arc::new(Flaky::default());
    let swarm = Orchestrator::start(config(2, 2), backends(backend.clone()))
        .await
        .unwrap();
    assert_eq!(swarm.list_agents().await.unwrap().len(), 2);

    backend.refuse_init.store(true, Ordering::SeqCst);
    swarm.report_fault(AgentId::new(1), "crashed").await.unwrap();
    let report = swarm.run_health_check().await.unwrap();
    assert_eq!(report.replaced, vec![AgentId::new(1)]);
    assert_eq!(report.total_agents, 1);

    let metrics = swarm.metrics().await.unwrap();
    assert!(metrics.spawn_failures >= 1);
    assert_eq!(metrics.agents_replaced, 0);

    // Once agents can start again the next cycle refills to min.
    backend.refuse_init.store(false, Ordering::SeqCst);
    let report = swarm.run_health_check().await.unwrap();
    assert_eq!(report.total_agents, 2);
    assert_eq!(report.tier, HealthTier::Healthy);
}

#[tokio::test]
async fn test_health_timer_replaces_without_prompting() {
    let swarm = Orchestrator::start(
        config(2, 3).with_health_interval_ms(30),
        backends(Arc::new(Recorder::default())),
    )
    .await
    .unwrap();

    swarm.report_fault(AgentId::new(1), "heartbeat lost").await.unwrap();
    eventually(|| async { swarm.metrics().await.unwrap().agents_replaced == 1 }).await;
    assert_eq!(swarm.list_agents().await.unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Scaling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_force_scale_is_idempotent_when_stable() {
    let swarm = Orchestrator::start(config(2, 5), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();

    for _ in 0..2 {
        let report = swarm.force_scale().await.unwrap();
        assert_eq!(report.current, 2);
        assert_eq!(report.desired, 2);
        assert_eq!(report.spawned, 0);
        assert_eq!(report.terminated, 0);
    }
}

#[tokio::test]
async fn test_idle_agents_scale_down_to_min() {
    let swarm = Orchestrator::start(
        config(1, 4).with_idle_timeout_ms(40),
        backends(Arc::new(Recorder::default())),
    )
    .await
    .unwrap();
    swarm.spawn_agent(AgentSpawnConfig::default()).await.unwrap().unwrap();
    swarm.spawn_agent(AgentSpawnConfig::default()).await.unwrap().unwrap();
    assert_eq!(swarm.list_agents().await.unwrap().len(), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = swarm.force_scale().await.unwrap();
    assert_eq!(report.terminated, 2);
    assert_eq!(report.current, 1);
    assert_eq!(report.min, 1);
}

#[tokio::test]
async fn test_spawn_then_terminate_restores_agent_set() {
    let swarm = Orchestrator::start(config(2, 3), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();
    let before: Vec<AgentId> = swarm.list_agents().await.unwrap().iter().map(|a| a.id).collect();

    let spawned = swarm
        .spawn_agent(AgentSpawnConfig::default())
        .await
        .unwrap()
        .expect("below max");
    assert!(swarm.spawn_agent(AgentSpawnConfig::default()).await.unwrap().is_none());
    assert!(swarm.terminate_agent(spawned.id).await.unwrap());

    let after: Vec<AgentId> = swarm.list_agents().await.unwrap().iter().map(|a| a.id).collect();
    assert_eq!(before, after);
    assert_eq!(swarm.status().await.unwrap().queued_tasks, 0);
}

#[tokio::test]
async fn test_spawn_then_terminate_keeps_queue_intact() {
    let gate = Gate::new();
    let swarm = Orchestrator::start(
        config(1, 3).with_spawn_threshold(100),
        backends(gate.clone()),
    )
    .await
    .unwrap();
    for i in 0..3 {
        swarm
            .submit_task(SubmitTaskRequest::new("held", serde_json::json!(i)))
            .await
            .unwrap();
    }
    let before = swarm.status().await.unwrap();
    assert_eq!(before.total_agents, 1);
    assert_eq!(before.queued_tasks, 2);

    let spawned = swarm
        .spawn_agent(AgentSpawnConfig::default())
        .await
        .unwrap()
        .expect("below max");
    assert!(swarm.terminate_agent(spawned.id).await.unwrap());

    let after = swarm.status().await.unwrap();
    assert_eq!(after.total_agents, before.total_agents);
    assert_eq!(after.queued_tasks, before.queued_tasks);
    assert_eq!(after.in_flight_tasks, before.in_flight_tasks);
    assert_eq!(after.retiring_agents, 0);

    gate.release(3);
    eventually(|| async { swarm.metrics().await.unwrap().tasks_completed == 3 }).await;
}

#[tokio::test]
async fn test_unknown_agent_lookups() {
    let swarm = Orchestrator::start(config(1, 2), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();
    assert!(!swarm.terminate_agent(AgentId::new(99)).await.unwrap());
    assert!(!swarm.report_fault(AgentId::new(99), "?").await.unwrap());
    let err = swarm.get_agent(AgentId::new(99)).await.unwrap_err();
    assert!(matches!(err, HiveError::NotFound(_)));
    assert_eq!(err.status_code(), 404);
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_message_to_unknown_agent_is_dropped() {
    init_tracing();
    let recorder = Arc::new(Recorder::default());
    let swarm = Orchestrator::start(config(1, 2), backends(recorder.clone())).await.unwrap();

    let id = swarm
        .send_message(message("agent-99", serde_json::json!("anyone?")))
        .await
        .unwrap();
    assert!(!id.is_nil());

    let metrics = swarm.metrics().await.unwrap();
    assert_eq!(metrics.messages_dropped, 1);
    assert_eq!(metrics.messages_routed, 0);
    assert!(recorder.messages.lock().is_empty());
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let recorder = Arc::new(Recorder::default());
    let swarm = Orchestrator::start(config(2, 2), backends(recorder.clone())).await.unwrap();

    for i in 0..10 {
        swarm
            .send_message(message("agent-2", serde_json::json!(i)))
            .await
            .unwrap();
    }

    eventually(|| async { recorder.messages.lock().len() == 10 }).await;
    let seen = recorder.messages.lock().clone();
    assert!(seen.iter().all(|(agent, _)| *agent == AgentId::new(2)));
    let order: Vec<i64> = seen.iter().map(|(_, v)| v.as_i64().unwrap()).collect();
    assert_eq!(order, (0..10).collect::<Vec<_>>());
    assert_eq!(swarm.metrics().await.unwrap().messages_routed, 10);
}

#[tokio::test]
async fn test_invalid_message_requests() {
    let swarm = Orchestrator::start(config(1, 1), backends(Arc::new(Recorder::default())))
        .await
        .unwrap();

    let mut missing_from = message("agent-1", serde_json::json!("x"));
    missing_from.from_agent_id = None;
    assert!(matches!(
        swarm.send_message(missing_from).await,
        Err(HiveError::Validation(_))
    ));

    let empty_content = message("agent-1", serde_json::json!(""));
    assert!(matches!(
        swarm.send_message(empty_content).await,
        Err(HiveError::Validation(_))
    ));

    let bad_target = message("robot-7", serde_json::json!("x"));
    assert_eq!(swarm.send_message(bad_target).await.unwrap_err().status_code(), 400);
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_then_stops() {
    let gate = Gate::new();
    let swarm = Orchestrator::start(config(1, 1), backends(gate.clone())).await.unwrap();
    for i in 0..3 {
        swarm
            .submit_task(SubmitTaskRequest::new("slow", serde_json::json!(i)))
            .await
            .unwrap();
    }

    let releaser = {
        let gate = gate.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            gate.release(1);
        })
    };
    swarm.shutdown().await.unwrap();
    releaser.await.unwrap();

    assert!(!swarm.liveness().await.alive);
    let err = swarm.list_agents().await.unwrap_err();
    assert!(matches!(err, HiveError::Orchestrator(_)));
    assert_eq!(err.status_code(), 503);
}
