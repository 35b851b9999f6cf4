//! The orchestrator control loop and its handle.
//!
//! One tokio task owns the registry, the task queue, the scaler and the
//! health monitor. Callers talk to it through [`SwarmHandle`] (commands with
//! oneshot replies) and agents talk to it through the shared event channel,
//! so every mutation of the agent set or the queue happens on that one task.
//! The health timer ticks inside the same loop and can never race a manual
//! scaling request.

use crate::agent::AgentEvent;
use crate::api::{SendMessageRequest, SubmitTaskRequest};
use crate::backend::BackendRegistry;
use crate::dispatcher::TaskDispatcher;
use crate::health::{HealthMonitor, HealthReport, HealthTier};
use crate::metrics::SwarmMetrics;
use crate::registry::{AgentRegistry, SpawnOutcome};
use crate::router::MessageRouter;
use crate::scaler::AutoScaler;
use crate::types::{
    AgentId, AgentSnapshot, AgentSpawnConfig, AgentState, DistributeOutcome, Liveness,
    MessageEnvelope, MessageId, RouteOutcome, ScaleReport, Task, TaskId, TaskStatus,
};
use chrono::{DateTime, Utc};
use hive_core::{HiveError, HiveResult, SwarmConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Finished tasks kept around for status lookups.
const TASK_HISTORY_LIMIT: usize = 10_000;

/// How long shutdown waits for agents to finish in-flight work.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Aggregate view returned by the swarm status operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmStatus {
    pub health: HealthTier,
    pub health_percentage: f64,
    pub total_agents: usize,
    pub healthy_agents: usize,
    pub agents_by_state: BTreeMap<AgentState, usize>,
    pub retiring_agents: usize,
    pub queued_tasks: usize,
    pub in_flight_tasks: usize,
    pub min_agents: usize,
    pub max_agents: usize,
    pub metrics: SwarmMetrics,
    pub started_at: DateTime<Utc>,
    pub uptime_ms: i64,
}

enum Command {
    Route {
        envelope: MessageEnvelope,
        reply: oneshot::Sender<RouteOutcome>,
    },
    GetAgent {
        id: AgentId,
        reply: oneshot::Sender<Option<AgentSnapshot>>,
    },
    ListAgents {
        reply: oneshot::Sender<Vec<AgentSnapshot>>,
    },
    Distribute {
        task: Task,
        reply: oneshot::Sender<DistributeOutcome>,
    },
    GetTask {
        id: TaskId,
        reply: oneshot::Sender<Option<Task>>,
    },
    Status {
        reply: oneshot::Sender<SwarmStatus>,
    },
    ForceScale {
        reply: oneshot::Sender<ScaleReport>,
    },
    Liveness {
        reply: oneshot::Sender<Liveness>,
    },
    Spawn {
        config: AgentSpawnConfig,
        reply: oneshot::Sender<Option<AgentSnapshot>>,
    },
    Terminate {
        id: AgentId,
        reply: oneshot::Sender<bool>,
    },
    ReportFault {
        id: AgentId,
        reason: String,
        reply: oneshot::Sender<bool>,
    },
    HealthCheck {
        reply: oneshot::Sender<HealthReport>,
    },
    Metrics {
        reply: oneshot::Sender<SwarmMetrics>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Entry point: validates configuration and starts the control loop.
pub struct Orchestrator;

impl Orchestrator {
    /// Start a swarm and bring it up to `min_agents`.
    ///
    /// Configuration problems are the only fatal errors; they are reported
    /// here and never at runtime.
    pub async fn start(config: SwarmConfig, backends: BackendRegistry) -> HiveResult<SwarmHandle> {
        config.validate()?;
        if backends.get(&config.default_agent_kind).is_none() {
            return Err(HiveError::Config(format!(
                "no backend registered for default agent kind '{}'",
                config.default_agent_kind
            )));
        }

        let (command_tx, command_rx) = mpsc::channel(config.command_channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);

        let mut core = SwarmCore::new(config, backends, event_tx);
        core.bootstrap().await;
        tokio::spawn(core.run(command_rx, event_rx));

        Ok(SwarmHandle {
            commands: command_tx,
        })
    }
}

/// Cloneable handle exposing every swarm operation.
#[derive(Clone)]
pub struct SwarmHandle {
    commands: mpsc::Sender<Command>,
}

impl SwarmHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> HiveResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| HiveError::Orchestrator("swarm is shut down".into()))?;
        rx.await
            .map_err(|_| HiveError::Orchestrator("swarm dropped the request".into()))
    }

    /// Validate a message request and route it. The sender is never told
    /// whether the target existed; the id is returned either way.
    pub async fn send_message(&self, request: SendMessageRequest) -> HiveResult<MessageId> {
        let envelope = request.into_envelope()?;
        let id = envelope.id();
        self.route(envelope).await?;
        Ok(id)
    }

    /// Route an already-built envelope.
    pub async fn route(&self, envelope: MessageEnvelope) -> HiveResult<RouteOutcome> {
        self.request(|reply| Command::Route { envelope, reply }).await
    }

    pub async fn get_agent(&self, id: AgentId) -> HiveResult<AgentSnapshot> {
        self.request(|reply| Command::GetAgent { id, reply })
            .await?
            .ok_or_else(|| HiveError::NotFound(format!("agent {id}")))
    }

    pub async fn list_agents(&self) -> HiveResult<Vec<AgentSnapshot>> {
        self.request(|reply| Command::ListAgents { reply }).await
    }

    /// Validate a task request and distribute it.
    pub async fn submit_task(&self, request: SubmitTaskRequest) -> HiveResult<DistributeOutcome> {
        let task = request.into_task()?;
        self.distribute(task).await
    }

    /// Dispatch a task to the least-busy ready agent, or queue it.
    pub async fn distribute(&self, task: Task) -> HiveResult<DistributeOutcome> {
        self.request(|reply| Command::Distribute { task, reply }).await
    }

    pub async fn get_task(&self, id: TaskId) -> HiveResult<Task> {
        self.request(|reply| Command::GetTask { id, reply })
            .await?
            .ok_or_else(|| HiveError::NotFound(format!("task {id}")))
    }

    pub async fn status(&self) -> HiveResult<SwarmStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Run one reconciliation pass now.
    pub async fn force_scale(&self) -> HiveResult<ScaleReport> {
        self.request(|reply| Command::ForceScale { reply }).await
    }

    /// Liveness; an unreachable control loop reports `alive: false`.
    pub async fn liveness(&self) -> Liveness {
        self.request(|reply| Command::Liveness { reply })
            .await
            .unwrap_or(Liveness {
                alive: false,
                agent_count: 0,
            })
    }

    /// Spawn one agent; `None` when at capacity or initialization failed.
    pub async fn spawn_agent(&self, config: AgentSpawnConfig) -> HiveResult<Option<AgentSnapshot>> {
        self.request(|reply| Command::Spawn { config, reply }).await
    }

    /// Gracefully terminate one agent; false for unknown ids.
    pub async fn terminate_agent(&self, id: AgentId) -> HiveResult<bool> {
        self.request(|reply| Command::Terminate { id, reply }).await
    }

    /// Mark an agent as faulted so the next health cycle replaces it.
    pub async fn report_fault(&self, id: AgentId, reason: impl Into<String>) -> HiveResult<bool> {
        let reason = reason.into();
        self.request(|reply| Command::ReportFault { id, reason, reply })
            .await
    }

    /// Run one health cycle now, serialized with the timer.
    pub async fn run_health_check(&self) -> HiveResult<HealthReport> {
        self.request(|reply| Command::HealthCheck { reply }).await
    }

    pub async fn metrics(&self) -> HiveResult<SwarmMetrics> {
        self.request(|reply| Command::Metrics { reply }).await
    }

    /// Terminate every agent, wait for in-flight work, stop the loop.
    pub async fn shutdown(&self) -> HiveResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

struct SwarmCore {
    config: SwarmConfig,
    registry: AgentRegistry,
    dispatcher: TaskDispatcher,
    scaler: AutoScaler,
    monitor: HealthMonitor,
    router: MessageRouter,
    tasks: HashMap<TaskId, Task>,
    finished: VecDeque<TaskId>,
    metrics: SwarmMetrics,
    started_at: DateTime<Utc>,
}

impl SwarmCore {
    fn new(config: SwarmConfig, backends: BackendRegistry, events: mpsc::Sender<AgentEvent>) -> Self {
        Self {
            registry: AgentRegistry::new(&config, backends, events),
            dispatcher: TaskDispatcher::new(),
            scaler: AutoScaler::new(&config),
            monitor: HealthMonitor::new(),
            router: MessageRouter::new(),
            tasks: HashMap::new(),
            finished: VecDeque::new(),
            metrics: SwarmMetrics::default(),
            started_at: Utc::now(),
            config,
        }
    }

    async fn bootstrap(&mut self) {
        info!(
            min_agents = self.config.min_agents,
            max_agents = self.config.max_agents,
            "Swarm starting"
        );
        for _ in 0..self.config.min_agents {
            self.spawn_agent(&AgentSpawnConfig::default()).await;
        }
        if self.registry.len() < self.config.min_agents {
            warn!(
                agents = self.registry.len(),
                min_agents = self.config.min_agents,
                "Swarm started below min_agents; health cycle will retry"
            );
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<AgentEvent>,
    ) {
        let period = self.config.health_check_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.handle_event(event),
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown(&mut events).await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.shutdown(&mut events).await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.health_cycle().await;
                }
            }
        }
        info!("Swarm stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Route { envelope, reply } => {
                let _ = reply.send(self.route(envelope));
            }
            Command::GetAgent { id, reply } => {
                let _ = reply.send(self.registry.get(id).map(|a| a.snapshot()));
            }
            Command::ListAgents { reply } => {
                let _ = reply.send(self.registry.snapshots());
            }
            Command::Distribute { task, reply } => {
                let outcome = self.distribute(task).await;
                let _ = reply.send(outcome);
            }
            Command::GetTask { id, reply } => {
                let _ = reply.send(self.tasks.get(&id).cloned());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::ForceScale { reply } => {
                let report = self.reconcile().await;
                let _ = reply.send(report);
            }
            Command::Liveness { reply } => {
                let _ = reply.send(Liveness {
                    alive: true,
                    agent_count: self.registry.len(),
                });
            }
            Command::Spawn { config, reply } => {
                let spawned = self.spawn_agent(&config).await;
                let _ = reply.send(spawned);
            }
            Command::Terminate { id, reply } => {
                let _ = reply.send(self.terminate_agent(id));
            }
            Command::ReportFault { id, reason, reply } => {
                let marked = self.registry.mark_error(id);
                if marked {
                    warn!(agent_id = %id, reason = %reason, "Agent fault reported");
                }
                let _ = reply.send(marked);
            }
            Command::HealthCheck { reply } => {
                let report = self.health_cycle().await;
                let _ = reply.send(report);
            }
            Command::Metrics { reply } => {
                let _ = reply.send(self.metrics.clone());
            }
            // Handled by the run loop before dispatching here.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // --- Registry ---

    /// Leaves the queue alone; callers spawning for load drain afterwards.
    async fn spawn_agent(&mut self, config: &AgentSpawnConfig) -> Option<AgentSnapshot> {
        match self.registry.spawn(config).await {
            SpawnOutcome::Spawned(snapshot) => {
                self.metrics.agents_spawned += 1;
                Some(snapshot)
            }
            SpawnOutcome::AtCapacity => None,
            SpawnOutcome::Failed(_) => {
                self.metrics.spawn_failures += 1;
                None
            }
        }
    }

    fn terminate_agent(&mut self, id: AgentId) -> bool {
        let terminated = self.registry.terminate(id);
        if terminated {
            self.metrics.agents_terminated += 1;
        }
        terminated
    }

    // --- Dispatch ---

    async fn distribute(&mut self, mut task: Task) -> DistributeOutcome {
        self.metrics.tasks_submitted += 1;

        if self.dispatcher.len() > self.config.spawn_threshold_queue_size && !self.registry.is_full() {
            info!(
                queue_depth = self.dispatcher.len(),
                threshold = self.config.spawn_threshold_queue_size,
                "Queue above threshold; spawning agent"
            );
            // Older tasks take the new agent before this one is considered.
            if self.spawn_agent(&AgentSpawnConfig::default()).await.is_some() {
                self.drain();
            }
        }

        let outcome = self.dispatcher.distribute(&mut task, &mut self.registry);
        self.tasks.insert(task.id, task);
        outcome
    }

    fn drain(&mut self) {
        let dispatched = self.dispatcher.drain(&mut self.tasks, &mut self.registry);
        if !dispatched.is_empty() {
            debug!(
                dispatched = dispatched.len(),
                remaining = self.dispatcher.len(),
                "Drained task queue"
            );
        }
    }

    fn settle(&mut self, task_id: TaskId, status: TaskStatus, output: Option<serde_json::Value>) {
        let Some(task) = self.tasks.get_mut(&task_id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }
        task.status = status;
        task.completed_at = Some(Utc::now());
        task.result = output;

        self.finished.push_back(task_id);
        while self.finished.len() > TASK_HISTORY_LIMIT {
            if let Some(old) = self.finished.pop_front() {
                self.tasks.remove(&old);
            }
        }
    }

    // --- Events ---

    fn handle_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::TaskStarted {
                agent_id,
                task_id,
                at,
            } => {
                self.registry.task_started(agent_id, at);
                if let Some(task) = self.tasks.get_mut(&task_id) {
                    if !task.status.is_terminal() {
                        task.status = TaskStatus::Executing;
                        task.started_at = Some(at);
                    }
                }
            }
            AgentEvent::TaskCompleted {
                agent_id,
                task_id,
                output,
                duration,
            } => {
                self.registry.task_finished(agent_id, task_id, true);
                self.metrics.record_completion(duration);
                self.settle(task_id, TaskStatus::Completed, Some(output));
                debug!(agent_id = %agent_id, task_id = %task_id, duration_ms = duration.as_millis() as u64, "Task completed");
                self.drain();
            }
            AgentEvent::TaskFailed {
                agent_id,
                task_id,
                reason,
                duration,
            } => {
                self.registry.task_finished(agent_id, task_id, false);
                self.metrics.record_failure(duration);
                warn!(agent_id = %agent_id, task_id = %task_id, reason = %reason, "Task failed");
                self.settle(task_id, TaskStatus::Failed { reason }, None);
                self.drain();
            }
            AgentEvent::MessageDelivered {
                agent_id,
                message_id,
            } => {
                self.registry.touch(agent_id);
                debug!(agent_id = %agent_id, message_id = %message_id, "Message delivered");
            }
            AgentEvent::MessageFailed {
                agent_id,
                message_id,
                reason,
            } => {
                warn!(agent_id = %agent_id, message_id = %message_id, reason = %reason, "Message handler failed");
            }
            AgentEvent::Faulted { agent_id, reason } => {
                if self.registry.mark_error(agent_id) {
                    warn!(agent_id = %agent_id, reason = %reason, "Agent faulted");
                }
            }
            AgentEvent::Stopped { agent_id } => {
                if self.registry.stopped(agent_id) {
                    warn!(agent_id = %agent_id, "Agent worker exited unexpectedly; marked error");
                }
            }
        }
    }

    // --- Routing ---

    fn route(&mut self, envelope: MessageEnvelope) -> RouteOutcome {
        let outcome = self.router.route(envelope, &self.registry);
        match outcome {
            RouteOutcome::Scheduled => self.metrics.messages_routed += 1,
            RouteOutcome::Dropped => self.metrics.messages_dropped += 1,
        }
        outcome
    }

    // --- Scaling & health ---

    async fn reconcile(&mut self) -> ScaleReport {
        let plan = self
            .scaler
            .plan(self.dispatcher.len(), &self.registry.snapshots(), Utc::now());
        if !plan.is_noop() {
            info!(
                queue_depth = self.dispatcher.len(),
                current = self.registry.len(),
                desired = plan.desired,
                spawn = plan.spawn,
                terminate = plan.terminate.len(),
                "Scaling swarm"
            );
        }

        let mut spawned = 0;
        for _ in 0..plan.spawn {
            if self.spawn_agent(&AgentSpawnConfig::default()).await.is_some() {
                spawned += 1;
            }
        }
        // Covers agents spawned here and by health replacement.
        self.drain();
        let mut terminated = 0;
        for id in plan.terminate {
            if self.terminate_agent(id) {
                terminated += 1;
            }
        }

        ScaleReport {
            current: self.registry.len(),
            min: self.scaler.min_agents(),
            max: self.scaler.max_agents(),
            desired: plan.desired,
            spawned,
            terminated,
        }
    }

    async fn health_cycle(&mut self) -> HealthReport {
        let sampled = HealthMonitor::assess(&self.registry.snapshots());
        if sampled.tier == HealthTier::Unhealthy {
            warn!(
                healthy = sampled.healthy_agents,
                total = sampled.total_agents,
                "Swarm unhealthy"
            );
        }

        let mut replaced = Vec::new();
        for id in sampled.unhealthy {
            let Some(agent) = self.registry.get(id) else {
                continue;
            };
            let replacement = AgentSpawnConfig {
                kind: Some(agent.kind().to_string()),
                rank: Some(agent.rank()),
            };
            if !self.terminate_agent(id) {
                continue;
            }
            match self.spawn_agent(&replacement).await {
                Some(new) => {
                    self.metrics.agents_replaced += 1;
                    info!(old_agent = %id, new_agent = %new.id, "Replaced unhealthy agent");
                }
                None => warn!(old_agent = %id, "Replacement spawn failed"),
            }
            replaced.push(id);
        }

        self.reconcile().await;
        if self.registry.len() < self.config.min_agents {
            warn!(
                agents = self.registry.len(),
                min_agents = self.config.min_agents,
                spawn_failures = self.metrics.spawn_failures,
                "Swarm below min_agents after health cycle; retrying next cycle"
            );
        }

        let mut report = HealthMonitor::assess(&self.registry.snapshots());
        report.replaced = replaced;
        if let Some(previous) = self.monitor.observe(report.tier) {
            match report.tier {
                HealthTier::Healthy => info!(tier = %report.tier, previous = ?previous, "Swarm health changed"),
                _ => warn!(tier = %report.tier, previous = ?previous, "Swarm health changed"),
            }
        }
        report
    }

    fn status(&self) -> SwarmStatus {
        let snapshots = self.registry.snapshots();
        let health = HealthMonitor::assess(&snapshots);
        let mut agents_by_state = BTreeMap::new();
        for agent in &snapshots {
            *agents_by_state.entry(agent.state).or_insert(0) += 1;
        }
        let now = Utc::now();
        SwarmStatus {
            health: health.tier,
            health_percentage: health.health_percentage,
            total_agents: health.total_agents,
            healthy_agents: health.healthy_agents,
            agents_by_state,
            retiring_agents: self.registry.retiring_count(),
            queued_tasks: self.dispatcher.len(),
            in_flight_tasks: self.registry.in_flight_count(),
            min_agents: self.config.min_agents,
            max_agents: self.config.max_agents,
            metrics: self.metrics.clone(),
            started_at: self.started_at,
            uptime_ms: now.signed_duration_since(self.started_at).num_milliseconds(),
        }
    }

    async fn shutdown(&mut self, events: &mut mpsc::Receiver<AgentEvent>) {
        info!(
            agents = self.registry.len(),
            queued = self.dispatcher.len(),
            "Swarm shutting down"
        );
        for id in self.registry.ids() {
            self.terminate_agent(id);
        }
        for task_id in self.dispatcher.clear() {
            self.metrics.tasks_failed += 1;
            self.settle(
                task_id,
                TaskStatus::Failed {
                    reason: "swarm shut down before dispatch".to_string(),
                },
                None,
            );
        }

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while self.registry.retiring_count() > 0 {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(event)) => self.handle_event(event),
                _ => {
                    warn!(
                        retiring = self.registry.retiring_count(),
                        "Shutdown grace period expired; aborting agents"
                    );
                    break;
                }
            }
        }
        self.registry.abort_all();
    }
}
