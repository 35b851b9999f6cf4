use crate::agent::{self, Agent, AgentCommand, AgentEvent};
use crate::backend::BackendRegistry;
use crate::types::{
    AgentId, AgentSnapshot, AgentSpawnConfig, AgentState, MessageEnvelope, Task, TaskId,
    TaskStatus, SUPERVISOR_RANK, WORKER_RANK,
};
use chrono::{DateTime, Utc};
use hive_core::SwarmConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of a spawn attempt.
#[derive(Debug, Clone)]
pub enum SpawnOutcome {
    Spawned(AgentSnapshot),
    /// The registry already holds `max_agents`.
    AtCapacity,
    /// The agent could not be brought up and was discarded.
    Failed(String),
}

/// The registry's record of one live agent.
pub struct AgentHandle {
    id: AgentId,
    kind: String,
    rank: u32,
    state: AgentState,
    active: BTreeSet<TaskId>,
    last_heartbeat: DateTime<Utc>,
    spawned_at: DateTime<Utc>,
    tasks_completed: u64,
    tasks_failed: u64,
    commands: mpsc::UnboundedSender<AgentCommand>,
    join: JoinHandle<()>,
}

impl AgentHandle {
    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn active_task_count(&self) -> usize {
        self.active.len()
    }

    pub fn holds(&self, task_id: TaskId) -> bool {
        self.active.contains(&task_id)
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            kind: self.kind.clone(),
            state: self.state,
            rank: self.rank,
            active_task_count: self.active.len(),
            active_tasks: self.active.iter().copied().collect(),
            last_heartbeat: self.last_heartbeat,
            spawned_at: self.spawned_at,
            tasks_completed: self.tasks_completed,
            tasks_failed: self.tasks_failed,
        }
    }

    fn heartbeat(&mut self, at: DateTime<Utc>) {
        if at > self.last_heartbeat {
            self.last_heartbeat = at;
        }
    }

    /// Drop a finished task; an executing agent with nothing left goes back to ready.
    fn release(&mut self, task_id: TaskId, succeeded: bool) -> bool {
        let held = self.active.remove(&task_id);
        if held {
            if succeeded {
                self.tasks_completed += 1;
            } else {
                self.tasks_failed += 1;
            }
        }
        if self.state == AgentState::Executing && self.active.is_empty() {
            self.state = AgentState::Ready;
        }
        self.heartbeat(Utc::now());
        held
    }
}

/// Owns the set of live agents.
///
/// Terminated agents leave the registry immediately. Those still finishing
/// in-flight work move to a retiring set that is invisible to dispatch,
/// routing, health and counts until the agent reports it has stopped.
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, AgentHandle>,
    retiring: BTreeMap<AgentId, AgentHandle>,
    backends: BackendRegistry,
    events: mpsc::Sender<AgentEvent>,
    next_seq: u64,
    max_agents: usize,
    default_kind: String,
    init_timeout: Duration,
}

impl AgentRegistry {
    pub fn new(
        config: &SwarmConfig,
        backends: BackendRegistry,
        events: mpsc::Sender<AgentEvent>,
    ) -> Self {
        Self {
            agents: BTreeMap::new(),
            retiring: BTreeMap::new(),
            backends,
            events,
            next_seq: 1,
            max_agents: config.max_agents,
            default_kind: config.default_agent_kind.clone(),
            init_timeout: config.agent_init_timeout(),
        }
    }

    /// Create, initialize and register an agent.
    ///
    /// Never errors: a full registry or a failed initialization is reported
    /// as an outcome and leaves the registry unchanged.
    pub async fn spawn(&mut self, spawn: &AgentSpawnConfig) -> SpawnOutcome {
        if self.agents.len() >= self.max_agents {
            debug!(max_agents = self.max_agents, "Spawn refused: registry at capacity");
            return SpawnOutcome::AtCapacity;
        }

        let kind = spawn.kind.clone().unwrap_or_else(|| self.default_kind.clone());
        let Some(backend) = self.backends.get(&kind).map(|factory| factory.create()) else {
            warn!(kind = %kind, "Agent initialization failed: unknown backend kind");
            return SpawnOutcome::Failed(format!("unknown backend kind '{kind}'"));
        };

        let id = AgentId::new(self.next_seq);
        self.next_seq += 1;

        debug!(agent_id = %id, kind = %kind, "Agent initializing");
        if let Err(e) = agent::initialize(id, &backend, self.init_timeout).await {
            warn!(agent_id = %id, kind = %kind, error = %e, "Agent initialization failed; discarded");
            return SpawnOutcome::Failed(e.to_string());
        }

        let rank = spawn.rank.unwrap_or(if self.agents.is_empty() {
            SUPERVISOR_RANK
        } else {
            WORKER_RANK
        });
        let (commands, join) = Agent::new(id, backend, self.events.clone()).start();
        let now = Utc::now();
        let handle = AgentHandle {
            id,
            kind,
            rank,
            state: AgentState::Ready,
            active: BTreeSet::new(),
            last_heartbeat: now,
            spawned_at: now,
            tasks_completed: 0,
            tasks_failed: 0,
            commands,
            join,
        };
        info!(agent_id = %id, kind = %handle.kind, rank, "Agent spawned");
        let snapshot = handle.snapshot();
        self.agents.insert(id, handle);
        SpawnOutcome::Spawned(snapshot)
    }

    /// Remove an agent and tell it to stop once its in-flight tasks are done.
    ///
    /// Returns false for unknown ids.
    pub fn terminate(&mut self, id: AgentId) -> bool {
        let Some(mut handle) = self.agents.remove(&id) else {
            return false;
        };
        let previous = handle.state;
        handle.state = AgentState::Terminated;
        let _ = handle.commands.send(AgentCommand::Terminate);
        info!(
            agent_id = %id,
            previous_state = %previous,
            in_flight = handle.active.len(),
            "Agent terminated"
        );
        if !handle.active.is_empty() {
            self.retiring.insert(id, handle);
        }
        true
    }

    /// Hand a task to an agent, moving the agent to `executing`.
    ///
    /// Returns false when the agent is unknown or its worker loop is gone; in
    /// the latter case the agent is marked `error` for the health monitor.
    pub fn assign(&mut self, id: AgentId, task: &mut Task) -> bool {
        let Some(handle) = self.agents.get_mut(&id) else {
            return false;
        };
        if handle.commands.send(AgentCommand::Assign(task.clone())).is_err() {
            warn!(agent_id = %id, "Agent worker loop gone; marking error");
            handle.state = AgentState::Error;
            return false;
        }
        handle.active.insert(task.id);
        handle.state = AgentState::Executing;
        task.status = TaskStatus::Assigned;
        task.assigned_to = Some(id);
        true
    }

    /// Push an envelope onto an agent's mailbox without waiting.
    pub fn deliver(&self, envelope: MessageEnvelope) -> bool {
        match self.agents.get(&envelope.to_agent_id()) {
            Some(handle) => handle.commands.send(AgentCommand::Deliver(envelope)).is_ok(),
            None => false,
        }
    }

    /// The ready agent with the fewest in-flight tasks, lowest id on ties.
    pub fn ready_candidate(&self) -> Option<AgentId> {
        self.agents
            .values()
            .filter(|a| a.state == AgentState::Ready)
            .min_by_key(|a| a.active.len())
            .map(|a| a.id)
    }

    /// Record a task start as liveness.
    pub fn task_started(&mut self, id: AgentId, at: DateTime<Utc>) {
        if let Some(handle) = self.find_mut(id) {
            handle.heartbeat(at);
        }
    }

    /// Record a finished task. Returns whether the agent held it.
    pub fn task_finished(&mut self, id: AgentId, task_id: TaskId, succeeded: bool) -> bool {
        self.find_mut(id)
            .map(|handle| handle.release(task_id, succeeded))
            .unwrap_or(false)
    }

    /// Record liveness without a task transition.
    pub fn touch(&mut self, id: AgentId) {
        if let Some(handle) = self.find_mut(id) {
            handle.heartbeat(Utc::now());
        }
    }

    /// Move a live agent to `error`. Returns false if unknown or already terminated.
    pub fn mark_error(&mut self, id: AgentId) -> bool {
        match self.agents.get_mut(&id) {
            Some(handle) if handle.state != AgentState::Terminated => {
                handle.state = AgentState::Error;
                true
            }
            _ => false,
        }
    }

    /// Forget an agent whose worker loop has exited.
    ///
    /// Returns true when the agent was still live, i.e. it stopped on its own.
    pub fn stopped(&mut self, id: AgentId) -> bool {
        if self.retiring.remove(&id).is_some() {
            debug!(agent_id = %id, "Retired agent stopped");
            return false;
        }
        match self.agents.get_mut(&id) {
            Some(handle) => {
                handle.state = AgentState::Error;
                true
            }
            None => false,
        }
    }

    /// Abort every worker loop that is still running.
    pub fn abort_all(&mut self) {
        for handle in self.agents.values().chain(self.retiring.values()) {
            handle.join.abort();
        }
        self.agents.clear();
        self.retiring.clear();
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentHandle> {
        self.agents.get(&id)
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents.values().map(AgentHandle::snapshot).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.max_agents
    }

    /// Agents terminated but still finishing work.
    pub fn retiring_count(&self) -> usize {
        self.retiring.len()
    }

    /// Tasks held by live or retiring agents.
    pub fn in_flight_count(&self) -> usize {
        self.agents
            .values()
            .chain(self.retiring.values())
            .map(AgentHandle::active_task_count)
            .sum()
    }

    /// Which agent, live or retiring, holds a task.
    pub fn holder_of(&self, task_id: TaskId) -> Option<AgentId> {
        self.agents
            .values()
            .chain(self.retiring.values())
            .find(|a| a.holds(task_id))
            .map(AgentHandle::id)
    }

    fn find_mut(&mut self, id: AgentId) -> Option<&mut AgentHandle> {
        match self.agents.get_mut(&id) {
            Some(handle) => Some(handle),
            None => self.retiring.get_mut(&id),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::{AgentBackend, SharedBackend};
    use async_trait::async_trait;
    use hive_core::{HiveError, HiveResult};
    use std::sync::Arc;

    struct Idle;

    #[async_trait]
    impl AgentBackend for Idle {
        async fn execute(&self, _agent_id: AgentId, _task: &Task) -> HiveResult<serde_json::Value> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(serde_json::Value::Null)
        }
    }

    struct Broken;

    #[async_trait]
    impl AgentBackend for Broken {
        async fn initialize(&self, _agent_id: AgentId) -> HiveResult<()> {
            Err(HiveError::Agent("no credentials".into()))
        }

        async fn execute(&self, _agent_id: AgentId, _task: &Task) -> HiveResult<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    fn registry(max: usize) -> (AgentRegistry, mpsc::Receiver<AgentEvent>) {
        let config = SwarmConfig::default().with_bounds(1, max);
        let backends = BackendRegistry::new()
            .with(Arc::new(SharedBackend::new("default", Arc::new(Idle))))
            .with(Arc::new(SharedBackend::new("broken", Arc::new(Broken))));
        let (tx, rx) = mpsc::channel(64);
        (AgentRegistry::new(&config, backends, tx), rx)
    }

    #[tokio::test]
    async fn test_spawn_until_capacity() {
        let (mut reg, _rx) = registry(2);
        assert!(matches!(reg.spawn(&AgentSpawnConfig::default()).await, SpawnOutcome::Spawned(_)));
        assert!(matches!(reg.spawn(&AgentSpawnConfig::default()).await, SpawnOutcome::Spawned(_)));
        assert!(matches!(reg.spawn(&AgentSpawnConfig::default()).await, SpawnOutcome::AtCapacity));
        assert_eq!(reg.len(), 2);
        assert!(reg.is_full());
    }

    #[tokio::test]
    async fn test_first_agent_is_supervisor() {
        let (mut reg, _rx) = registry(3);
        let SpawnOutcome::Spawned(first) = reg.spawn(&AgentSpawnConfig::default()).await else {
            panic!("spawn failed");
        };
        let SpawnOutcome::Spawned(second) = reg.spawn(&AgentSpawnConfig::default()).await else {
            panic!("spawn failed");
        };
        assert_eq!(first.rank, SUPERVISOR_RANK);
        assert_eq!(second.rank, WORKER_RANK);
        assert!(first.id < second.id);
        assert_eq!(first.state, AgentState::Ready);
    }

    #[tokio::test]
    async fn test_failed_init_leaves_registry_unchanged() {
        let (mut reg, _rx) = registry(3);
        let outcome = reg.spawn(&AgentSpawnConfig::of_kind("broken")).await;
        assert!(matches!(outcome, SpawnOutcome::Failed(_)));
        let outcome = reg.spawn(&AgentSpawnConfig::of_kind("nope")).await;
        assert!(matches!(outcome, SpawnOutcome::Failed(_)));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn test_candidate_prefers_lowest_id_on_ties() {
        let (mut reg, _rx) = registry(3);
        for _ in 0..3 {
            reg.spawn(&AgentSpawnConfig::default()).await;
        }
        assert_eq!(reg.ready_candidate(), Some(AgentId::new(1)));

        let mut task = Task::new("work", serde_json::Value::Null);
        assert!(reg.assign(AgentId::new(1), &mut task));
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(reg.get(AgentId::new(1)).unwrap().state(), AgentState::Executing);
        assert_eq!(reg.ready_candidate(), Some(AgentId::new(2)));
    }

    #[tokio::test]
    async fn test_terminate_with_in_flight_retires() {
        let (mut reg, mut rx) = registry(2);
        reg.spawn(&AgentSpawnConfig::default()).await;
        let mut task = Task::new("work", serde_json::Value::Null);
        let task_id = task.id;
        assert!(reg.assign(AgentId::new(1), &mut task));

        assert!(reg.terminate(AgentId::new(1)));
        assert!(reg.is_empty());
        assert_eq!(reg.retiring_count(), 1);
        assert_eq!(reg.holder_of(task_id), Some(AgentId::new(1)));
        assert!(reg.ready_candidate().is_none());

        // The agent still finishes its task, then stops.
        loop {
            match rx.recv().await.unwrap() {
                AgentEvent::TaskCompleted { agent_id, task_id: id, .. } => {
                    assert!(reg.task_finished(agent_id, id, true));
                }
                AgentEvent::Stopped { agent_id } => {
                    assert!(!reg.stopped(agent_id));
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(reg.retiring_count(), 0);
        assert_eq!(reg.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_terminate_unknown() {
        let (mut reg, _rx) = registry(2);
        assert!(!reg.terminate(AgentId::new(42)));
    }

    #[tokio::test]
    async fn test_mark_error_excludes_from_dispatch() {
        let (mut reg, _rx) = registry(2);
        reg.spawn(&AgentSpawnConfig::default()).await;
        assert!(reg.mark_error(AgentId::new(1)));
        assert!(reg.ready_candidate().is_none());
        assert_eq!(reg.get(AgentId::new(1)).unwrap().state(), AgentState::Error);
    }
}
