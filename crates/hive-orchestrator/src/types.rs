use chrono::{DateTime, Utc};
use hive_core::HiveError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a task.
pub type TaskId = Uuid;

/// Identifier of a message envelope.
pub type MessageId = Uuid;

/// Rank carried by the first agent spawned into an empty registry.
pub const SUPERVISOR_RANK: u32 = 1;

/// Rank carried by every other agent.
pub const WORKER_RANK: u32 = 0;

/// Opaque, immutable agent identifier assigned by the registry at spawn.
///
/// Ids are allocated from a monotonically increasing sequence, so ordering by
/// id is ordering by spawn time. Rendered as `agent-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(u64);

impl AgentId {
    /// Wrap a raw sequence number.
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The raw sequence number.
    pub const fn seq(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = HiveError;

    /// Accepts both `agent-7` and the bare `7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let digits = raw.strip_prefix("agent-").unwrap_or(raw);
        digits
            .parse::<u64>()
            .map(AgentId)
            .map_err(|_| HiveError::Validation(format!("invalid agent id '{s}'")))
    }
}

impl Serialize for AgentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Running its initialization; never visible in the registry.
    Initializing,
    /// Idle and eligible for dispatch.
    Ready,
    /// Holding at least one in-flight task.
    Executing,
    /// Faulted; waiting for the health monitor to replace it.
    Error,
    /// Stopped or stopping; never eligible for anything again.
    Terminated,
}

impl AgentState {
    /// Healthy agents are the ones that can make progress.
    pub fn is_healthy(self) -> bool {
        matches!(self, AgentState::Ready | AgentState::Executing)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Initializing => "initializing",
            AgentState::Ready => "ready",
            AgentState::Executing => "executing",
            AgentState::Error => "error",
            AgentState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Priority of a task or message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Ahead of normal work where a consumer cares.
    High,
    /// Highest.
    Critical,
}

/// Status of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Assigned,
    Executing,
    Completed,
    Failed { reason: String },
}

impl TaskStatus {
    /// Completed and failed tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed { .. })
    }
}

/// A unit of work submitted to the swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub content: serde_json::Value,
    pub priority: Priority,
    pub status: TaskStatus,
    pub assigned_to: Option<AgentId>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Output reported by the executing agent on completion.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl Task {
    pub fn new(task_type: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            content,
            priority: Priority::Normal,
            status: TaskStatus::Queued,
            assigned_to: None,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// An immutable agent-to-agent message.
///
/// Fields are only readable; routing inspects `to_agent_id` and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    id: MessageId,
    from_agent_id: String,
    to_agent_id: AgentId,
    content: serde_json::Value,
    content_type: String,
    priority: Priority,
    timestamp: DateTime<Utc>,
    correlation_id: Option<Uuid>,
}

impl MessageEnvelope {
    /// Build an envelope. The sender may be an agent id or any external name.
    pub fn new(
        from_agent_id: impl Into<String>,
        to_agent_id: AgentId,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_agent_id: from_agent_id.into(),
            to_agent_id,
            content,
            content_type: "application/json".to_string(),
            priority: Priority::Normal,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn from_agent_id(&self) -> &str {
        &self.from_agent_id
    }

    pub fn to_agent_id(&self) -> AgentId {
        self.to_agent_id
    }

    pub fn content(&self) -> &serde_json::Value {
        &self.content
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
}

/// Options for spawning a single agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSpawnConfig {
    /// Backend kind; the swarm's default kind when absent.
    #[serde(default)]
    pub kind: Option<String>,
    /// Rank override; otherwise derived from spawn order.
    #[serde(default)]
    pub rank: Option<u32>,
}

impl AgentSpawnConfig {
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            rank: None,
        }
    }
}

/// Point-in-time view of one registered agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub kind: String,
    pub state: AgentState,
    pub rank: u32,
    pub active_task_count: usize,
    pub active_tasks: Vec<TaskId>,
    pub last_heartbeat: DateTime<Utc>,
    pub spawned_at: DateTime<Utc>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}

/// Result of handing a task to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributeOutcome {
    pub task_id: TaskId,
    pub queued: bool,
    /// 1-based position in the queue when `queued`.
    pub queue_position: Option<usize>,
    /// The agent that received the task when not queued.
    pub assigned_to: Option<AgentId>,
}

/// What happened to a routed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    /// Handed to the target's mailbox; delivery happens asynchronously.
    Scheduled,
    /// Target unknown; the envelope was dropped.
    Dropped,
}

/// Pool size after a forced scaling pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleReport {
    pub current: usize,
    pub min: usize,
    pub max: usize,
    pub desired: usize,
    pub spawned: usize,
    pub terminated: usize,
}

/// Liveness check answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liveness {
    pub alive: bool,
    pub agent_count: usize,
}
