use crate::error::{HiveError, HiveResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide swarm configuration.
///
/// Read once at startup and passed by value to every component; nothing in
/// the orchestrator mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Lower bound on the number of registered agents.
    #[serde(default = "default_min_agents")]
    pub min_agents: usize,
    /// Upper bound on the number of registered agents.
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Queue length above which a task submission requests an extra agent.
    #[serde(default = "default_spawn_threshold_queue_size")]
    pub spawn_threshold_queue_size: usize,
    /// Idle time after which a ready agent may be scaled down.
    #[serde(default = "default_terminate_idle_after_ms")]
    pub terminate_idle_after_ms: u64,
    /// Period of the health monitor timer.
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// Queue depth one agent is assumed to absorb when sizing the pool.
    #[serde(default = "default_tasks_per_agent")]
    pub tasks_per_agent: usize,
    /// Deadline for a single agent's initialization.
    #[serde(default = "default_agent_init_timeout_ms")]
    pub agent_init_timeout_ms: u64,
    /// Capacity of the orchestrator's inbound command channel.
    #[serde(default = "default_command_channel_capacity")]
    pub command_channel_capacity: usize,
    /// Capacity of the agent -> orchestrator event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Backend kind used when spawning agents without an explicit kind.
    #[serde(default = "default_agent_kind")]
    pub default_agent_kind: String,
    /// State directory reserved for an external persistence collaborator.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_min_agents() -> usize {
    3
}
fn default_max_agents() -> usize {
    10
}
fn default_spawn_threshold_queue_size() -> usize {
    10
}
fn default_terminate_idle_after_ms() -> u64 {
    300_000
}
fn default_health_check_interval_ms() -> u64 {
    30_000
}
fn default_tasks_per_agent() -> usize {
    5
}
fn default_agent_init_timeout_ms() -> u64 {
    10_000
}
fn default_command_channel_capacity() -> usize {
    256
}
fn default_event_channel_capacity() -> usize {
    1024
}
fn default_agent_kind() -> String {
    "default".to_string()
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            min_agents: default_min_agents(),
            max_agents: default_max_agents(),
            spawn_threshold_queue_size: default_spawn_threshold_queue_size(),
            terminate_idle_after_ms: default_terminate_idle_after_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            tasks_per_agent: default_tasks_per_agent(),
            agent_init_timeout_ms: default_agent_init_timeout_ms(),
            command_channel_capacity: default_command_channel_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
            default_agent_kind: default_agent_kind(),
            state_dir: default_state_dir(),
        }
    }
}

impl SwarmConfig {
    /// Set the pool bounds.
    pub fn with_bounds(mut self, min_agents: usize, max_agents: usize) -> Self {
        self.min_agents = min_agents;
        self.max_agents = max_agents;
        self
    }

    /// Set the queue length that triggers a back-pressure spawn.
    pub fn with_spawn_threshold(mut self, queue_size: usize) -> Self {
        self.spawn_threshold_queue_size = queue_size;
        self
    }

    /// Set the idle time after which agents become scale-down candidates.
    pub fn with_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.terminate_idle_after_ms = ms;
        self
    }

    /// Set the health monitor period.
    pub fn with_health_interval_ms(mut self, ms: u64) -> Self {
        self.health_check_interval_ms = ms;
        self
    }

    /// Check the invariants the orchestrator relies on.
    ///
    /// Called once at construction; an invalid config never reaches runtime.
    pub fn validate(&self) -> HiveResult<()> {
        if self.min_agents == 0 {
            return Err(HiveError::Config("min_agents must be at least 1".into()));
        }
        if self.min_agents > self.max_agents {
            return Err(HiveError::Config(format!(
                "min_agents ({}) must not exceed max_agents ({})",
                self.min_agents, self.max_agents
            )));
        }
        if self.tasks_per_agent == 0 {
            return Err(HiveError::Config("tasks_per_agent must be at least 1".into()));
        }
        if self.health_check_interval_ms == 0 {
            return Err(HiveError::Config(
                "health_check_interval_ms must be greater than 0".into(),
            ));
        }
        if self.command_channel_capacity == 0 || self.event_channel_capacity == 0 {
            return Err(HiveError::Config(
                "channel capacities must be greater than 0".into(),
            ));
        }
        if self.default_agent_kind.trim().is_empty() {
            return Err(HiveError::Config("default_agent_kind must not be empty".into()));
        }
        Ok(())
    }

    /// Health monitor period as a [`Duration`].
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Agent initialization deadline as a [`Duration`].
    pub fn agent_init_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_init_timeout_ms)
    }

    /// Idle threshold as a [`Duration`].
    pub fn terminate_idle_after(&self) -> Duration {
        Duration::from_millis(self.terminate_idle_after_ms)
    }
}
