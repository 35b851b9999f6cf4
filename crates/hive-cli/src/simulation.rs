//! Simulated agent backend used by `hive run`.
//!
//! Tasks sleep for a fixed latency and then echo their payload. A
//! configurable fraction of tasks report an agent fault instead. Whether a
//! task faults is decided by hashing its id, so the outcome is stable per
//! task but differs between runs.

use async_trait::async_trait;
use hive_core::{HiveError, HiveResult};
use hive_orchestrator::{AgentBackend, AgentId, BackendFactory, MessageEnvelope, Task};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// `[simulation]` table of `hive.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_task_latency_ms")]
    pub task_latency_ms: u64,
    /// Probability in `[0, 1]` that a task faults its agent.
    #[serde(default)]
    pub fault_rate: f64,
}

fn default_task_latency_ms() -> u64 {
    200
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            task_latency_ms: default_task_latency_ms(),
            fault_rate: 0.0,
        }
    }
}

pub struct SimulatedBackend {
    latency: Duration,
    fault_rate: f64,
}

impl SimulatedBackend {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.task_latency_ms),
            fault_rate: config.fault_rate.clamp(0.0, 1.0),
        }
    }

    /// Whether this task is one of the unlucky ones.
    fn faults(&self, task: &Task) -> bool {
        if self.fault_rate <= 0.0 {
            return false;
        }
        let mut hasher = DefaultHasher::new();
        task.id.hash(&mut hasher);
        let roll = (hasher.finish() % 10_000) as f64 / 10_000.0;
        roll < self.fault_rate
    }
}

#[async_trait]
impl AgentBackend for SimulatedBackend {
    async fn execute(&self, agent_id: AgentId, task: &Task) -> HiveResult<serde_json::Value> {
        tokio::time::sleep(self.latency).await;
        if self.faults(task) {
            return Err(HiveError::Fault(format!(
                "{agent_id} lost its worker while running {}",
                task.id
            )));
        }
        Ok(serde_json::json!({
            "agent": agent_id.to_string(),
            "type": task.task_type,
            "echo": task.content,
        }))
    }

    async fn handle_message(&self, agent_id: AgentId, envelope: &MessageEnvelope) -> HiveResult<()> {
        debug!(agent_id = %agent_id, from = %envelope.from_agent_id(), "Simulated agent received message");
        Ok(())
    }
}

/// Gives every agent its own simulated backend.
pub struct SimulatedFactory {
    kind: String,
    config: SimulationConfig,
}

impl SimulatedFactory {
    pub fn new(kind: impl Into<String>, config: SimulationConfig) -> Self {
        Self {
            kind: kind.into(),
            config,
        }
    }
}

impl BackendFactory for SimulatedFactory {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn create(&self) -> Arc<dyn AgentBackend> {
        Arc::new(SimulatedBackend::new(&self.config))
    }
}
