use crate::types::{AgentId, MessageEnvelope, Task};
use async_trait::async_trait;
use hive_core::HiveResult;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// The work an agent actually performs.
///
/// The orchestrator never looks inside a task; it only hands tasks and
/// messages to the backend and records what comes back. Returning
/// [`hive_core::HiveError::Fault`] from `execute` marks the agent itself as
/// broken, any other error only fails the task.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Bring the agent up. A failure discards the agent before it is registered.
    async fn initialize(&self, _agent_id: AgentId) -> HiveResult<()> {
        Ok(())
    }

    /// Run one task to completion.
    async fn execute(&self, agent_id: AgentId, task: &Task) -> HiveResult<serde_json::Value>;

    /// Receive a message addressed to this agent.
    async fn handle_message(
        &self,
        _agent_id: AgentId,
        _envelope: &MessageEnvelope,
    ) -> HiveResult<()> {
        Ok(())
    }
}

/// Creates one backend instance per spawned agent.
pub trait BackendFactory: Send + Sync {
    /// Discriminator this factory is registered under.
    fn kind(&self) -> &str;

    /// A fresh backend for a new agent.
    fn create(&self) -> Arc<dyn AgentBackend>;
}

/// Factory that hands every agent the same shared backend.
pub struct SharedBackend {
    kind: String,
    backend: Arc<dyn AgentBackend>,
}

impl SharedBackend {
    pub fn new(kind: impl Into<String>, backend: Arc<dyn AgentBackend>) -> Self {
        Self {
            kind: kind.into(),
            backend,
        }
    }
}

impl BackendFactory for SharedBackend {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn create(&self) -> Arc<dyn AgentBackend> {
        Arc::clone(&self.backend)
    }
}

/// Registry of backend factories keyed by kind.
pub struct BackendRegistry {
    factories: HashMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory, replacing any previous one of the same kind.
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        let kind = factory.kind().to_string();
        info!(kind = %kind, "Registered agent backend");
        self.factories.insert(kind, factory);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn BackendFactory>> {
        self.factories.get(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
