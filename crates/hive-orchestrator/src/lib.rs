//! Swarm orchestration engine: agent lifecycle, task dispatch, auto-scaling,
//! health monitoring and agent-to-agent message routing.
//!
//! A single control loop owns the agent registry and the task queue. Callers
//! drive it through a cloneable [`SwarmHandle`]; agents run as independent
//! tokio tasks and report progress back over a shared event channel.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Validates configuration and starts the control loop.
//! - [`SwarmHandle`] — Request handle for every swarm operation.
//! - [`AgentRegistry`] — Owns live agents and their in-flight task sets.
//! - [`TaskDispatcher`] — Least-busy selection and the FIFO back-pressure queue.
//! - [`AutoScaler`] — Computes desired pool size and scale-down candidates.
//! - [`HealthMonitor`] — Classifies swarm health from agent states.
//! - [`MessageRouter`] — Fire-and-forget delivery to agent mailboxes.
//! - [`AgentBackend`] — Trait implemented by the code that actually does the work.

/// Agent worker loop and its command/event protocol.
pub mod agent;
/// Request payloads and their validation.
pub mod api;
/// Pluggable agent backends.
pub mod backend;
/// Task selection and the back-pressure queue.
pub mod dispatcher;
/// Swarm health classification.
pub mod health;
/// Swarm counters.
pub mod metrics;
/// The control loop and its handle.
pub mod orchestrator;
/// The set of live agents.
pub mod registry;
/// Agent-to-agent message routing.
pub mod router;
/// Pool sizing decisions.
pub mod scaler;
/// Shared swarm types (AgentId, Task, MessageEnvelope, etc.).
pub mod types;

pub use agent::{AgentCommand, AgentEvent};
pub use api::{SendMessageRequest, SubmitTaskRequest};
pub use backend::{AgentBackend, BackendFactory, BackendRegistry, SharedBackend};
pub use dispatcher::TaskDispatcher;
pub use health::{HealthMonitor, HealthReport, HealthTier};
pub use metrics::SwarmMetrics;
pub use orchestrator::{Orchestrator, SwarmHandle, SwarmStatus};
pub use registry::{AgentRegistry, SpawnOutcome};
pub use router::MessageRouter;
pub use scaler::{AutoScaler, ScalingPlan};
pub use types::{
    AgentId, AgentSnapshot, AgentSpawnConfig, AgentState, DistributeOutcome, Liveness,
    MessageEnvelope, MessageId, Priority, RouteOutcome, ScaleReport, Task, TaskId, TaskStatus,
};
