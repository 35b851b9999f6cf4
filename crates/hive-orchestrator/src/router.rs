use crate::registry::AgentRegistry;
use crate::types::{MessageEnvelope, RouteOutcome};
use tracing::{debug, warn};

/// Delivers envelopes to agents by `to_agent_id`.
///
/// Delivery is fire-and-forget: the envelope is pushed onto the target's
/// mailbox and `route` returns immediately. Each agent drains its mailbox
/// sequentially, so envelopes to one agent arrive in `route` order. Unknown
/// targets are logged and dropped; there is no retry and no dead-letter queue.
#[derive(Debug, Default)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, envelope: MessageEnvelope, registry: &AgentRegistry) -> RouteOutcome {
        let message_id = envelope.id();
        let from = envelope.from_agent_id().to_string();
        let to = envelope.to_agent_id();

        if registry.deliver(envelope) {
            debug!(message_id = %message_id, from = %from, to = %to, "Message scheduled for delivery");
            RouteOutcome::Scheduled
        } else {
            warn!(message_id = %message_id, from = %from, to = %to, "Target agent not found; message dropped");
            RouteOutcome::Dropped
        }
    }
}
