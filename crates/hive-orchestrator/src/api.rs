use crate::types::{AgentId, MessageEnvelope, Priority, Task};
use hive_core::{HiveError, HiveResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound "send message" request as a transport would decode it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default, alias = "fromAgentId")]
    pub from_agent_id: Option<String>,
    #[serde(default, alias = "toAgentId")]
    pub to_agent_id: Option<String>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, alias = "correlationId")]
    pub correlation_id: Option<Uuid>,
}

impl SendMessageRequest {
    /// Validate and build the immutable envelope.
    pub fn into_envelope(self) -> HiveResult<MessageEnvelope> {
        let from = self
            .from_agent_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| HiveError::Validation("fromAgentId is required".into()))?;
        let content = self
            .content
            .filter(is_present)
            .ok_or_else(|| HiveError::Validation("content is required".into()))?;
        let to: AgentId = self
            .to_agent_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| HiveError::Validation("toAgentId is required".into()))?
            .parse()?;

        let mut envelope = MessageEnvelope::new(from, to, content)
            .with_priority(self.priority.unwrap_or_default());
        if let Some(content_type) = self.content_type {
            envelope = envelope.with_content_type(content_type);
        }
        if let Some(correlation_id) = self.correlation_id {
            envelope = envelope.with_correlation_id(correlation_id);
        }
        Ok(envelope)
    }
}

/// Inbound "submit task" request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    #[serde(default, rename = "type")]
    pub task_type: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl SubmitTaskRequest {
    pub fn new(task_type: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            task_type: Some(task_type.into()),
            content,
            priority: None,
        }
    }

    /// Validate and build a fresh queued task.
    pub fn into_task(self) -> HiveResult<Task> {
        let task_type = self
            .task_type
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| HiveError::Validation("type is required".into()))?;
        Ok(Task::new(task_type, self.content).with_priority(self.priority.unwrap_or_default()))
    }
}

fn is_present(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn message(json: serde_json::Value) -> HiveResult<MessageEnvelope> {
        serde_json::from_value::<SendMessageRequest>(json)
            .unwrap()
            .into_envelope()
    }

    #[test]
    fn test_valid_message() {
        let env = message(serde_json::json!({
            "fromAgentId": "agent-1",
            "toAgentId": "agent-2",
            "content": {"op": "sync"},
            "contentType": "application/vnd.hive+json",
            "priority": "high"
        }))
        .unwrap();
        assert_eq!(env.from_agent_id(), "agent-1");
        assert_eq!(env.to_agent_id(), AgentId::new(2));
        assert_eq!(env.content_type(), "application/vnd.hive+json");
        assert_eq!(env.priority(), Priority::High);
    }

    #[test]
    fn test_missing_from_is_400() {
        let err = message(serde_json::json!({"toAgentId": "agent-2", "content": "x"})).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("fromAgentId"));
    }

    #[test]
    fn test_missing_or_empty_content_is_400() {
        let err = message(serde_json::json!({"fromAgentId": "a", "toAgentId": "agent-2"})).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = message(serde_json::json!({"fromAgentId": "a", "toAgentId": "agent-2", "content": ""}))
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn test_unparseable_target_is_400() {
        let err = message(serde_json::json!({"fromAgentId": "a", "toAgentId": "bob", "content": 1}))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_snake_case_fields_accepted() {
        let env = message(serde_json::json!({
            "from_agent_id": "ops",
            "to_agent_id": "3",
            "content": [1, 2]
        }))
        .unwrap();
        assert_eq!(env.to_agent_id(), AgentId::new(3));
        assert_eq!(env.content_type(), "application/json");
    }

    #[test]
    fn test_task_requires_type() {
        let req: SubmitTaskRequest = serde_json::from_value(serde_json::json!({"content": "x"})).unwrap();
        let err = req.into_task().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_task_from_request() {
        let req: SubmitTaskRequest = serde_json::from_value(serde_json::json!({
            "type": "summarize",
            "content": {"url": "https://example.com"},
            "priority": "critical"
        }))
        .unwrap();
        let task = req.into_task().unwrap();
        assert_eq!(task.task_type, "summarize");
        assert_eq!(task.priority, Priority::Critical);
    }
}
