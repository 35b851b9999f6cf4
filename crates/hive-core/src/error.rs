/// Top-level error type for the hive orchestrator.
///
/// Each variant corresponds to a subsystem or a failure class. Capacity
/// exhaustion, routing misses and agent initialization failures are not
/// errors; they surface as outcome values from the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    /// Invalid configuration, detected once at construction.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by an agent backend while executing a task or
    /// handling a message.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The agent itself is broken and should be moved to the `error` state.
    #[error("Agent fault: {0}")]
    Fault(String),

    /// The orchestrator control loop is unavailable (shut down or gone).
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A request was missing required fields or carried invalid values.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A lookup by id found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation did not complete within its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HiveError {
    /// Status code a transport binding should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HiveError::Validation(_) | HiveError::Json(_) => 400,
            HiveError::NotFound(_) => 404,
            HiveError::Orchestrator(_) => 503,
            HiveError::Timeout(_) => 504,
            _ => 500,
        }
    }

    /// Whether this error signals a broken agent rather than a failed task.
    pub fn is_fault(&self) -> bool {
        matches!(self, HiveError::Fault(_))
    }
}

/// A convenience `Result` alias using [`HiveError`].
pub type HiveResult<T> = Result<T, HiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HiveError::Validation("x".into()).status_code(), 400);
        assert_eq!(HiveError::NotFound("agent-9".into()).status_code(), 404);
        assert_eq!(HiveError::Orchestrator("down".into()).status_code(), 503);
        assert_eq!(HiveError::Agent("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_is_fault() {
        assert!(HiveError::Fault("disk gone".into()).is_fault());
        assert!(!HiveError::Agent("bad input".into()).is_fault());
    }

    #[test]
    fn test_display() {
        let err = HiveError::NotFound("agent-3".into());
        assert_eq!(err.to_string(), "Not found: agent-3");
    }

    #[test]
    fn test_from_json_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: HiveError = parse.unwrap_err().into();
        assert!(matches!(err, HiveError::Json(_)));
        assert_eq!(err.status_code(), 400);
    }
}
