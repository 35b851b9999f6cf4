use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide swarm counters. Monotonically non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmMetrics {
    pub agents_spawned: u64,
    pub agents_terminated: u64,
    pub agents_replaced: u64,
    pub spawn_failures: u64,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub total_execution_ms: u64,
    pub messages_routed: u64,
    pub messages_dropped: u64,
}

impl SwarmMetrics {
    pub fn record_completion(&mut self, duration: Duration) {
        self.tasks_completed += 1;
        self.add_execution_time(duration);
    }

    pub fn record_failure(&mut self, duration: Duration) {
        self.tasks_failed += 1;
        self.add_execution_time(duration);
    }

    /// Mean execution time over finished tasks, if any finished.
    pub fn average_execution_ms(&self) -> Option<u64> {
        let finished = self.tasks_completed + self.tasks_failed;
        (finished > 0).then(|| self.total_execution_ms / finished)
    }

    fn add_execution_time(&mut self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.total_execution_ms = self.total_execution_ms.saturating_add(ms);
    }
}
