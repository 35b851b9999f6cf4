use crate::types::{AgentId, AgentSnapshot, AgentState};
use chrono::{DateTime, Utc};
use hive_core::SwarmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What one reconciliation pass wants done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingPlan {
    pub desired: usize,
    pub spawn: usize,
    /// Agents safe to remove, longest idle first.
    pub terminate: Vec<AgentId>,
}

impl ScalingPlan {
    pub fn is_noop(&self) -> bool {
        self.spawn == 0 && self.terminate.is_empty()
    }
}

/// Sizes the pool against queue depth.
///
/// Scale-up is immediate: every missing agent is spawned in one pass.
/// Scale-down only ever removes agents that are ready, hold no tasks and
/// have been idle longer than the configured threshold; a pass may leave the
/// pool above target rather than disturb a busy agent.
#[derive(Debug, Clone)]
pub struct AutoScaler {
    min_agents: usize,
    max_agents: usize,
    tasks_per_agent: usize,
    idle_after: Duration,
}

impl AutoScaler {
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            min_agents: config.min_agents,
            max_agents: config.max_agents,
            tasks_per_agent: config.tasks_per_agent.max(1),
            idle_after: config.terminate_idle_after(),
        }
    }

    /// `clamp(ceil(queue_depth / tasks_per_agent), min, max)`.
    pub fn desired(&self, queue_depth: usize) -> usize {
        queue_depth
            .div_ceil(self.tasks_per_agent)
            .clamp(self.min_agents, self.max_agents)
    }

    /// Whether an agent may be removed by scale-down at `now`.
    pub fn is_idle(&self, agent: &AgentSnapshot, now: DateTime<Utc>) -> bool {
        agent.state == AgentState::Ready
            && agent.active_task_count == 0
            && now
                .signed_duration_since(agent.last_heartbeat)
                .to_std()
                .is_ok_and(|idle| idle > self.idle_after)
    }

    /// Reconcile the pool against the queue.
    pub fn plan(&self, queue_depth: usize, agents: &[AgentSnapshot], now: DateTime<Utc>) -> ScalingPlan {
        let current = agents.len();
        let desired = self.desired(queue_depth);

        if desired > current {
            return ScalingPlan {
                desired,
                spawn: desired - current,
                terminate: Vec::new(),
            };
        }

        let mut terminate = Vec::new();
        if desired < current && desired >= self.min_agents {
            let mut idle: Vec<&AgentSnapshot> =
                agents.iter().filter(|a| self.is_idle(a, now)).collect();
            idle.sort_by(|a, b| {
                a.last_heartbeat
                    .cmp(&b.last_heartbeat)
                    .then_with(|| b.id.cmp(&a.id))
            });
            terminate = idle
                .into_iter()
                .take(current - desired)
                .map(|a| a.id)
                .collect();
        }

        ScalingPlan {
            desired,
            spawn: 0,
            terminate,
        }
    }

    pub fn min_agents(&self) -> usize {
        self.min_agents
    }

    pub fn max_agents(&self) -> usize {
        self.max_agents
    }
}
