use crate::types::{AgentId, AgentSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Swarm-level health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthTier {
    /// `> 80%` healthy, `> 50%` degraded, anything else unhealthy.
    pub fn from_percentage(pct: f64) -> Self {
        if pct > 80.0 {
            HealthTier::Healthy
        } else if pct > 50.0 {
            HealthTier::Degraded
        } else {
            HealthTier::Unhealthy
        }
    }
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthTier::Healthy => write!(f, "healthy"),
            HealthTier::Degraded => write!(f, "degraded"),
            HealthTier::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Result of sampling every agent once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub tier: HealthTier,
    pub health_percentage: f64,
    pub healthy_agents: usize,
    pub total_agents: usize,
    /// Agents not in `ready` or `executing`.
    pub unhealthy: Vec<AgentId>,
    /// Agents swapped out by this cycle.
    #[serde(default)]
    pub replaced: Vec<AgentId>,
    pub checked_at: DateTime<Utc>,
}

/// Classifies swarm health from agent states.
///
/// The monitor only judges. The orchestrator owns the timer and replaces
/// every agent listed in [`HealthReport::unhealthy`] on each cycle.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    last_tier: Option<HealthTier>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the given agents.
    pub fn assess(agents: &[AgentSnapshot]) -> HealthReport {
        let total = agents.len();
        let unhealthy: Vec<AgentId> = agents
            .iter()
            .filter(|a| !a.state.is_healthy())
            .map(|a| a.id)
            .collect();
        let healthy = total - unhealthy.len();
        let health_percentage = healthy as f64 / total.max(1) as f64 * 100.0;

        HealthReport {
            tier: HealthTier::from_percentage(health_percentage),
            health_percentage,
            healthy_agents: healthy,
            total_agents: total,
            unhealthy,
            replaced: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    /// Remember the tier of a finished cycle; returns the previous tier if it changed.
    pub fn observe(&mut self, tier: HealthTier) -> Option<Option<HealthTier>> {
        let previous = self.last_tier.replace(tier);
        (previous != Some(tier)).then_some(previous)
    }

    pub fn last_tier(&self) -> Option<HealthTier> {
        self.last_tier
    }
}
