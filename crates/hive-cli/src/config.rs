//! `hive.toml` loading.

use crate::simulation::SimulationConfig;
use hive_core::SwarmConfig;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Top-level file layout: a `[swarm]` table and a `[simulation]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HiveConfig {
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl HiveConfig {
    /// Read and parse the file at `path`.
    ///
    /// A missing file is an error unless `allow_defaults` is set, in which
    /// case the built-in defaults are used.
    pub async fn load(path: &Path, allow_defaults: bool) -> anyhow::Result<Self> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound && allow_defaults => {
                warn!(path = %path.display(), "Config file not found; using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            }
        };
        let config: HiveConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {e}", path.display()))?;
        Ok(config)
    }

    /// Apply command-line bound overrides.
    pub fn with_bounds(mut self, min_agents: Option<usize>, max_agents: Option<usize>) -> Self {
        if let Some(min) = min_agents {
            self.swarm.min_agents = min;
        }
        if let Some(max) = max_agents {
            self.swarm.max_agents = max;
        }
        self
    }
}
