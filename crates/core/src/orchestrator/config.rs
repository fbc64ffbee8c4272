//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the acquisition orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum concurrent segment transfers across all items.
    #[serde(default = "default_max_transfers")]
    pub max_concurrent_transfers: usize,

    /// Maximum concurrent assemble+verify jobs.
    /// Defaults to the transfer limit when absent.
    #[serde(default)]
    pub max_concurrent_assembles: Option<usize>,

    /// Overall wall-clock budget for draining in-flight work.
    /// On expiry, whatever is still in flight is abandoned.
    #[serde(default = "default_drain_budget_secs")]
    pub drain_budget_secs: u64,
}

fn default_max_transfers() -> usize {
    5
}

fn default_drain_budget_secs() -> u64 {
    1800 // 30 minutes
}

impl OrchestratorConfig {
    pub fn assemble_limit(&self) -> usize {
        self.max_concurrent_assembles
            .unwrap_or(self.max_concurrent_transfers)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: default_max_transfers(),
            max_concurrent_assembles: None,
            drain_budget_secs: default_drain_budget_secs(),
        }
    }
}
