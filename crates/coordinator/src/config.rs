use serde::{Deserialize, Serialize};

/// Shared budget the coordinator divides between agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Context-window tokens available to all agents together
    pub total_context_window: usize,

    /// Window reported for agents before any redistribution
    pub default_agent_window: usize,

    /// Floor of an agent's share weight, so a failing agent keeps some budget
    pub min_share_weight: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            total_context_window: 2_000_000,
            default_agent_window: 500_000,
            min_share_weight: 0.1,
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.total_context_window == 0 {
            return Err("total_context_window must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_share_weight) || self.min_share_weight == 0.0 {
            return Err(format!(
                "min_share_weight must be in (0, 1], got {}",
                self.min_share_weight
            ));
        }
        Ok(())
    }
}
