use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-agent model settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_tokens: u32,
    /// Delay before each retry of a transient model failure
    pub retry_delays_ms: Vec<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            retry_delays_ms: vec![4_000, 8_000],
        }
    }
}

impl AgentConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_delays_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Budget for one agent's whole analysis, retries included
    pub agent_timeout_ms: u64,
    pub agent: AgentConfig,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            agent_timeout_ms: 30_000,
            agent: AgentConfig::default(),
        }
    }
}

impl ReasoningConfig {
    pub const fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.agent_timeout_ms == 0 {
            return Err("agent_timeout_ms must be > 0".to_string());
        }
        if self.agent.max_tokens == 0 {
            return Err("agent.max_tokens must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_retry_schedule() {
        let config = ReasoningConfig::default();
        assert_eq!(config.agent_timeout(), Duration::from_secs(30));
        assert_eq!(config.agent.retry_policy(), RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ReasoningConfig =
            serde_json::from_str(r#"{"agent": {"max_tokens": 512}}"#).unwrap();
        assert_eq!(config.agent.max_tokens, 512);
        assert_eq!(config.agent.retry_delays_ms, vec![4_000, 8_000]);
        assert_eq!(config.agent_timeout_ms, 30_000);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ReasoningConfig {
            agent_timeout_ms: 0,
            ..ReasoningConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
