use crate::error::{Result, RetrievalError};
use crate::fallback::FallbackStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_COLLECTION: &str = "code_chunks";

/// Token-bucket admission parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_limit: u32,
    pub cooldown_seconds: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_limit: 10,
            cooldown_seconds: 1.0,
        }
    }
}

impl RateLimitConfig {
    /// Saturates at `Duration::MAX` for values `validate` would reject
    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_seconds.max(0.0)).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_size: usize,
    /// Checked to lie in [0, 1]; hits always need identical query text
    pub min_similarity: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_size: 1000,
            min_similarity: 0.95,
        }
    }
}

impl CacheConfig {
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Upper bound for each fallback strategy attempt
    pub timeout_ms: u64,
    /// Strategies tried in order once a failure escalates
    pub strategies: Vec<FallbackStrategy>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_ms: 10_000,
            strategies: FallbackStrategy::ALL.to_vec(),
        }
    }
}

impl FallbackConfig {
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_tokens: usize,
    /// Entries below this relevance are dropped when the window is rebuilt
    pub min_relevance: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2_000_000,
            min_relevance: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Oldest records are dropped past this many
    pub history_limit: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_limit: 10_000,
        }
    }
}

/// Everything the retrieval core reads from configuration.
///
/// ```toml
/// collection = "code_chunks"
///
/// [rate_limit]
/// requests_per_minute = 60
/// burst_limit = 10
///
/// [fallback]
/// strategies = ["cache_only", "local_search", "error_only"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub collection: String,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
    pub context: ContextConfig,
    pub metrics: MetricsConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            fallback: FallbackConfig::default(),
            context: ContextConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        log::debug!("Loaded retrieval config from {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.collection.trim().is_empty() {
            return Err("collection must not be empty".to_string());
        }
        if self.rate_limit.requests_per_minute == 0 {
            return Err("rate_limit.requests_per_minute must be > 0".to_string());
        }
        if self.rate_limit.burst_limit == 0 {
            return Err("rate_limit.burst_limit must be > 0".to_string());
        }
        if Duration::try_from_secs_f64(self.rate_limit.cooldown_seconds).is_err() {
            return Err(
                "rate_limit.cooldown_seconds must be a non-negative number of seconds that fits a duration"
                    .to_string(),
            );
        }
        if self.cache.max_size == 0 {
            return Err("cache.max_size must be > 0".to_string());
        }
        if self.cache.ttl_seconds == 0 {
            return Err("cache.ttl_seconds must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.cache.min_similarity) {
            return Err("cache.min_similarity must be within [0, 1]".to_string());
        }
        if self.fallback.strategies.is_empty() {
            return Err("fallback.strategies must list at least one strategy".to_string());
        }
        if self.fallback.timeout_ms == 0 {
            return Err("fallback.timeout_ms must be > 0".to_string());
        }
        if self.context.max_tokens == 0 {
            return Err("context.max_tokens must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.context.min_relevance) {
            return Err("context.min_relevance must be within [0, 1]".to_string());
        }
        if self.metrics.history_limit == 0 {
            return Err("metrics.history_limit must be > 0".to_string());
        }
        Ok(())
    }
}
