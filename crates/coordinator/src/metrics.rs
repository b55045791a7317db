use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Running performance record for one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub total_operations: u64,
    pub successful_operations: u64,
    pub success_rate: f64,
    pub average_latency_ms: f64,
    /// Tokens consumed per model
    pub token_usage: BTreeMap<String, u64>,
    pub last_updated_unix_ms: u64,
}

impl AgentMetrics {
    pub fn record(&mut self, success: bool, latency: Duration, token_usage: &BTreeMap<String, u64>) {
        self.total_operations += 1;
        if success {
            self.successful_operations += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = self.total_operations as f64;
        self.success_rate = (self.success_rate * (n - 1.0) + f64::from(u8::from(success))) / n;
        self.average_latency_ms =
            (self.average_latency_ms * (n - 1.0) + latency.as_secs_f64() * 1000.0) / n;

        for (model, tokens) in token_usage {
            *self.token_usage.entry(model.clone()).or_insert(0) += tokens;
        }
        self.last_updated_unix_ms = orca_protocol::unix_ms_now();
    }
}

/// Slice of the shared budget held by one agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub cpu_share: f64,
    pub context_window: usize,
}

/// Process-wide analysis counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub total_analyses: u64,
    pub average_duration_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl SystemMetrics {
    pub fn record_analysis(&mut self, duration: Duration) {
        self.total_analyses += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.total_analyses as f64;
        self.average_duration_ms =
            (self.average_duration_ms * (n - 1.0) + duration.as_secs_f64() * 1000.0) / n;
    }
}
