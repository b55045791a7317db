use crate::config::CoordinatorConfig;
use crate::knowledge::merge_knowledge;
use crate::metrics::{AgentMetrics, ResourceAllocation, SystemMetrics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// What a requesting agent is allowed to spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub agent_id: String,
    pub window_size: usize,
    pub cpu_share: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone)]
struct AgentRecord {
    metrics: AgentMetrics,
    allocation: ResourceAllocation,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    agents: BTreeMap<String, AgentRecord>,
    knowledge: BTreeMap<String, Value>,
    system: SystemMetrics,
}

/// Tracks per-agent performance, divides the shared budget, and holds the
/// process-wide knowledge map. Shared as `Arc<AgentCoordinator>`.
pub struct AgentCoordinator {
    config: CoordinatorConfig,
    state: RwLock<CoordinatorState>,
}

impl AgentCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CoordinatorState::default()),
        }
    }

    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Register an agent with the default window; CPU shares are evened out
    /// across everyone registered. Registering twice is a no-op.
    pub async fn register_agent(&self, agent_id: &str) {
        let mut state = self.state.write().await;
        self.register_locked(&mut state, agent_id);
    }

    fn register_locked(&self, state: &mut CoordinatorState, agent_id: &str) {
        if state.agents.contains_key(agent_id) {
            return;
        }
        state.agents.insert(
            agent_id.to_string(),
            AgentRecord {
                metrics: AgentMetrics::default(),
                allocation: ResourceAllocation {
                    cpu_share: 0.0,
                    context_window: self.config.default_agent_window,
                },
            },
        );
        #[allow(clippy::cast_precision_loss)]
        let even = 1.0 / state.agents.len() as f64;
        for record in state.agents.values_mut() {
            record.allocation.cpu_share = even;
        }
        log::debug!("Registered agent {agent_id} ({} total)", state.agents.len());
    }

    pub async fn agent_context(&self, agent_id: &str) -> Option<AgentContext> {
        let state = self.state.read().await;
        state.agents.get(agent_id).map(|record| AgentContext {
            agent_id: agent_id.to_string(),
            window_size: record.allocation.context_window,
            cpu_share: record.allocation.cpu_share,
            success_rate: record.metrics.success_rate,
        })
    }

    /// Attribute one operation to an agent, registering it on first sight.
    pub async fn record_operation(
        &self,
        agent_id: &str,
        success: bool,
        latency: Duration,
        token_usage: &BTreeMap<String, u64>,
    ) {
        let mut state = self.state.write().await;
        self.register_locked(&mut state, agent_id);
        if let Some(record) = state.agents.get_mut(agent_id) {
            record.metrics.record(success, latency, token_usage);
        }
    }

    pub async fn metrics(&self, agent_id: &str) -> Option<AgentMetrics> {
        self.state
            .read()
            .await
            .agents
            .get(agent_id)
            .map(|r| r.metrics.clone())
    }

    /// Re-divide CPU share and context window by observed success.
    ///
    /// Weight is `min + (1 - min) * success_rate`, or 1 for agents with no
    /// operations yet. Shares sum to 1 and windows never exceed the total.
    pub async fn redistribute_resources(&self) -> BTreeMap<String, ResourceAllocation> {
        let mut state = self.state.write().await;
        let min = self.config.min_share_weight;

        let weights: Vec<(String, f64)> = state
            .agents
            .iter()
            .map(|(id, record)| {
                let weight = if record.metrics.total_operations == 0 {
                    1.0
                } else {
                    (1.0 - min).mul_add(record.metrics.success_rate, min)
                };
                (id.clone(), weight)
            })
            .collect();
        let total_weight: f64 = weights.iter().map(|(_, w)| w).sum();

        let mut allocations = BTreeMap::new();
        if total_weight <= 0.0 {
            return allocations;
        }

        for (id, weight) in weights {
            let share = weight / total_weight;
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            let window = (self.config.total_context_window as f64 * share).floor() as usize;
            let allocation = ResourceAllocation {
                cpu_share: share,
                context_window: window,
            };
            if let Some(record) = state.agents.get_mut(&id) {
                record.allocation = allocation;
            }
            allocations.insert(id, allocation);
        }

        log::info!("Redistributed resources across {} agents", allocations.len());
        allocations
    }

    /// Merge `value` into the shared knowledge stored under `key`.
    pub async fn share_knowledge(&self, key: &str, value: Value) {
        let mut state = self.state.write().await;
        match state.knowledge.get_mut(key) {
            Some(existing) => merge_knowledge(existing, value),
            None => {
                state.knowledge.insert(key.to_string(), value);
            }
        }
    }

    pub async fn knowledge(&self, key: &str) -> Option<Value> {
        self.state.read().await.knowledge.get(key).cloned()
    }

    pub async fn knowledge_snapshot(&self) -> BTreeMap<String, Value> {
        self.state.read().await.knowledge.clone()
    }

    pub async fn record_analysis(&self, duration: Duration) {
        self.state.write().await.system.record_analysis(duration);
    }

    pub async fn record_cache_lookup(&self, hit: bool) {
        let mut state = self.state.write().await;
        if hit {
            state.system.cache_hits += 1;
        } else {
            state.system.cache_misses += 1;
        }
    }

    pub async fn system_metrics(&self) -> SystemMetrics {
        self.state.read().await.system.clone()
    }
}

impl Default for AgentCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn no_tokens() -> BTreeMap<String, u64> {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn unknown_agent_has_no_context() {
        let coordinator = AgentCoordinator::default();
        assert!(coordinator.agent_context("ghost").await.is_none());
    }

    #[tokio::test]
    async fn registration_splits_cpu_evenly() {
        let coordinator = AgentCoordinator::default();
        coordinator.register_agent("a").await;
        coordinator.register_agent("b").await;
        coordinator.register_agent("b").await;

        let a = coordinator.agent_context("a").await.unwrap();
        assert_eq!(a.window_size, 500_000);
        assert!((a.cpu_share - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn redistribution_favours_successful_agents() {
        let coordinator = AgentCoordinator::default();
        for _ in 0..4 {
            coordinator
                .record_operation("good", true, Duration::from_millis(5), &no_tokens())
                .await;
            coordinator
                .record_operation("bad", false, Duration::from_millis(5), &no_tokens())
                .await;
        }
        coordinator.register_agent("fresh").await;

        let allocations = coordinator.redistribute_resources().await;
        let good = allocations["good"];
        let bad = allocations["bad"];
        let fresh = allocations["fresh"];

        // weights: good 1.0, bad 0.1, fresh 1.0
        assert!((good.cpu_share - 1.0 / 2.1).abs() < 1e-9);
        assert!((bad.cpu_share - 0.1 / 2.1).abs() < 1e-9);
        assert!(good.context_window > bad.context_window);
        assert_eq!(good.context_window, fresh.context_window);

        let ctx = coordinator.agent_context("bad").await.unwrap();
        assert_eq!(ctx.window_size, bad.context_window);
        assert_eq!(ctx.success_rate, 0.0);
    }

    #[tokio::test]
    async fn knowledge_merges_across_agents() {
        let coordinator = Arc::new(AgentCoordinator::default());
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            tasks.spawn(async move {
                coordinator.share_knowledge("findings", json!([i])).await;
                coordinator
                    .share_knowledge("by_agent", json!({ format!("agent-{i}"): i }))
                    .await;
            });
        }
        while tasks.join_next().await.is_some() {}

        let findings = coordinator.knowledge("findings").await.unwrap();
        assert_eq!(findings.as_array().unwrap().len(), 8);
        let by_agent = coordinator.knowledge("by_agent").await.unwrap();
        assert_eq!(by_agent.as_object().unwrap().len(), 8);

        let snapshot = coordinator.knowledge_snapshot().await;
        assert_eq!(
            snapshot.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["by_agent", "findings"]
        );
    }

    #[tokio::test]
    async fn system_metrics_track_cache_and_analyses() {
        let coordinator = AgentCoordinator::default();
        coordinator.record_cache_lookup(true).await;
        coordinator.record_cache_lookup(false).await;
        coordinator.record_analysis(Duration::from_millis(40)).await;
        let system = coordinator.system_metrics().await;
        assert_eq!((system.cache_hits, system.cache_misses), (1, 1));
        assert_eq!(system.total_analyses, 1);
    }

    proptest! {
        #[test]
        fn shares_sum_to_one_and_windows_fit(outcomes in proptest::collection::vec(
            proptest::collection::vec(any::<bool>(), 0..6), 1..6)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let coordinator = AgentCoordinator::default();
                for (i, ops) in outcomes.iter().enumerate() {
                    let id = format!("agent-{i}");
                    coordinator.register_agent(&id).await;
                    for ok in ops {
                        coordinator.record_operation(&id, *ok, Duration::ZERO, &BTreeMap::new()).await;
                    }
                }
                let allocations = coordinator.redistribute_resources().await;
                let share: f64 = allocations.values().map(|a| a.cpu_share).sum();
                let window: usize = allocations.values().map(|a| a.context_window).sum();
                assert!((share - 1.0).abs() < 1e-9);
                assert!(window <= coordinator.config().total_context_window);
            });
        }
    }
}
