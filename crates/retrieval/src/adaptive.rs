//! Strategy-selecting front of the retrieval core.
//!
//! ```text
//!  retrieve(query, agent)
//!     │
//!     ├─ SELECT_STRATEGY   complexity + coordinator window ─► quick | balanced | thorough
//!     ├─ cache lookup      hit ─► return (no upstream call)
//!     ├─ rate limiter      denied ─► Err(RateLimited { wait })
//!     ├─ ENHANCE_QUERY     learned patterns with success rate > 0.7
//!     ├─ EXECUTE           base Retriever
//!     │     ├─ ok  ─► RECORD_METRICS, cache, context window, LEARN_PATTERNS
//!     │     └─ err ─► RECORD_METRICS(failure), LEARN_PATTERNS(failure), propagate
//!     └─ share per-tier performance with the coordinator
//! ```
//!
//! All mutable state sits behind one synchronous mutex that is never held
//! across an await, so a caller abandoning the future cannot leave the
//! cache, limiter or window half-updated.

use crate::cache::{CacheStats, ResultCache};
use crate::config::RetrievalConfig;
use crate::context::{ContextManager, ContextUsage};
use crate::error::{Result, RetrievalError};
use crate::fallback::FallbackBackend;
use crate::metrics::{
    MetricsTracker, PerformanceSummary, ResponseValidator, SummaryWindow, ValidationReport,
};
use crate::rate_limit::RateLimiter;
use crate::retriever::Retriever;
use crate::strategy::{estimate_query_complexity, QueryPerformance, SearchParams, StrategyTier};
use async_trait::async_trait;
use orca_coordinator::AgentCoordinator;
use orca_protocol::{unix_ms_now, Query, RetrievalFilter, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const KNOWLEDGE_KEY: &str = "retriever";
const PATTERN_SUCCESS_THRESHOLD: f64 = 0.7;
const PATTERN_EXAMPLES: usize = 5;
const RELATED_FILES_ADDED: usize = 5;
const RELATED_FILES_REMEMBERED: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    FilterEnhancement,
    ContextEnhancement,
}

/// What has been learned about one kind of query shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPattern {
    pub kind: PatternKind,
    pub frequency: u64,
    pub success_rate: f64,
    pub last_seen_unix_ms: u64,
    pub examples: Vec<String>,
}

impl QueryPattern {
    fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            frequency: 0,
            success_rate: 0.0,
            last_seen_unix_ms: 0,
            examples: Vec::new(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe(&mut self, success: bool, example: Option<String>) {
        self.frequency += 1;
        let n = self.frequency as f64;
        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate = self.success_rate.mul_add(n - 1.0, outcome) / n;
        self.last_seen_unix_ms = unix_ms_now();
        if let Some(example) = example {
            if self.examples.len() < PATTERN_EXAMPLES {
                self.examples.push(example);
            }
        }
    }

    fn is_trusted(&self) -> bool {
        self.success_rate > PATTERN_SUCCESS_THRESHOLD
    }
}

struct RetrieverState {
    cache: ResultCache,
    limiter: RateLimiter,
    context: ContextManager,
    metrics: MetricsTracker,
    performance: BTreeMap<StrategyTier, QueryPerformance>,
    patterns: BTreeMap<PatternKind, QueryPattern>,
    related_files: VecDeque<String>,
}

impl RetrieverState {
    fn learn(&mut self, query: &Query, result: Option<&RetrievalResult>) {
        let success = result.is_some();
        if let Some(filters) = &query.filters {
            let example = serde_json::to_string(filters).ok();
            self.patterns
                .entry(PatternKind::FilterEnhancement)
                .or_insert_with(|| QueryPattern::new(PatternKind::FilterEnhancement))
                .observe(success, example);
        }
        if let Some(context) = &query.context {
            let example = context.file_path.clone();
            self.patterns
                .entry(PatternKind::ContextEnhancement)
                .or_insert_with(|| QueryPattern::new(PatternKind::ContextEnhancement))
                .observe(success, example);

            for chunk in result.map(RetrievalResult::chunks).unwrap_or_default() {
                if !self.related_files.contains(&chunk.file_path) {
                    self.related_files.push_front(chunk.file_path.clone());
                }
            }
            self.related_files.truncate(RELATED_FILES_REMEMBERED);
        }
    }

    fn trusted(&self, kind: PatternKind) -> bool {
        self.patterns.get(&kind).is_some_and(QueryPattern::is_trusted)
    }

    /// Copy of `query` with trusted learned patterns applied
    fn enhance(&self, query: &Query) -> Query {
        let mut enhanced = query.clone();

        if self.trusted(PatternKind::FilterEnhancement) {
            if let Some(language) = query.context.as_ref().map(|c| c.language.clone()) {
                let filters = enhanced.filters.get_or_insert_with(RetrievalFilter::default);
                if filters.languages.is_empty() && !language.is_empty() {
                    log::debug!("Filter enhancement: restricting to {language}");
                    filters.languages.push(language);
                }
            }
        }

        if self.trusted(PatternKind::ContextEnhancement) {
            if let Some(context) = enhanced.context.as_mut() {
                let own = context.file_path.clone();
                let additions: Vec<String> = self
                    .related_files
                    .iter()
                    .filter(|f| Some(*f) != own.as_ref() && !context.related_files.contains(f))
                    .take(RELATED_FILES_ADDED)
                    .cloned()
                    .collect();
                if !additions.is_empty() {
                    log::debug!("Context enhancement: {} related files", additions.len());
                    context.related_files.extend(additions);
                }
            }
        }

        enhanced
    }

    fn performance_snapshot(&self) -> serde_json::Value {
        let tiers: serde_json::Map<String, serde_json::Value> = self
            .performance
            .iter()
            .map(|(tier, perf)| {
                (
                    tier.as_str().to_string(),
                    serde_json::json!({
                        "success_rate": perf.success_rate(),
                        "avg_latency_ms": perf.avg_latency_ms,
                        "total_queries": perf.total_queries,
                        "last_updated_unix_ms": perf.last_updated_unix_ms,
                    }),
                )
            })
            .collect();
        serde_json::json!({ "performance": tiers })
    }
}

/// Adaptive wrapper around a base [`Retriever`]. Owns its cache, rate
/// limiter, context window, metrics and per-tier performance records.
pub struct AdaptiveRetriever {
    base: Arc<dyn Retriever>,
    coordinator: Option<Arc<AgentCoordinator>>,
    validator: ResponseValidator,
    state: Mutex<RetrieverState>,
}

impl AdaptiveRetriever {
    pub fn new(config: &RetrievalConfig, base: Arc<dyn Retriever>) -> Self {
        let performance = StrategyTier::ALL
            .into_iter()
            .map(|tier| (tier, QueryPerformance::default()))
            .collect();
        Self {
            base,
            coordinator: None,
            validator: ResponseValidator::default(),
            state: Mutex::new(RetrieverState {
                cache: ResultCache::new(&config.cache),
                limiter: RateLimiter::new(&config.rate_limit),
                context: ContextManager::from_config(&config.context),
                metrics: MetricsTracker::new(config.metrics.history_limit),
                performance,
                patterns: BTreeMap::new(),
                related_files: VecDeque::new(),
            }),
        }
    }

    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<AgentCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    fn state(&self) -> MutexGuard<'_, RetrieverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tier for `query`, consulting the coordinator for the agent's window.
    pub async fn select_strategy(&self, query: &Query, agent_id: Option<&str>) -> SearchParams {
        let window = match (&self.coordinator, agent_id) {
            (Some(coordinator), Some(agent)) => coordinator
                .agent_context(agent)
                .await
                .map(|ctx| ctx.window_size),
            _ => None,
        };
        let complexity = estimate_query_complexity(query);
        let tier = StrategyTier::select(complexity, window);
        log::debug!(
            "Selected {tier} strategy (complexity {complexity:.2}, window {window:?})"
        );
        SearchParams::for_tier(tier)
    }

    pub async fn retrieve(&self, query: &Query, agent_id: Option<&str>) -> Result<RetrievalResult> {
        query.validate()?;
        let params = self.select_strategy(query, agent_id).await;

        let cached = {
            let mut state = self.state();
            let cached = state.cache.get(query);
            if let Some(result) = &cached {
                state.metrics.record(result, true);
            }
            cached
        };
        if let Some(coordinator) = &self.coordinator {
            coordinator.record_cache_lookup(cached.is_some()).await;
        }
        if let Some(result) = cached {
            return Ok(result);
        }

        let (admission, enhanced) = {
            let mut state = self.state();
            let admission = state.limiter.acquire();
            if !admission.granted {
                state.metrics.record_failure(query, Duration::ZERO);
            }
            (admission, state.enhance(query))
        };
        if !admission.granted {
            return Err(RetrievalError::RateLimited {
                wait: admission.wait,
            });
        }

        let started = Instant::now();
        let outcome = self.base.retrieve(&enhanced, &params).await;
        let latency = started.elapsed();

        let snapshot = {
            let mut state = self.state();
            match &outcome {
                Ok(result) => {
                    if let Some(perf) = state.performance.get_mut(&params.tier) {
                        perf.record(true, latency);
                    }
                    state.metrics.record(result, false);
                    state.cache.put(query, result.clone());
                    state.context.add_result(result.clone());
                    state.learn(query, Some(result));
                }
                Err(err) => {
                    log::warn!("{} retrieval failed: {err}", params.tier);
                    if let Some(perf) = state.performance.get_mut(&params.tier) {
                        perf.record(false, Duration::ZERO);
                    }
                    state.metrics.record_failure(query, latency);
                    state.learn(query, None);
                }
            }
            state.performance_snapshot()
        };

        if let Some(coordinator) = &self.coordinator {
            coordinator.share_knowledge(KNOWLEDGE_KEY, snapshot).await;
        }
        outcome
    }

    /// Drop everything accumulated in the context window
    pub fn clear_session(&self) {
        self.state().context.clear();
    }

    pub fn validate(&self, result: &RetrievalResult) -> ValidationReport {
        self.validator.validate_result(result)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state().cache.stats()
    }

    pub fn context_usage(&self) -> ContextUsage {
        self.state().context.usage()
    }

    pub fn performance(&self) -> BTreeMap<StrategyTier, QueryPerformance> {
        self.state().performance.clone()
    }

    pub fn patterns(&self) -> Vec<QueryPattern> {
        self.state().patterns.values().cloned().collect()
    }

    pub fn performance_summary(&self, window: SummaryWindow) -> PerformanceSummary {
        self.state().metrics.get_performance_summary(window)
    }

    pub fn check_system_health(&self) -> ValidationReport {
        self.state().metrics.check_system_health()
    }
}

#[async_trait]
impl FallbackBackend for AdaptiveRetriever {
    async fn cached(&self, query: &Query) -> Result<Option<RetrievalResult>> {
        Ok(self.state().cache.lookup(query))
    }

    async fn execute(&self, query: &Query, agent_id: Option<&str>) -> Result<RetrievalResult> {
        let params = self.select_strategy(query, agent_id).await;
        let admission = self.state().limiter.acquire();
        if !admission.granted {
            return Err(RetrievalError::RateLimited {
                wait: admission.wait,
            });
        }
        self.base.retrieve(query, &params).await
    }

    async fn local_search(&self, query: &Query) -> Result<RetrievalResult> {
        self.base.local_search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use orca_protocol::{Chunk, CodeContext};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and returns one chunk per related file it was asked about
    #[derive(Default)]
    struct CountingRetriever {
        calls: AtomicUsize,
        fail: bool,
        first_call_delay: Duration,
        seen: Mutex<Vec<(Query, SearchParams)>>,
    }

    #[async_trait]
    impl Retriever for CountingRetriever {
        async fn retrieve(&self, query: &Query, params: &SearchParams) -> Result<RetrievalResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((query.clone(), *params));
            if call == 0 {
                tokio::time::sleep(self.first_call_delay).await;
            }
            if self.fail {
                return Err(RetrievalError::Connection("down".into()));
            }
            Ok(RetrievalResult::new(
                query.clone(),
                vec![Chunk::new(
                    "src/config.py".into(),
                    1,
                    4,
                    "def parse_config(path): ...".into(),
                    "python".into(),
                )],
                vec![0.9],
                Duration::from_millis(3),
                12,
            )?)
        }
    }

    fn adaptive(base: Arc<CountingRetriever>) -> AdaptiveRetriever {
        AdaptiveRetriever::new(&RetrievalConfig::default(), base)
    }

    #[tokio::test(start_paused = true)]
    async fn quick_strategy_then_cache_hit() {
        let base = Arc::new(CountingRetriever::default());
        let retriever = adaptive(base.clone());
        let query = Query::new("parse config").max_results(5);

        let first = retriever.retrieve(&query, None).await.unwrap();
        assert_eq!(base.calls.load(Ordering::SeqCst), 1);
        assert_eq!(base.seen.lock().unwrap()[0].1.tier, StrategyTier::Quick);

        let second = retriever.retrieve(&query, None).await.unwrap();
        assert_eq!(base.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);

        let stats = retriever.cache_stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(retriever.performance()[&StrategyTier::Quick].total_queries, 1);
        assert_eq!(retriever.context_usage().entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_window_selects_thorough() {
        let coordinator = Arc::new(AgentCoordinator::new(orca_coordinator::CoordinatorConfig {
            default_agent_window: 1_200_000,
            ..orca_coordinator::CoordinatorConfig::default()
        }));
        coordinator.register_agent("security").await;

        let base = Arc::new(CountingRetriever::default());
        let retriever = adaptive(base.clone()).with_coordinator(coordinator.clone());
        retriever
            .retrieve(&Query::new("parse config"), Some("security"))
            .await
            .unwrap();
        assert_eq!(base.seen.lock().unwrap()[0].1.tier, StrategyTier::Thorough);

        let shared = coordinator.knowledge(KNOWLEDGE_KEY).await.unwrap();
        assert_eq!(shared["performance"]["thorough"]["total_queries"], 1);
        assert_eq!(coordinator.system_metrics().await.cache_misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_recorded_and_propagated() {
        let base = Arc::new(CountingRetriever {
            fail: true,
            ..CountingRetriever::default()
        });
        let retriever = adaptive(base);
        let err = retriever
            .retrieve(&Query::new("parse config"), None)
            .await
            .unwrap_err();
        assert!(err.is_connection());

        let perf = &retriever.performance()[&StrategyTier::Quick];
        assert_eq!((perf.total_queries, perf.successful_queries), (1, 0));
        assert_eq!(retriever.performance_summary(SummaryWindow::All).failed_queries, 1);
        assert_eq!(retriever.cache_stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_denial_is_a_rate_limit_error() {
        let config = RetrievalConfig {
            rate_limit: RateLimitConfig {
                requests_per_minute: 60,
                burst_limit: 1,
                cooldown_seconds: 2.0,
            },
            ..RetrievalConfig::default()
        };
        let base = Arc::new(CountingRetriever::default());
        let retriever = AdaptiveRetriever::new(&config, base.clone());

        retriever.retrieve(&Query::new("one"), None).await.unwrap();
        let err = retriever.retrieve(&Query::new("two"), None).await.unwrap_err();
        assert!(err.is_rate_limit());
        assert!(matches!(err, RetrievalError::RateLimited { wait } if wait == Duration::from_secs(2)));
        assert_eq!(base.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_query_fails_before_any_call() {
        let base = Arc::new(CountingRetriever::default());
        let retriever = adaptive(base.clone());
        let err = retriever.retrieve(&Query::new("  "), None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Protocol(_)));
        assert_eq!(base.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn learned_patterns_enhance_later_queries() {
        let base = Arc::new(CountingRetriever::default());
        let retriever = adaptive(base.clone());

        let filtered = Query::new("parse config").filters(RetrievalFilter::default().chunk_types(["function"]));
        retriever.retrieve(&filtered, None).await.unwrap();
        let with_context =
            Query::new("who loads settings").context(CodeContext::new("load()", "python"));
        retriever.retrieve(&with_context, None).await.unwrap();

        let patterns = retriever.patterns();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.iter().all(|p| p.success_rate > 0.7));

        let later = Query::new("where are settings validated")
            .context(CodeContext::new("validate()", "rust").file_path("src/settings.rs"));
        retriever.retrieve(&later, None).await.unwrap();

        let seen = base.seen.lock().unwrap();
        let (sent, _) = seen.last().unwrap();
        assert_eq!(sent.filters.as_ref().unwrap().languages, vec!["rust"]);
        assert_eq!(
            sent.context.as_ref().unwrap().related_files,
            vec!["src/config.py"]
        );
        // the caller's query is left untouched
        assert!(later.filters.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_call_leaves_state_consistent() {
        let config = RetrievalConfig {
            rate_limit: RateLimitConfig {
                requests_per_minute: 60,
                burst_limit: 1,
                cooldown_seconds: 2.0,
            },
            ..RetrievalConfig::default()
        };
        let base = Arc::new(CountingRetriever {
            first_call_delay: Duration::from_secs(10),
            ..CountingRetriever::default()
        });
        let retriever = AdaptiveRetriever::new(&config, base.clone());
        let query = Query::new("parse config");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), retriever.retrieve(&query, None)).await;
        assert!(abandoned.is_err());
        assert_eq!(base.calls.load(Ordering::SeqCst), 1);

        // Nothing half-written by the abandoned call
        assert_eq!(retriever.cache_stats().size, 0);
        assert_eq!(retriever.context_usage().entries, 0);
        assert_eq!(retriever.performance()[&StrategyTier::Quick].total_queries, 0);
        assert!(retriever.patterns().is_empty());

        // Its admission was spent exactly once
        let err = retriever.retrieve(&query, None).await.unwrap_err();
        assert!(err.is_rate_limit());
        assert_eq!(base.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let result = retriever.retrieve(&query, None).await.unwrap();
        assert!(!result.is_empty());
        assert_eq!(base.calls.load(Ordering::SeqCst), 2);
        assert_eq!(retriever.cache_stats().size, 1);
        assert_eq!(retriever.context_usage().entries, 1);
        assert_eq!(retriever.performance()[&StrategyTier::Quick].total_queries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_cache_lookup_is_not_counted() {
        let base = Arc::new(CountingRetriever::default());
        let retriever = adaptive(base);
        let query = Query::new("parse config");
        let stored = retriever.retrieve(&query, None).await.unwrap();
        let before = retriever.cache_stats();

        let backend: &dyn FallbackBackend = &retriever;
        assert_eq!(backend.cached(&query).await.unwrap(), Some(stored));
        assert!(backend.cached(&Query::new("Parse config")).await.unwrap().is_none());

        let after = retriever.cache_stats();
        assert_eq!((after.hits, after.misses), (before.hits, before.misses));
        assert_eq!((after.hits, after.misses), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_execute_uses_agent_window() {
        let coordinator = Arc::new(AgentCoordinator::new(orca_coordinator::CoordinatorConfig {
            default_agent_window: 1_200_000,
            ..orca_coordinator::CoordinatorConfig::default()
        }));
        coordinator.register_agent("security").await;

        let base = Arc::new(CountingRetriever::default());
        let retriever = adaptive(base.clone()).with_coordinator(coordinator);
        let backend: &dyn FallbackBackend = &retriever;
        let query = Query::new("parse config");

        backend.execute(&query, Some("security")).await.unwrap();
        backend.execute(&query, None).await.unwrap();

        let seen = base.seen.lock().unwrap();
        assert_eq!(seen[0].1.tier, StrategyTier::Thorough);
        assert_eq!(seen[1].1.tier, StrategyTier::Quick);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_session_empties_window() {
        let base = Arc::new(CountingRetriever::default());
        let retriever = adaptive(base);
        retriever.retrieve(&Query::new("parse config"), None).await.unwrap();
        assert_eq!(retriever.context_usage().entries, 1);
        retriever.clear_session();
        assert_eq!(retriever.context_usage().current_tokens, 0);
    }
}
