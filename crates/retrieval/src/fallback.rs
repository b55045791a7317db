//! Degraded-mode recovery for failed retrievals.
//!
//! Every failure is logged into a rolling one hour record. Whether a failure
//! escalates is decided from that record and from the error's class:
//!
//! ```text
//!   failure ─► record ─► attempt > max_retries? ──yes──► Exhausted
//!                             │ no
//!                             ▼
//!                 ≥3 in 5 min | timeout | connection | rate limit?
//!                   │ no                         │ yes
//!                   ▼                            ▼
//!        RetryAfter(delay × attempt)   strategies in configured order,
//!                                      first success ─► Recovered
//!                                      none ─► Exhausted
//! ```

use crate::config::FallbackConfig;
use crate::error::{Result, RetrievalError};
use async_trait::async_trait;
use orca_protocol::{Query, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

const FAILURE_RETENTION: Duration = Duration::from_secs(3600);
const ESCALATION_WINDOW: Duration = Duration::from_secs(300);
const ESCALATION_FAILURES: usize = 3;
const SIMPLIFIED_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    CacheOnly,
    ReducedContext,
    SimplifiedQuery,
    LocalSearch,
    ErrorOnly,
}

impl FallbackStrategy {
    pub const ALL: [Self; 5] = [
        Self::CacheOnly,
        Self::ReducedContext,
        Self::SimplifiedQuery,
        Self::LocalSearch,
        Self::ErrorOnly,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CacheOnly => "cache_only",
            Self::ReducedContext => "reduced_context",
            Self::SimplifiedQuery => "simplified_query",
            Self::LocalSearch => "local_search",
            Self::ErrorOnly => "error_only",
        }
    }
}

impl std::fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the fallback strategies need from the retriever they protect.
#[async_trait]
pub trait FallbackBackend: Send + Sync {
    /// Any cached answer, without touching upstream
    async fn cached(&self, query: &Query) -> Result<Option<RetrievalResult>>;

    /// Plain retrieval with the query as given, within the budget of the
    /// requesting agent when there is one
    async fn execute(&self, query: &Query, agent_id: Option<&str>) -> Result<RetrievalResult>;

    /// Retrieval from locally held data only
    async fn local_search(&self, query: &Query) -> Result<RetrievalResult>;
}

#[derive(Debug)]
pub enum FallbackOutcome {
    Recovered {
        strategy: FallbackStrategy,
        result: RetrievalResult,
    },
    /// Not worth escalating; retry the original call after this delay
    RetryAfter(Duration),
    /// Nothing left to try for this attempt
    Exhausted,
}

#[derive(Debug, Clone)]
struct FailureRecord {
    at: Instant,
    class: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureStats {
    pub total_failures: usize,
    pub error_types: BTreeMap<String, usize>,
    /// Failures per second over the retention hour
    pub failure_rate: f64,
}

pub struct FallbackManager {
    config: FallbackConfig,
    failures: VecDeque<FailureRecord>,
}

impl FallbackManager {
    pub fn new(config: FallbackConfig) -> Self {
        Self {
            config,
            failures: VecDeque::new(),
        }
    }

    pub const fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// React to a failed attempt (1-based).
    ///
    /// The failure is recorded before any await, so abandoning the returned
    /// future never loses it.
    pub async fn handle_failure(
        &mut self,
        error: &RetrievalError,
        query: &Query,
        agent_id: Option<&str>,
        attempt: u32,
        backend: &dyn FallbackBackend,
    ) -> FallbackOutcome {
        self.record_failure(error);

        if attempt > self.config.max_retries {
            log::warn!("Attempt {attempt} exceeds max retries; no fallback available");
            return FallbackOutcome::Exhausted;
        }

        if !self.should_activate_fallback(error) {
            let delay = self.config.retry_delay().saturating_mul(attempt);
            log::debug!("Transient failure ({error}); retrying in {delay:?}");
            return FallbackOutcome::RetryAfter(delay);
        }

        log::info!("Escalating to fallback strategies after: {error}");
        let strategies = self.config.strategies.clone();
        for strategy in strategies {
            match tokio::time::timeout(
                self.config.timeout(),
                self.run_strategy(strategy, error, query, agent_id, backend),
            )
            .await
            {
                Ok(Ok(Some(result))) => {
                    log::info!("Fallback strategy {strategy} recovered the query");
                    return FallbackOutcome::Recovered { strategy, result };
                }
                Ok(Ok(None)) => log::debug!("Fallback strategy {strategy} had nothing"),
                Ok(Err(err)) => log::warn!("Fallback strategy {strategy} failed: {err}"),
                Err(_) => log::warn!(
                    "Fallback strategy {strategy} timed out after {:?}",
                    self.config.timeout()
                ),
            }
        }

        log::warn!("All fallback strategies exhausted");
        FallbackOutcome::Exhausted
    }

    async fn run_strategy(
        &self,
        strategy: FallbackStrategy,
        error: &RetrievalError,
        query: &Query,
        agent_id: Option<&str>,
        backend: &dyn FallbackBackend,
    ) -> Result<Option<RetrievalResult>> {
        match strategy {
            FallbackStrategy::CacheOnly => backend.cached(query).await,
            FallbackStrategy::ReducedContext => {
                let reduced = query.clone().include_context(false);
                backend.execute(&reduced, agent_id).await.map(Some)
            }
            FallbackStrategy::SimplifiedQuery => {
                backend
                    .execute(&simplify(query), agent_id)
                    .await
                    .map(Some)
            }
            FallbackStrategy::LocalSearch => backend.local_search(query).await.map(Some),
            FallbackStrategy::ErrorOnly => Ok(Some(RetrievalResult::error_only(
                query.clone(),
                error.to_string(),
            ))),
        }
    }

    pub fn record_failure(&mut self, error: &RetrievalError) {
        let now = Instant::now();
        self.failures.push_back(FailureRecord {
            at: now,
            class: error.class_name(),
        });
        while let Some(oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest.at) > FAILURE_RETENTION {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Escalate on repeated failures or on an inherently transient class.
    pub fn should_activate_fallback(&self, error: &RetrievalError) -> bool {
        let now = Instant::now();
        let recent = self
            .failures
            .iter()
            .filter(|f| now.saturating_duration_since(f.at) <= ESCALATION_WINDOW)
            .count();
        recent >= ESCALATION_FAILURES
            || error.is_timeout()
            || error.is_connection()
            || error.is_rate_limit()
    }

    pub fn failure_stats(&self) -> FailureStats {
        let now = Instant::now();
        let mut error_types = BTreeMap::new();
        let mut total = 0;
        for failure in &self.failures {
            if now.saturating_duration_since(failure.at) <= FAILURE_RETENTION {
                total += 1;
                *error_types.entry(failure.class.to_string()).or_insert(0) += 1;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let failure_rate = total as f64 / FAILURE_RETENTION.as_secs_f64();
        FailureStats {
            total_failures: total,
            error_types,
            failure_rate,
        }
    }
}

/// No filters, at most five results, no enrichment
fn simplify(query: &Query) -> Query {
    let mut simplified = query.clone().include_context(false);
    simplified.filters = None;
    simplified.max_results = simplified.max_results.min(SIMPLIFIED_MAX_RESULTS);
    simplified
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_protocol::{Chunk, RetrievalFilter};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedBackend {
        cached: Option<RetrievalResult>,
        execute_fails: bool,
        local_fails: bool,
        local_delay: Duration,
        executed: Mutex<Vec<Query>>,
        agents: Mutex<Vec<Option<String>>>,
    }

    fn hit(query: &Query) -> RetrievalResult {
        RetrievalResult::new(
            query.clone(),
            vec![Chunk::new("a.py".into(), 1, 1, "x = 1".into(), "python".into())],
            vec![0.8],
            Duration::ZERO,
            1,
        )
        .unwrap()
    }

    #[async_trait]
    impl FallbackBackend for ScriptedBackend {
        async fn cached(&self, _query: &Query) -> Result<Option<RetrievalResult>> {
            Ok(self.cached.clone())
        }

        async fn execute(&self, query: &Query, agent_id: Option<&str>) -> Result<RetrievalResult> {
            self.executed.lock().unwrap().push(query.clone());
            self.agents.lock().unwrap().push(agent_id.map(str::to_string));
            if self.execute_fails {
                Err(RetrievalError::Connection("still down".into()))
            } else {
                Ok(hit(query))
            }
        }

        async fn local_search(&self, query: &Query) -> Result<RetrievalResult> {
            tokio::time::sleep(self.local_delay).await;
            if self.local_fails {
                Err(RetrievalError::Other("no local data".into()))
            } else {
                Ok(hit(query))
            }
        }
    }

    fn manager() -> FallbackManager {
        FallbackManager::new(FallbackConfig::default())
    }

    fn generic() -> RetrievalError {
        RetrievalError::Other("boom".into())
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_escalate() {
        let mut manager = manager();
        for _ in 0..3 {
            manager.record_failure(&generic());
        }
        assert!(manager.should_activate_fallback(&generic()));
        manager.record_failure(&generic());
        assert!(manager.should_activate_fallback(&generic()));
    }

    #[tokio::test(start_paused = true)]
    async fn isolated_connection_error_escalates() {
        let mut manager = manager();
        let err = RetrievalError::Connection("reset by peer".into());
        manager.record_failure(&err);
        assert!(manager.should_activate_fallback(&err));
        assert!(!manager.should_activate_fallback(&generic()));
    }

    #[tokio::test(start_paused = true)]
    async fn old_failures_stop_counting() {
        let mut manager = manager();
        manager.record_failure(&generic());
        manager.record_failure(&generic());
        tokio::time::advance(Duration::from_secs(301)).await;
        manager.record_failure(&generic());
        assert!(!manager.should_activate_fallback(&generic()));
    }

    #[tokio::test(start_paused = true)]
    async fn generic_failure_asks_for_delayed_retry() {
        let mut manager = manager();
        let backend = ScriptedBackend::default();
        let outcome = manager
            .handle_failure(&generic(), &Query::new("q"), None, 2, &backend)
            .await;
        assert!(matches!(outcome, FallbackOutcome::RetryAfter(d) if d == Duration::from_secs(2)));
        assert!(backend.executed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn too_many_attempts_exhaust() {
        let mut manager = manager();
        let backend = ScriptedBackend::default();
        let err = RetrievalError::Timeout(Duration::from_secs(1));
        let outcome = manager
            .handle_failure(&err, &Query::new("q"), None, 4, &backend)
            .await;
        assert!(matches!(outcome, FallbackOutcome::Exhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_only_wins_when_cached() {
        let mut manager = manager();
        let query = Query::new("q");
        let backend = ScriptedBackend {
            cached: Some(hit(&query)),
            ..ScriptedBackend::default()
        };
        let err = RetrievalError::Timeout(Duration::from_secs(1));
        match manager.handle_failure(&err, &query, None, 1, &backend).await {
            FallbackOutcome::Recovered { strategy, .. } => {
                assert_eq!(strategy, FallbackStrategy::CacheOnly);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn strategies_run_in_order_until_one_succeeds() {
        let mut manager = manager();
        let backend = ScriptedBackend {
            execute_fails: true,
            ..ScriptedBackend::default()
        };
        let query = Query::new("q")
            .max_results(20)
            .filters(RetrievalFilter::default().languages(["rust"]));
        let err = RetrievalError::Connection("refused".into());

        match manager.handle_failure(&err, &query, None, 1, &backend).await {
            FallbackOutcome::Recovered { strategy, .. } => {
                assert_eq!(strategy, FallbackStrategy::LocalSearch);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let executed = backend.executed.lock().unwrap();
        assert_eq!(executed.len(), 2);
        assert!(!executed[0].include_context);
        assert!(executed[0].filters.is_some());
        assert!(executed[1].filters.is_none());
        assert_eq!(executed[1].max_results, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn error_only_is_the_last_resort() {
        let mut manager = manager();
        let backend = ScriptedBackend {
            execute_fails: true,
            local_fails: true,
            ..ScriptedBackend::default()
        };
        let err = RetrievalError::upstream("Rate limit exceeded: try later");
        match manager
            .handle_failure(&err, &Query::new("q"), None, 1, &backend)
            .await {
            FallbackOutcome::Recovered { strategy, result } => {
                assert_eq!(strategy, FallbackStrategy::ErrorOnly);
                assert!(result.is_empty());
                assert_eq!(result.error(), Some("Rate limit exceeded: try later"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn without_error_only_everything_can_fail() {
        let mut manager = FallbackManager::new(FallbackConfig {
            strategies: vec![FallbackStrategy::CacheOnly, FallbackStrategy::LocalSearch],
            ..FallbackConfig::default()
        });
        let backend = ScriptedBackend {
            local_fails: true,
            ..ScriptedBackend::default()
        };
        let err = RetrievalError::Timeout(Duration::from_secs(3));
        let outcome = manager
            .handle_failure(&err, &Query::new("q"), None, 1, &backend)
            .await;
        assert!(matches!(outcome, FallbackOutcome::Exhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_run_on_behalf_of_the_agent() {
        let mut manager = manager();
        let backend = ScriptedBackend::default();
        let err = RetrievalError::Connection("refused".into());
        let outcome = manager
            .handle_failure(&err, &Query::new("q"), Some("agent-7"), 1, &backend)
            .await;
        assert!(matches!(
            outcome,
            FallbackOutcome::Recovered {
                strategy: FallbackStrategy::ReducedContext,
                ..
            }
        ));
        assert_eq!(
            *backend.agents.lock().unwrap(),
            vec![Some("agent-7".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_strategy_is_skipped_after_timeout() {
        let mut manager = manager();
        let backend = ScriptedBackend {
            execute_fails: true,
            local_delay: Duration::from_secs(60),
            ..ScriptedBackend::default()
        };
        let err = RetrievalError::Timeout(Duration::from_secs(1));
        let started = Instant::now();
        match manager
            .handle_failure(&err, &Query::new("q"), None, 1, &backend)
            .await
        {
            FallbackOutcome::Recovered { strategy, result } => {
                assert_eq!(strategy, FallbackStrategy::ErrorOnly);
                assert!(result.is_empty());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(started.elapsed() >= manager.config().timeout());
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_group_by_class() {
        let mut manager = manager();
        manager.record_failure(&generic());
        manager.record_failure(&RetrievalError::Timeout(Duration::from_secs(1)));
        manager.record_failure(&RetrievalError::Timeout(Duration::from_secs(1)));

        let stats = manager.failure_stats();
        assert_eq!(stats.total_failures, 3);
        assert_eq!(stats.error_types["Timeout"], 2);
        assert!((stats.failure_rate - 3.0 / 3600.0).abs() < 1e-12);

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert_eq!(manager.failure_stats().total_failures, 0);
    }
}
