use orca_protocol::{unix_ms_now, Query};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const THOROUGH_COMPLEXITY: f64 = 0.8;
pub const BALANCED_COMPLEXITY: f64 = 0.4;
pub const THOROUGH_WINDOW: usize = 1_000_000;
pub const BALANCED_WINDOW: usize = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTier {
    Quick,
    Balanced,
    Thorough,
}

impl StrategyTier {
    pub const ALL: [Self; 3] = [Self::Quick, Self::Balanced, Self::Thorough];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Balanced => "balanced",
            Self::Thorough => "thorough",
        }
    }

    /// Pick a tier from query complexity and the caller's allotted window.
    pub fn select(complexity: f64, window_size: Option<usize>) -> Self {
        let window = window_size.unwrap_or(0);
        if complexity > THOROUGH_COMPLEXITY || window > THOROUGH_WINDOW {
            Self::Thorough
        } else if complexity > BALANCED_COMPLEXITY || window > BALANCED_WINDOW {
            Self::Balanced
        } else {
            Self::Quick
        }
    }
}

impl std::fmt::Display for StrategyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed parameter bundle for one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub tier: StrategyTier,
    pub similarity_threshold: f32,
    pub max_results: usize,
    /// Candidates fetched before thresholding and re-ranking
    pub rerank_depth: usize,
    pub use_metadata: bool,
}

impl SearchParams {
    pub const fn quick() -> Self {
        Self {
            tier: StrategyTier::Quick,
            similarity_threshold: 0.7,
            max_results: 5,
            rerank_depth: 10,
            use_metadata: false,
        }
    }

    pub const fn balanced() -> Self {
        Self {
            tier: StrategyTier::Balanced,
            similarity_threshold: 0.6,
            max_results: 10,
            rerank_depth: 20,
            use_metadata: true,
        }
    }

    pub const fn thorough() -> Self {
        Self {
            tier: StrategyTier::Thorough,
            similarity_threshold: 0.5,
            max_results: 20,
            rerank_depth: 40,
            use_metadata: true,
        }
    }

    pub const fn for_tier(tier: StrategyTier) -> Self {
        match tier {
            StrategyTier::Quick => Self::quick(),
            StrategyTier::Balanced => Self::balanced(),
            StrategyTier::Thorough => Self::thorough(),
        }
    }

    /// Results returned for `query`: the tighter of the two caps
    pub fn result_limit(&self, query: &Query) -> usize {
        self.max_results.min(query.max_results)
    }
}

const WORD_WEIGHT: f64 = 0.3;
const FILTER_WEIGHT: f64 = 0.2;
const PHRASE_WEIGHT: f64 = 0.1;
const CODE_CONTEXT_WEIGHT: f64 = 0.2;
const METADATA_WEIGHT: f64 = 0.2;

const WORDS_AT_FULL: f64 = 20.0;
const FILTERS_AT_FULL: f64 = 4.0;
const QUOTES_AT_FULL: f64 = 4.0;

/// Query complexity in `[0, 1]`: a weighted mean of word count, active
/// filter constraints, quote marks, attached code context and attached
/// context metadata, each normalised to `[0, 1]` first.
#[allow(clippy::cast_precision_loss)]
pub fn estimate_query_complexity(query: &Query) -> f64 {
    let words = (query.text.split_whitespace().count() as f64 / WORDS_AT_FULL).min(1.0);
    let filters = query
        .filters
        .as_ref()
        .map_or(0.0, |f| (f.active_constraints() as f64 / FILTERS_AT_FULL).min(1.0));
    let quotes = (query.text.matches('"').count() as f64 / QUOTES_AT_FULL).min(1.0);
    let code = if query.context.is_some() { 1.0 } else { 0.0 };
    let metadata = if query.context.as_ref().is_some_and(|c| !c.metadata.is_empty()) {
        1.0
    } else {
        0.0
    };

    let weighted = words * WORD_WEIGHT
        + filters * FILTER_WEIGHT
        + quotes * PHRASE_WEIGHT
        + code * CODE_CONTEXT_WEIGHT
        + metadata * METADATA_WEIGHT;
    let total = WORD_WEIGHT + FILTER_WEIGHT + PHRASE_WEIGHT + CODE_CONTEXT_WEIGHT + METADATA_WEIGHT;
    (weighted / total).clamp(0.0, 1.0)
}

/// Rolling counters attributed to one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPerformance {
    pub total_queries: u64,
    pub successful_queries: u64,
    /// Mean over successful calls only
    pub avg_latency_ms: f64,
    pub last_updated_unix_ms: u64,
}

impl QueryPerformance {
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, success: bool, latency: Duration) {
        self.total_queries += 1;
        if success {
            self.successful_queries += 1;
            let n = self.successful_queries as f64;
            let latency_ms = latency.as_secs_f64() * 1000.0;
            self.avg_latency_ms = self.avg_latency_ms.mul_add(n - 1.0, latency_ms) / n;
        }
        self.last_updated_unix_ms = unix_ms_now();
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_queries == 0 {
            return 0.0;
        }
        self.successful_queries as f64 / self.total_queries as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_protocol::{CodeContext, RetrievalFilter};
    use pretty_assertions::assert_eq;

    #[test]
    fn short_plain_query_is_quick() {
        let query = Query::new("parse config").max_results(5);
        let complexity = estimate_query_complexity(&query);
        assert!(complexity < BALANCED_COMPLEXITY);
        assert_eq!(StrategyTier::select(complexity, None), StrategyTier::Quick);
    }

    #[test]
    fn context_and_filters_raise_complexity() {
        let query = Query::new("where is \"session token\" validated before refresh")
            .filters(RetrievalFilter::default().languages(["python"]).file_patterns(["auth/*"]))
            .context(
                CodeContext::new("def refresh(token): ...", "python")
                    .metadata_entry("module", serde_json::json!("auth")),
            );
        let complexity = estimate_query_complexity(&query);
        assert!(complexity > BALANCED_COMPLEXITY, "complexity {complexity}");
        assert!(complexity <= 1.0);
        assert_eq!(StrategyTier::select(complexity, None), StrategyTier::Balanced);
    }

    #[test]
    fn large_window_forces_tiers() {
        assert_eq!(StrategyTier::select(0.0, Some(1_500_000)), StrategyTier::Thorough);
        assert_eq!(StrategyTier::select(0.0, Some(600_000)), StrategyTier::Balanced);
        assert_eq!(StrategyTier::select(0.0, Some(500_000)), StrategyTier::Quick);
        assert_eq!(StrategyTier::select(0.81, None), StrategyTier::Thorough);
    }

    #[test]
    fn result_limit_takes_tighter_cap() {
        let query = Query::new("q").max_results(3);
        assert_eq!(SearchParams::balanced().result_limit(&query), 3);
        assert_eq!(SearchParams::quick().result_limit(&Query::new("q")), 5);
    }

    #[test]
    fn performance_averages_successful_latency() {
        let mut perf = QueryPerformance::default();
        perf.record(true, Duration::from_millis(100));
        perf.record(false, Duration::ZERO);
        perf.record(true, Duration::from_millis(300));
        assert_eq!(perf.total_queries, 3);
        assert!((perf.avg_latency_ms - 200.0).abs() < 1e-9);
        assert!((perf.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
