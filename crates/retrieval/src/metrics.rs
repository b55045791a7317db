use orca_protocol::{unix_ms_now, Query, QueryKind, RetrievalResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

pub const HEALTHY_PRECISION: f64 = 0.7;
pub const HEALTHY_RECALL: f64 = 0.5;
pub const HEALTHY_LATENCY_MS: f64 = 1000.0;
const ERROR_STATUS_RATE: f64 = 0.5;
const HEALTH_SAMPLE: usize = 100;
const F1_FLOOR: f64 = 0.01;

/// Quality of one retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub latency_ms: f64,
    /// Returned chunks over requested results
    pub token_utilization: f64,
    pub query_kind: QueryKind,
    pub cached: bool,
    pub failed: bool,
    pub timestamp_unix_ms: u64,
}

impl RetrievalMetrics {
    /// Deterministic scores for `result` against its own query.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_result(result: &RetrievalResult) -> Self {
        let query = result.query();
        let scores = result.similarity_scores();

        let (precision, recall, f1) = if scores.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let relevant = scores
                .iter()
                .filter(|s| **s >= query.min_similarity)
                .count();
            let precision = relevant as f64 / scores.len() as f64;
            let recall = scores.len() as f64 / result.total_chunks_searched().max(1) as f64;
            let p = precision.max(F1_FLOOR);
            let r = recall.max(F1_FLOOR);
            (precision, recall, 2.0 * p * r / (p + r))
        };

        let token_utilization = if query.max_results == 0 {
            0.0
        } else {
            result.len() as f64 / query.max_results as f64
        };

        Self {
            precision,
            recall,
            f1,
            latency_ms: result.execution_time().as_secs_f64() * 1000.0,
            token_utilization,
            query_kind: query.kind,
            cached: false,
            failed: false,
            timestamp_unix_ms: unix_ms_now(),
        }
    }

    fn failure(query: &Query, latency: Duration) -> Self {
        Self {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            latency_ms: latency.as_secs_f64() * 1000.0,
            token_utilization: 0.0,
            query_kind: query.kind,
            cached: false,
            failed: true,
            timestamp_unix_ms: unix_ms_now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
}

/// Which records a summary covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryWindow {
    All,
    Last(usize),
    Since(Duration),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindBreakdown {
    pub precision: f64,
    pub recall: f64,
    pub latency_ms: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub status: HealthStatus,
    pub total_queries: usize,
    pub failed_queries: usize,
    pub avg_precision: f64,
    pub avg_recall: f64,
    pub avg_f1: f64,
    pub avg_latency_ms: f64,
    pub cache_hit_rate: f64,
    pub error_rate: f64,
    pub by_kind: BTreeMap<String, KindBreakdown>,
}

impl PerformanceSummary {
    fn empty() -> Self {
        Self {
            status: HealthStatus::Healthy,
            total_queries: 0,
            failed_queries: 0,
            avg_precision: 0.0,
            avg_recall: 0.0,
            avg_f1: 0.0,
            avg_latency_ms: 0.0,
            cache_hit_rate: 0.0,
            error_rate: 0.0,
            by_kind: BTreeMap::new(),
        }
    }
}

/// Verdict with paired issues and suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationReport {
    fn flag(&mut self, issue: impl Into<String>, suggestion: impl Into<String>) {
        self.issues.push(issue.into());
        self.suggestions.push(suggestion.into());
    }
}

/// Rolling history of retrieval metrics.
#[derive(Debug)]
pub struct MetricsTracker {
    history: VecDeque<(Instant, RetrievalMetrics)>,
    limit: usize,
}

impl MetricsTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            history: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn calculate_metrics(result: &RetrievalResult) -> RetrievalMetrics {
        RetrievalMetrics::from_result(result)
    }

    pub fn record(&mut self, result: &RetrievalResult, cached: bool) -> RetrievalMetrics {
        let mut metrics = Self::calculate_metrics(result);
        metrics.cached = cached;
        self.push(metrics.clone());
        metrics
    }

    pub fn record_failure(&mut self, query: &Query, latency: Duration) {
        self.push(RetrievalMetrics::failure(query, latency));
    }

    fn push(&mut self, metrics: RetrievalMetrics) {
        self.history.push_back((Instant::now(), metrics));
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn window(&self, window: SummaryWindow) -> Vec<&RetrievalMetrics> {
        match window {
            SummaryWindow::All => self.history.iter().map(|(_, m)| m).collect(),
            SummaryWindow::Last(n) => {
                let skip = self.history.len().saturating_sub(n);
                self.history.iter().skip(skip).map(|(_, m)| m).collect()
            }
            SummaryWindow::Since(span) => {
                let now = Instant::now();
                self.history
                    .iter()
                    .filter(|(at, _)| now.saturating_duration_since(*at) <= span)
                    .map(|(_, m)| m)
                    .collect()
            }
        }
    }

    /// Aggregate over `window`. Quality averages cover successful calls only;
    /// failures count toward `error_rate`.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_performance_summary(&self, window: SummaryWindow) -> PerformanceSummary {
        let records = self.window(window);
        if records.is_empty() {
            return PerformanceSummary::empty();
        }

        let total = records.len();
        let failed = records.iter().filter(|m| m.failed).count();
        let cached = records.iter().filter(|m| m.cached).count();
        let succeeded: Vec<&&RetrievalMetrics> = records.iter().filter(|m| !m.failed).collect();

        let mean = |f: fn(&RetrievalMetrics) -> f64| -> f64 {
            if succeeded.is_empty() {
                0.0
            } else {
                succeeded.iter().map(|m| f(m)).sum::<f64>() / succeeded.len() as f64
            }
        };
        let avg_precision = mean(|m| m.precision);
        let avg_recall = mean(|m| m.recall);
        let avg_f1 = mean(|m| m.f1);
        let avg_latency_ms = mean(|m| m.latency_ms);
        let error_rate = failed as f64 / total as f64;

        let mut by_kind: BTreeMap<String, KindBreakdown> = BTreeMap::new();
        for m in &succeeded {
            let entry = by_kind.entry(m.query_kind.as_str().to_string()).or_default();
            entry.precision += m.precision;
            entry.recall += m.recall;
            entry.latency_ms += m.latency_ms;
            entry.count += 1;
        }
        for entry in by_kind.values_mut() {
            let n = entry.count as f64;
            entry.precision /= n;
            entry.recall /= n;
            entry.latency_ms /= n;
        }

        let status = if error_rate >= ERROR_STATUS_RATE {
            HealthStatus::Error
        } else if avg_precision >= HEALTHY_PRECISION
            && avg_recall >= HEALTHY_RECALL
            && avg_latency_ms <= HEALTHY_LATENCY_MS
        {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        PerformanceSummary {
            status,
            total_queries: total,
            failed_queries: failed,
            avg_precision,
            avg_recall,
            avg_f1,
            avg_latency_ms,
            cache_hit_rate: cached as f64 / total as f64,
            error_rate,
            by_kind,
        }
    }

    /// Health over the most recent hundred records, with remedies.
    pub fn check_system_health(&self) -> ValidationReport {
        if self.history.is_empty() {
            return ValidationReport {
                is_valid: true,
                confidence: 1.0,
                issues: vec!["No metrics data available yet".to_string()],
                suggestions: Vec::new(),
            };
        }

        let summary = self.get_performance_summary(SummaryWindow::Last(HEALTH_SAMPLE));
        let mut report = ValidationReport {
            is_valid: summary.status == HealthStatus::Healthy,
            confidence: 0.0,
            issues: Vec::new(),
            suggestions: Vec::new(),
        };

        if summary.error_rate >= ERROR_STATUS_RATE {
            report.flag(
                format!("High error rate: {:.0}%", summary.error_rate * 100.0),
                "Check upstream availability and fallback configuration",
            );
        }
        if summary.avg_precision < HEALTHY_PRECISION {
            report.flag(
                format!("Low precision: {:.2}", summary.avg_precision),
                "Consider adjusting similarity thresholds",
            );
        }
        if summary.avg_recall < HEALTHY_RECALL {
            report.flag(
                format!("Low recall: {:.2}", summary.avg_recall),
                "Consider broadening filters or raising max_results",
            );
        }
        if summary.avg_latency_ms > HEALTHY_LATENCY_MS {
            report.flag(
                format!("High latency: {:.0}ms", summary.avg_latency_ms),
                "Consider optimizing retrieval pipeline",
            );
        }

        report.confidence = if report.is_valid { 0.9 } else { 0.7 };
        report
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Sanity checks on a single result before it is handed to callers.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    max_latency: Duration,
}

impl ResponseValidator {
    pub const fn new(max_latency: Duration) -> Self {
        Self { max_latency }
    }

    pub fn validate_result(&self, result: &RetrievalResult) -> ValidationReport {
        let mut report = ValidationReport {
            is_valid: true,
            confidence: 0.9,
            issues: Vec::new(),
            suggestions: Vec::new(),
        };

        if result.is_empty() {
            report.flag("No chunks retrieved", "Try broadening the search criteria");
            report.is_valid = false;
            report.confidence = 0.5;
            return report;
        }

        let query = result.query();
        if result
            .similarity_scores()
            .iter()
            .any(|s| *s < query.min_similarity)
        {
            report.flag(
                "Low similarity scores detected",
                "Consider refining the query or adjusting thresholds",
            );
        }
        if result.execution_time() > self.max_latency {
            report.flag(
                "High latency detected",
                "Consider optimizing the retrieval pipeline",
            );
        }
        if query.include_context && result.context().is_none() {
            report.flag(
                "Missing context information",
                "Enable context enrichment for better results",
            );
        }

        #[allow(clippy::cast_precision_loss)]
        let penalty = 0.15 * report.issues.len() as f64;
        report.confidence = (0.9 - penalty).max(0.3);
        report.is_valid = report.issues.is_empty();
        report
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_protocol::{Chunk, CodeContext};
    use pretty_assertions::assert_eq;

    fn result(scores: &[f32], total: usize, latency: Duration) -> RetrievalResult {
        let chunks = scores
            .iter()
            .enumerate()
            .map(|(i, _)| {
                Chunk::new(
                    format!("src/m{i}.py"),
                    1,
                    2,
                    format!("def f{i}(): pass"),
                    "python".into(),
                )
            })
            .collect();
        RetrievalResult::new(
            Query::new("find handlers").max_results(5),
            chunks,
            scores.to_vec(),
            latency,
            total,
        )
        .unwrap()
    }

    #[test]
    fn precision_counts_scores_above_threshold() {
        let high = RetrievalMetrics::from_result(&result(&[0.9, 0.85, 0.95], 10, Duration::ZERO));
        assert!((high.precision - 1.0).abs() < 1e-9);
        assert!((high.recall - 0.3).abs() < 1e-9);
        assert!((high.token_utilization - 0.6).abs() < 1e-9);

        let low = RetrievalMetrics::from_result(&result(&[0.5, 0.4, 0.6], 10, Duration::ZERO));
        assert_eq!(low.precision, 0.0);
        assert!(low.f1 > 0.0);
    }

    #[test]
    fn empty_result_scores_zero() {
        let empty = RetrievalResult::error_only(Query::new("q"), "nothing");
        let metrics = RetrievalMetrics::from_result(&empty);
        assert_eq!((metrics.precision, metrics.recall, metrics.f1), (0.0, 0.0, 0.0));
    }

    #[test]
    fn latency_in_milliseconds() {
        let metrics =
            RetrievalMetrics::from_result(&result(&[0.9], 1, Duration::from_millis(250)));
        assert!((metrics.latency_ms - 250.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn summary_status_follows_thresholds() {
        let mut tracker = MetricsTracker::new(100);
        assert_eq!(
            tracker.get_performance_summary(SummaryWindow::All).status,
            HealthStatus::Healthy
        );

        tracker.record(&result(&[0.9, 0.8], 2, Duration::from_millis(10)), false);
        let summary = tracker.get_performance_summary(SummaryWindow::All);
        assert_eq!(summary.status, HealthStatus::Healthy);
        assert_eq!(summary.by_kind["code_search"].count, 1);

        tracker.record(&result(&[0.2], 100, Duration::from_millis(10)), true);
        let summary = tracker.get_performance_summary(SummaryWindow::All);
        assert_eq!(summary.status, HealthStatus::Degraded);
        assert!((summary.cache_hit_rate - 0.5).abs() < 1e-9);

        let recent = tracker.get_performance_summary(SummaryWindow::Last(1));
        assert_eq!(recent.total_queries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_drive_error_status() {
        let mut tracker = MetricsTracker::new(100);
        tracker.record(&result(&[0.9], 1, Duration::ZERO), false);
        tracker.record_failure(&Query::new("q"), Duration::ZERO);
        let summary = tracker.get_performance_summary(SummaryWindow::All);
        assert_eq!(summary.status, HealthStatus::Error);
        assert_eq!(summary.failed_queries, 1);
        assert!((summary.avg_precision - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_duration_window() {
        let mut tracker = MetricsTracker::new(100);
        tracker.record(&result(&[0.9], 1, Duration::ZERO), false);
        tokio::time::advance(Duration::from_secs(120)).await;
        tracker.record(&result(&[0.8], 1, Duration::ZERO), false);

        let summary = tracker.get_performance_summary(SummaryWindow::Since(Duration::from_secs(60)));
        assert_eq!(summary.total_queries, 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut tracker = MetricsTracker::new(3);
        for _ in 0..5 {
            tracker.record(&result(&[0.9], 1, Duration::ZERO), false);
        }
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn health_check_reports_remedies() {
        let tracker = MetricsTracker::default();
        let report = tracker.check_system_health();
        assert!(report.is_valid);
        assert_eq!(report.issues, vec!["No metrics data available yet"]);

        let mut tracker = MetricsTracker::default();
        tracker.record(&result(&[0.3], 1, Duration::from_secs(2)), false);
        let report = tracker.check_system_health();
        assert!(!report.is_valid);
        assert!((report.confidence - 0.7).abs() < 1e-9);
        assert!(report.issues.iter().any(|i| i.starts_with("Low precision")));
        assert!(report.issues.iter().any(|i| i.starts_with("High latency")));
        assert_eq!(report.issues.len(), report.suggestions.len());
    }

    #[test]
    fn validator_flags_each_problem() {
        let validator = ResponseValidator::default();

        let empty = validator.validate_result(&RetrievalResult::error_only(Query::new("q"), "x"));
        assert!(!empty.is_valid);
        assert_eq!(empty.issues, vec!["No chunks retrieved"]);

        let slow = validator.validate_result(&result(&[0.4, 0.9], 2, Duration::from_millis(1500)));
        assert!(!slow.is_valid);
        assert_eq!(
            slow.issues,
            vec![
                "Low similarity scores detected",
                "High latency detected",
                "Missing context information"
            ]
        );
        assert!(slow.confidence < 0.9);

        let clean = result(&[0.9], 1, Duration::from_millis(5))
            .with_context(Some(CodeContext::new("def f(): pass", "python")));
        let report = validator.validate_result(&clean);
        assert!(report.is_valid);
        assert!((report.confidence - 0.9).abs() < 1e-9);
    }
}
