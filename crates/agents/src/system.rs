use crate::agents::{default_agents, Agent};
use crate::config::ReasoningConfig;
use crate::context::AnalysisContext;
use crate::error::AgentError;
use crate::findings::{
    AgentAnalysis, CodeMetrics, DependencyInfo, DesignPattern, Findings, SecurityIssue,
};
use crate::model::LanguageModel;
use orca_code_chunker::Language;
use orca_coordinator::AgentCoordinator;
use orca_metadata::MetadataExtractor;
use orca_protocol::unix_ms_now;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Knowledge key the per-agent outcomes are shared under
pub const KNOWLEDGE_KEY: &str = "reasoning";

/// Confidence every agent must exceed for the analysis to count as a success
const SUCCESS_CONFIDENCE: f64 = 0.5;

/// Combined report of every agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAnalysis {
    pub query: String,
    /// Keyed by agent name
    pub analyses: BTreeMap<String, AgentAnalysis>,
    pub security_issues: Vec<SecurityIssue>,
    pub design_patterns: Vec<DesignPattern>,
    pub metrics: Option<CodeMetrics>,
    pub dependencies: DependencyInfo,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub timestamp_unix_ms: u64,
}

/// Runs every agent against the same context and merges what they find.
///
/// ```text
/// AnalysisContext ─┬─► behavioral ─┐
///   (+ metadata    ├─► security   ─┤  JoinSet, each
///    per agent)    ├─► pattern    ─┼─ time-boxed ──► ComprehensiveAnalysis
///                  ├─► metrics    ─┤
///                  └─► dependency ─┘──► AgentCoordinator (per-agent outcome)
/// ```
pub struct ReasoningSystem {
    agents: Vec<Arc<dyn Agent>>,
    config: ReasoningConfig,
    coordinator: Option<Arc<AgentCoordinator>>,
    extractor: Option<Arc<dyn MetadataExtractor>>,
}

impl ReasoningSystem {
    pub fn new(agents: Vec<Arc<dyn Agent>>, config: ReasoningConfig) -> Self {
        Self {
            agents,
            config,
            coordinator: None,
            extractor: None,
        }
    }

    /// Behavioral, security, pattern, metrics and dependency agents over one
    /// model
    pub fn with_default_agents(model: Arc<dyn LanguageModel>, config: ReasoningConfig) -> Self {
        let agents = default_agents(&model, &config.agent);
        Self::new(agents, config)
    }

    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<AgentCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// Extract metadata per agent requirements when the context has none
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.agents.iter().map(|agent| agent.name())
    }

    /// Run all agents concurrently.
    ///
    /// A failing or slow agent never aborts its siblings: it contributes a
    /// zero-confidence `Failed` analysis under its own name.
    pub async fn analyze(
        &self,
        context: &AnalysisContext,
        query: Option<&str>,
    ) -> ComprehensiveAnalysis {
        let started = Instant::now();
        if let Some(coordinator) = &self.coordinator {
            for agent in &self.agents {
                coordinator.register_agent(agent.name()).await;
            }
        }

        let timeout = self.config.agent_timeout();
        let mut tasks = JoinSet::new();
        for agent in &self.agents {
            let agent = Arc::clone(agent);
            let context = self.prepare_context(agent.as_ref(), context);
            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = tokio::time::timeout(timeout, agent.analyze(&context))
                    .await
                    .unwrap_or(Err(AgentError::Timeout(timeout)));
                let analysis = outcome.unwrap_or_else(|err| {
                    log::warn!("{} failed: {err}", agent.name());
                    match err {
                        AgentError::Timeout(_) => {
                            AgentAnalysis::failed(agent.kind(), "Analysis timed out", err.to_string())
                        }
                        _ => AgentAnalysis::failed(
                            agent.kind(),
                            err.to_string(),
                            format!("Agent failed: {err}"),
                        ),
                    }
                });
                (analysis, started.elapsed())
            });
        }

        let mut analyses = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((analysis, elapsed)) => {
                    self.record(&analysis, elapsed).await;
                    analyses.insert(analysis.agent_name.clone(), analysis);
                }
                Err(err) => log::error!("Agent task aborted: {err}"),
            }
        }
        for agent in &self.agents {
            if !analyses.contains_key(agent.name()) {
                let analysis =
                    AgentAnalysis::failed(agent.kind(), "Agent task aborted", "Agent task aborted");
                self.record(&analysis, Duration::ZERO).await;
                analyses.insert(analysis.agent_name.clone(), analysis);
            }
        }

        let elapsed = started.elapsed();
        if let Some(coordinator) = &self.coordinator {
            coordinator.record_analysis(elapsed).await;
        }
        let report = aggregate(query.unwrap_or_default(), analyses, elapsed);
        log::info!(
            "Analysis finished in {}ms (success: {})",
            report.duration_ms,
            report.success
        );
        report
    }

    fn prepare_context(&self, agent: &dyn Agent, context: &AnalysisContext) -> AnalysisContext {
        let mut prepared = context.clone();
        let Some(extractor) = &self.extractor else {
            return prepared;
        };
        if prepared.metadata.is_some() {
            return prepared;
        }

        let language = Language::from_name(&prepared.code.language);
        if !extractor.supports(language) {
            return prepared;
        }
        match extractor.extract(
            &prepared.code.code_snippet,
            language,
            &agent.metadata_requirements(),
        ) {
            Ok(metadata) => prepared.absorb_metadata(metadata),
            Err(err) => log::warn!("Metadata extraction for {} failed: {err}", agent.name()),
        }
        prepared
    }

    async fn record(&self, analysis: &AgentAnalysis, elapsed: Duration) {
        let Some(coordinator) = &self.coordinator else {
            return;
        };
        let success = !analysis.findings.is_failed();
        coordinator
            .record_operation(&analysis.agent_name, success, elapsed, &analysis.token_usage)
            .await;
        let mut agents = serde_json::Map::new();
        agents.insert(
            analysis.agent_name.clone(),
            json!({"confidence": analysis.confidence, "failed": !success}),
        );
        coordinator
            .share_knowledge(KNOWLEDGE_KEY, json!({ "agents": agents }))
            .await;
    }
}

fn aggregate(
    query: &str,
    analyses: BTreeMap<String, AgentAnalysis>,
    elapsed: Duration,
) -> ComprehensiveAnalysis {
    let mut security_issues = Vec::new();
    let mut design_patterns = Vec::new();
    let mut metrics = None;
    let mut dependencies = DependencyInfo::default();
    let mut recommendations = Vec::new();
    let mut warnings = Vec::new();

    for (name, analysis) in &analyses {
        match &analysis.findings {
            Findings::Security(found) => {
                security_issues.extend(found.issues.iter().cloned());
                recommendations.extend(found.recommendations.iter().cloned());
            }
            Findings::Pattern(found) => {
                design_patterns.extend(found.patterns.iter().cloned());
                recommendations.extend(found.recommendations.iter().cloned());
            }
            Findings::Metrics(found) => metrics = Some(found.clone()),
            Findings::Dependency(found) => dependencies = found.clone(),
            Findings::Behavioral(_) | Findings::Failed { .. } => {}
        }
        warnings.extend(analysis.warnings.iter().map(|w| format!("{name}: {w}")));
    }

    let failed = analyses.values().filter(|a| a.findings.is_failed()).count();
    let summary = summarize(
        analyses.len(),
        failed,
        &security_issues,
        &design_patterns,
        metrics.as_ref(),
        &dependencies,
    );
    let success = !analyses.is_empty()
        && analyses
            .values()
            .all(|analysis| analysis.confidence > SUCCESS_CONFIDENCE);

    ComprehensiveAnalysis {
        query: query.to_string(),
        analyses,
        security_issues,
        design_patterns,
        metrics,
        dependencies,
        summary,
        recommendations,
        warnings,
        success,
        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        timestamp_unix_ms: unix_ms_now(),
    }
}

fn summarize(
    total: usize,
    failed: usize,
    security_issues: &[SecurityIssue],
    design_patterns: &[DesignPattern],
    metrics: Option<&CodeMetrics>,
    dependencies: &DependencyInfo,
) -> String {
    let mut lines = vec![format!(
        "Analyzed code using {} of {total} agents",
        total - failed
    )];
    if !security_issues.is_empty() {
        lines.push(format!("Found {} security issues", security_issues.len()));
    }
    if !design_patterns.is_empty() {
        lines.push(format!("Identified {} design patterns", design_patterns.len()));
    }
    if let Some(metrics) = metrics {
        lines.push(format!(
            "Code metrics: complexity={}, maintainability={:.2}",
            metrics.complexity, metrics.maintainability
        ));
    }
    if dependencies.total() > 0 {
        lines.push(format!("Found {} dependencies", dependencies.total()));
    }
    if failed > 0 {
        lines.push(format!("{failed} agents failed during analysis"));
    }
    lines.join("\n")
}
