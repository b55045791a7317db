use super::{Agent, ModelCore};
use crate::config::AgentConfig;
use crate::context::AnalysisContext;
use crate::error::{AgentError, Result};
use crate::findings::{AgentAnalysis, AgentKind, CodeMetrics, Findings, UnderstandingLevel};
use crate::model::LanguageModel;
use async_trait::async_trait;
use orca_metadata::{ExtractionLevel, MetadataRequest};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You measure code quality. Estimate cyclomatic and cognitive \
complexity, a maintainability index between 0 and 100, lines of code and the ratio of \
comments to code. Reply with JSON: {\"findings\": {\"complexity\": 0, \
\"maintainability\": 0.0, \"cognitive_complexity\": 0, \"lines_of_code\": 0, \
\"comment_ratio\": 0.0}, \"confidence\": 0.0, \"supporting_evidence\": [], \"warnings\": []}";

/// Complexity and maintainability
pub struct MetricsAgent {
    core: ModelCore,
}

impl MetricsAgent {
    pub fn new(model: Arc<dyn LanguageModel>, config: &AgentConfig) -> Self {
        Self {
            core: ModelCore::new(model, config),
        }
    }
}

#[async_trait]
impl Agent for MetricsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Metrics
    }

    /// Comprehensive so the extracted metadata carries a complexity score
    fn metadata_requirements(&self) -> MetadataRequest {
        MetadataRequest::new(ExtractionLevel::Comprehensive).include_comments(true)
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<AgentAnalysis> {
        let prompt = context.render_prompt("Calculate metrics for this code.");
        let answer = self
            .core
            .ask::<CodeMetrics>(self.kind(), SYSTEM_PROMPT, prompt)
            .await?;
        answer
            .findings()
            .validate()
            .map_err(AgentError::InvalidResponse)?;
        Ok(answer.into_analysis(self.kind(), UnderstandingLevel::Semantic, Findings::Metrics))
    }
}
