use super::{Agent, ModelCore};
use crate::config::AgentConfig;
use crate::context::AnalysisContext;
use crate::error::{AgentError, Result};
use crate::findings::{AgentAnalysis, AgentKind, Findings, PatternFindings, UnderstandingLevel};
use crate::model::LanguageModel;
use async_trait::async_trait;
use orca_metadata::{ExtractionLevel, MetadataRequest};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You identify design patterns and code organization. \
Reply with JSON: {\"findings\": {\"patterns\": [{\"name\": \"\", \"confidence\": 0.0, \
\"matches\": [], \"explanation\": \"\"}], \"recommendations\": []}, \"confidence\": 0.0, \
\"supporting_evidence\": [], \"warnings\": []}";

/// Design patterns and structure
pub struct PatternAgent {
    core: ModelCore,
}

impl PatternAgent {
    pub fn new(model: Arc<dyn LanguageModel>, config: &AgentConfig) -> Self {
        Self {
            core: ModelCore::new(model, config),
        }
    }
}

#[async_trait]
impl Agent for PatternAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Pattern
    }

    fn metadata_requirements(&self) -> MetadataRequest {
        MetadataRequest::new(ExtractionLevel::Deep).include_comments(true)
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<AgentAnalysis> {
        let prompt = context.render_prompt("Identify the design patterns used in this code.");
        let answer = self
            .core
            .ask::<PatternFindings>(self.kind(), SYSTEM_PROMPT, prompt)
            .await?;
        if let Some(pattern) = answer
            .findings()
            .patterns
            .iter()
            .find(|p| !(0.0..=1.0).contains(&p.confidence))
        {
            return Err(AgentError::InvalidResponse(format!(
                "pattern {} has confidence {} outside [0, 1]",
                pattern.name, pattern.confidence
            )));
        }
        Ok(answer.into_analysis(
            self.kind(),
            UnderstandingLevel::Architectural,
            Findings::Pattern,
        ))
    }
}
