use super::{Agent, ModelCore};
use crate::config::AgentConfig;
use crate::context::AnalysisContext;
use crate::error::Result;
use crate::findings::{AgentAnalysis, AgentKind, BehavioralFindings, Findings, UnderstandingLevel};
use crate::model::LanguageModel;
use async_trait::async_trait;
use orca_metadata::{ExtractionLevel, MetadataRequest};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You analyze the runtime behavior of code: what it does when \
executed, which side effects it has, how it handles errors and where it may be slow. \
Reply with JSON: {\"findings\": {\"runtime_behavior\": [], \"side_effects\": [], \
\"error_handling\": [], \"performance\": []}, \"confidence\": 0.0, \
\"supporting_evidence\": [], \"warnings\": []}";

/// Runtime behavior and side effects
pub struct BehavioralAgent {
    core: ModelCore,
}

impl BehavioralAgent {
    pub fn new(model: Arc<dyn LanguageModel>, config: &AgentConfig) -> Self {
        Self {
            core: ModelCore::new(model, config),
        }
    }
}

#[async_trait]
impl Agent for BehavioralAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Behavioral
    }

    fn metadata_requirements(&self) -> MetadataRequest {
        MetadataRequest::new(ExtractionLevel::Deep).include_comments(true)
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<AgentAnalysis> {
        let prompt = context.render_prompt("Describe the runtime behavior of this code.");
        let answer = self
            .core
            .ask::<BehavioralFindings>(self.kind(), SYSTEM_PROMPT, prompt)
            .await?;
        Ok(answer.into_analysis(
            self.kind(),
            UnderstandingLevel::Behavioral,
            Findings::Behavioral,
        ))
    }
}
