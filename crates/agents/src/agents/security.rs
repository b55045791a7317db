use super::{Agent, ModelCore};
use crate::config::AgentConfig;
use crate::context::AnalysisContext;
use crate::error::Result;
use crate::findings::{AgentAnalysis, AgentKind, Findings, SecurityFindings, UnderstandingLevel};
use crate::model::LanguageModel;
use async_trait::async_trait;
use orca_metadata::{ExtractionLevel, MetadataRequest};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You review code for security problems: input validation, \
authentication and authorization flaws, data exposure, injection and weak cryptography. \
Reply with JSON: {\"findings\": {\"issues\": [{\"severity\": \"low|medium|high|critical\", \
\"type\": \"\", \"description\": \"\", \"line_number\": null, \"recommendation\": \"\"}], \
\"recommendations\": []}, \"confidence\": 0.0, \"supporting_evidence\": [], \"warnings\": []}";

/// Vulnerabilities and risky practices
pub struct SecurityAgent {
    core: ModelCore,
}

impl SecurityAgent {
    pub fn new(model: Arc<dyn LanguageModel>, config: &AgentConfig) -> Self {
        Self {
            core: ModelCore::new(model, config),
        }
    }
}

#[async_trait]
impl Agent for SecurityAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Security
    }

    fn metadata_requirements(&self) -> MetadataRequest {
        MetadataRequest::new(ExtractionLevel::Deep).include_comments(true)
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<AgentAnalysis> {
        let prompt = context.render_prompt("Identify security issues in this code.");
        let answer = self
            .core
            .ask::<SecurityFindings>(self.kind(), SYSTEM_PROMPT, prompt)
            .await?;
        Ok(answer.into_analysis(
            self.kind(),
            UnderstandingLevel::Contextual,
            Findings::Security,
        ))
    }
}
