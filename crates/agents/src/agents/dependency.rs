use super::{Agent, ModelCore};
use crate::config::AgentConfig;
use crate::context::AnalysisContext;
use crate::error::Result;
use crate::findings::{AgentAnalysis, AgentKind, DependencyInfo, Findings, UnderstandingLevel};
use crate::model::LanguageModel;
use async_trait::async_trait;
use orca_metadata::{ExtractionLevel, MetadataRequest};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You map code dependencies: direct and indirect modules, \
circular chains and external packages with their versions. Reply with JSON: \
{\"findings\": {\"direct_deps\": [], \"indirect_deps\": [], \"circular_deps\": [], \
\"external_deps\": {}}, \"confidence\": 0.0, \"supporting_evidence\": [], \"warnings\": []}";

/// Direct, indirect, circular and external dependencies
pub struct DependencyAgent {
    core: ModelCore,
}

impl DependencyAgent {
    pub fn new(model: Arc<dyn LanguageModel>, config: &AgentConfig) -> Self {
        Self {
            core: ModelCore::new(model, config),
        }
    }
}

#[async_trait]
impl Agent for DependencyAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Dependency
    }

    fn metadata_requirements(&self) -> MetadataRequest {
        MetadataRequest::new(ExtractionLevel::Standard)
            .include_docstrings(false)
            .max_dependency_depth(Some(2))
    }

    async fn analyze(&self, context: &AnalysisContext) -> Result<AgentAnalysis> {
        let prompt = context.render_prompt("List the dependencies of this code.");
        let mut answer = self
            .core
            .ask::<DependencyInfo>(self.kind(), SYSTEM_PROMPT, prompt)
            .await?;

        // extracted imports stand in when the model lists no direct deps
        if answer.findings().direct_deps.is_empty() {
            if let Some(metadata) = &context.metadata {
                answer
                    .findings_mut()
                    .direct_deps
                    .extend(metadata.dependencies.keys().cloned());
            }
        }
        Ok(answer.into_analysis(
            self.kind(),
            UnderstandingLevel::Contextual,
            Findings::Dependency,
        ))
    }
}
