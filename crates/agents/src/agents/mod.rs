//! The five analysis agents and the model plumbing they share.

mod behavioral;
mod dependency;
mod metrics;
mod pattern;
mod security;

pub use behavioral::BehavioralAgent;
pub use dependency::DependencyAgent;
pub use metrics::MetricsAgent;
pub use pattern::PatternAgent;
pub use security::SecurityAgent;

use crate::config::AgentConfig;
use crate::context::AnalysisContext;
use crate::error::{AgentError, Result};
use crate::findings::{AgentAnalysis, AgentKind, Findings, UnderstandingLevel};
use crate::model::{CompletionRequest, LanguageModel};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use orca_metadata::MetadataRequest;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One specialised analysis over an [`AnalysisContext`]
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    fn name(&self) -> &'static str {
        self.kind().agent_name()
    }

    /// Metadata the agent wants extracted before it runs
    fn metadata_requirements(&self) -> MetadataRequest;

    async fn analyze(&self, context: &AnalysisContext) -> Result<AgentAnalysis>;
}

/// The five agents over one model
pub fn default_agents(model: &Arc<dyn LanguageModel>, config: &AgentConfig) -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(BehavioralAgent::new(model.clone(), config)),
        Arc::new(SecurityAgent::new(model.clone(), config)),
        Arc::new(PatternAgent::new(model.clone(), config)),
        Arc::new(MetricsAgent::new(model.clone(), config)),
        Arc::new(DependencyAgent::new(model.clone(), config)),
    ]
}

/// JSON object every agent asks the model for
#[derive(Debug, Deserialize)]
struct ModelAnswer<T> {
    findings: T,
    confidence: f64,
    #[serde(default)]
    understanding_level: Option<UnderstandingLevel>,
    #[serde(default)]
    supporting_evidence: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Parsed model answer with its token cost
pub(crate) struct Answer<T> {
    answer: ModelAnswer<T>,
    model_id: String,
    tokens_used: u64,
}

impl<T> Answer<T> {
    pub(crate) const fn findings(&self) -> &T {
        &self.answer.findings
    }

    pub(crate) fn findings_mut(&mut self) -> &mut T {
        &mut self.answer.findings
    }

    pub(crate) fn into_analysis(
        self,
        kind: AgentKind,
        default_level: UnderstandingLevel,
        wrap: impl FnOnce(T) -> Findings,
    ) -> AgentAnalysis {
        let mut token_usage = BTreeMap::new();
        token_usage.insert(self.model_id, self.tokens_used);
        AgentAnalysis {
            agent_name: kind.agent_name().to_string(),
            kind,
            understanding_level: self.answer.understanding_level.unwrap_or(default_level),
            findings: wrap(self.answer.findings),
            confidence: self.answer.confidence,
            supporting_evidence: self.answer.supporting_evidence,
            warnings: self.answer.warnings,
            token_usage,
        }
    }
}

/// Model handle plus retry schedule, shared by every agent
pub(crate) struct ModelCore {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl ModelCore {
    pub(crate) fn new(model: Arc<dyn LanguageModel>, config: &AgentConfig) -> Self {
        Self {
            model,
            max_tokens: config.max_tokens,
            retry: config.retry_policy(),
        }
    }

    pub(crate) async fn ask<T: DeserializeOwned>(
        &self,
        kind: AgentKind,
        system: &str,
        prompt: String,
    ) -> Result<Answer<T>> {
        let request = CompletionRequest {
            system: system.to_string(),
            prompt,
            max_tokens: self.max_tokens,
        };
        let model = &self.model;
        let request = &request;
        let completion = self
            .retry
            .run(kind.agent_name(), move || model.complete(request.clone()))
            .await?;
        log::debug!(
            "{} answered with {} tokens",
            kind.agent_name(),
            completion.tokens_used
        );

        let answer: ModelAnswer<T> = parse_answer(&completion.text)?;
        if !(0.0..=1.0).contains(&answer.confidence) {
            return Err(AgentError::InvalidResponse(format!(
                "confidence {} outside [0, 1]",
                answer.confidence
            )));
        }
        Ok(Answer {
            answer,
            model_id: self.model.model_id().to_string(),
            tokens_used: completion.tokens_used,
        })
    }
}

/// Decode the outermost JSON object in a model answer, ignoring any prose
/// or code fences around it.
fn parse_answer<T: DeserializeOwned>(text: &str) -> Result<T> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(AgentError::InvalidResponse(
            "no JSON object in model answer".to_string(),
        ));
    };
    if end < start {
        return Err(AgentError::InvalidResponse(
            "no JSON object in model answer".to_string(),
        ));
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| AgentError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::BehavioralFindings;

    #[test]
    fn parses_fenced_answers() {
        let text = "Here you go:\n```json\n{\"findings\": {\"side_effects\": [\"writes file\"]}, \"confidence\": 0.7}\n```";
        let answer: ModelAnswer<BehavioralFindings> = parse_answer(text).unwrap();
        assert_eq!(answer.findings.side_effects, vec!["writes file"]);
        assert_eq!(answer.confidence, 0.7);
        assert!(answer.understanding_level.is_none());
    }

    #[test]
    fn rejects_answers_without_json() {
        let err = parse_answer::<ModelAnswer<BehavioralFindings>>("I cannot help").unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
        let err = parse_answer::<ModelAnswer<BehavioralFindings>>("} backwards {").unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }

    #[test]
    fn missing_confidence_is_invalid() {
        let err = parse_answer::<ModelAnswer<BehavioralFindings>>(r#"{"findings": {}}"#).unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }
}
