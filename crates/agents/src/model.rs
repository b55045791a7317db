use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One prompt sent to a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Model answer plus what it cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

/// Large language model backend the agents reason with.
///
/// Implementations own transport, authentication and wire format; agents
/// only see text in and text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used to attribute token usage
    fn model_id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ModelError>;
}
