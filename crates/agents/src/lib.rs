//! # Orca Agents
//!
//! Specialised analysis agents over a pluggable [`LanguageModel`], and the
//! [`ReasoningSystem`] that runs them side by side and merges their typed
//! [`Findings`] into one [`ComprehensiveAnalysis`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use orca_agents::{
//!     AnalysisContext, Completion, CompletionRequest, LanguageModel, ModelError,
//!     ReasoningConfig, ReasoningSystem,
//! };
//! use orca_protocol::CodeContext;
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl LanguageModel for Offline {
//!     fn model_id(&self) -> &str {
//!         "offline"
//!     }
//!
//!     async fn complete(&self, _request: CompletionRequest) -> Result<Completion, ModelError> {
//!         Err(ModelError::Unavailable("no backend configured".into()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = ReasoningSystem::with_default_agents(Arc::new(Offline), ReasoningConfig::default());
//!     let context = AnalysisContext::new(CodeContext::new("fn main() {}", "rust"));
//!     let report = system.analyze(&context, Some("what does this do?")).await;
//!     println!("{}", report.summary);
//! }
//! ```

mod agents;
mod config;
mod context;
mod error;
mod findings;
mod model;
mod retry;
mod system;

pub use agents::{
    default_agents, Agent, BehavioralAgent, DependencyAgent, MetricsAgent, PatternAgent,
    SecurityAgent,
};
pub use config::{AgentConfig, ReasoningConfig};
pub use context::AnalysisContext;
pub use error::{AgentError, ModelError, Result};
pub use findings::{
    AgentAnalysis, AgentKind, BehavioralFindings, CodeMetrics, DependencyInfo, DesignPattern,
    Findings, PatternFindings, SecurityFindings, SecurityIssue, Severity, UnderstandingLevel,
};
pub use model::{Completion, CompletionRequest, LanguageModel};
pub use retry::RetryPolicy;
pub use system::{ComprehensiveAnalysis, ReasoningSystem, KNOWLEDGE_KEY};
