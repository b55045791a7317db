use crate::adaptive::AdaptiveRetriever;
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::fallback::{FailureStats, FallbackManager, FallbackOutcome};
use orca_protocol::{Query, RetrievalResult};
use std::sync::Arc;

/// Bounded retry loop joining the adaptive retriever and the fallback
/// manager. One pipeline per session; it owns the failure record.
pub struct RetrievalPipeline {
    retriever: Arc<AdaptiveRetriever>,
    fallback: FallbackManager,
}

impl RetrievalPipeline {
    pub fn new(config: &RetrievalConfig, retriever: Arc<AdaptiveRetriever>) -> Self {
        Self {
            retriever,
            fallback: FallbackManager::new(config.fallback.clone()),
        }
    }

    pub const fn retriever(&self) -> &Arc<AdaptiveRetriever> {
        &self.retriever
    }

    pub fn failure_stats(&self) -> FailureStats {
        self.fallback.failure_stats()
    }

    /// Retrieve with retries and fallbacks.
    ///
    /// Malformed queries fail immediately. Otherwise each failed attempt is
    /// handed to the fallback manager, which either recovers a result, asks
    /// for a delayed retry, or gives up; giving up returns the last error.
    pub async fn retrieve(
        &mut self,
        query: &Query,
        agent_id: Option<&str>,
    ) -> Result<RetrievalResult> {
        query.validate()?;

        let mut attempt: u32 = 1;
        loop {
            let err = match self.retriever.retrieve(query, agent_id).await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            match self
                .fallback
                .handle_failure(&err, query, agent_id, attempt, self.retriever.as_ref())
                .await
            {
                FallbackOutcome::Recovered { strategy, result } => {
                    log::info!("Recovered '{}' via {strategy}", query.text);
                    return Ok(result);
                }
                FallbackOutcome::RetryAfter(delay) => {
                    log::debug!("Attempt {attempt} failed, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                FallbackOutcome::Exhausted => return Err(err),
            }
            attempt += 1;
        }
    }
}
