use crate::error::ModelError;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule for model calls: one delay per retry.
///
/// The default waits 4s then 8s, three attempts in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: vec![Duration::from_secs(4), Duration::from_secs(8)],
        }
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Run `op` until it succeeds, fails permanently, or the schedule runs
    /// out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ModelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let mut delays = self.delays.iter();
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    let Some(delay) = delays.next() else {
                        log::warn!("{label}: giving up after {} attempts: {err}", self.attempts());
                        return Err(err);
                    };
                    log::warn!("{label}: {err}; retrying in {}ms", delay.as_millis());
                    tokio::time::sleep(*delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
