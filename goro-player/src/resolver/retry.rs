//! Bounded retry with fixed backoff

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::ResolveError;

/// Retry policy for one provider step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retrying
    pub max_attempts: u32,
    /// Fixed wait before each retry
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. The last error is returned.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, step: &str, mut op: F) -> Result<T, ResolveError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ResolveError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        step,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Attempt failed, retrying in {:?}: {}",
                        self.backoff,
                        e
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
