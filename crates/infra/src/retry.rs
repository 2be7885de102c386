use std::future::Future;

use tracing::warn;

use crate::error::ServiceError;

/// How many times a service operation runs before a retryable error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    /// One retry.
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. Each call must open its own transaction.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && tries < self.max_attempts => {
                    warn!(operation, attempt = tries, error = %err, "retrying with a fresh transaction");
                    tries += 1;
                }
                result => return result,
            }
        }
    }
}
