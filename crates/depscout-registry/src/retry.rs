//! Retry with exponential backoff for registry requests

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RegistryError, Result};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts (0 = single attempt)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for given attempt number
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        std::cmp::min(Duration::from_millis(delay_ms as u64), self.max_delay)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    pub async fn run<F, Fut, T>(&self, label: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(request = label, retries = attempt, "Registry request recovered");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(request = label, error = %e, "Registry request gave up");
                    return Err(RegistryError::RetryLimitExceeded {
                        attempts: attempt + 1,
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        request = label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        ?delay,
                        error = %e,
                        "Registry request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
