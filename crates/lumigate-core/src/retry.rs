// ── Retry policy for idempotent requests ──
//
// GET and PUT go through `RetryPolicy::run`; POST and DELETE never do.
// Only errors that `lumigate_api::Error::is_transient` accepts are
// retried: rate limiting, a full command buffer, and connect/timeout/reset
// transport failures. Decode failures are never retried.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff before attempt `attempt + 1` (zero-based `attempt`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, lumigate_api::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, lumigate_api::Error>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(operation, attempt, delay_ms = delay.as_millis(), error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
