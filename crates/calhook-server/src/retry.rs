//! Bounded retries and timeouts for outbound provider calls.

use std::future::Future;
use std::time::Duration;

use calhook_providers::{ProviderError, ProviderResult};
use tracing::{debug, warn};

/// Exponential backoff policy for retryable provider errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Builder: set the attempt budget (at least one).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before retry number `failures` (1-based); zero for no failures.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff.as_secs_f64();
        let multiplier = self.backoff_multiplier.powi(failures as i32 - 1);
        let delay = base * multiplier;
        let max = self.max_backoff.as_secs_f64();

        Duration::from_secs_f64(delay.min(max))
    }
}

/// Runs `fut`, failing with a `Timeout` provider error once `limit` elapses.
pub async fn with_timeout<T, Fut>(limit: Duration, what: &str, fut: Fut) -> ProviderResult<T>
where
    Fut: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::timeout(format!(
            "{} did not complete within {:?}",
            what, limit
        ))),
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. Each attempt is bounded by `limit`.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    limit: Duration,
    what: &str,
    mut op: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut failures = 0;
    loop {
        match with_timeout(limit, what, op()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && failures + 1 < policy.max_attempts => {
                failures += 1;
                let delay = policy.backoff_delay(failures);
                warn!(
                    attempt = failures,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "{} failed, retrying",
                    what
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(attempts = failures + 1, error = %e, "{} gave up", what);
                return Err(e);
            }
        }
    }
}
