//! Centralized retry policy for external calls
//!
//! Retrieval, embedding and model calls all go through the same bounded
//! retry loop with exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::model::LimitsConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            max_attempts: limits.retry_max_attempts.max(1),
            initial_backoff: Duration::from_millis(limits.retry_initial_backoff_ms),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        // Exponential backoff
        self.initial_backoff * (1u32 << attempt.min(8))
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between attempts.
///
/// Errors rejected by `retryable` are returned immediately; the last error
/// is returned once attempts are exhausted.
pub async fn with_retries<T, E, Fut, Op, P>(
    policy: &RetryPolicy,
    label: &str,
    retryable: P,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(call = label, attempt = attempt + 1, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                if !retryable(&e) {
                    tracing::debug!(call = label, error = %e, "Non-retryable error");
                    return Err(e);
                }
                if attempt + 1 < policy.max_attempts {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        call = label,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.expect("at least one attempt was made"))
}
