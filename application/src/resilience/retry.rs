//! Retry with exponential backoff around a single provider call.

use crate::ports::provider_adapter::ProviderError;
use collab_domain::RetryPolicy;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Successful value with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Runs an operation until it succeeds, fails permanently or runs out of
/// retries.
///
/// Only [`ProviderError::is_retryable`] errors are retried. The wait before
/// retry `n` (0-based) is `min(max_delay, base_delay * 2^n)` plus jitter in
/// `[0, delay * jitter_ratio]`, and never shorter than a `retry_after` hint
/// carried by the error. The attempt counter starts over on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryHandler;

impl RetryHandler {
    pub fn new() -> Self {
        Self
    }

    /// Execute `op`, passing it the 1-based attempt number.
    ///
    /// Running out of retries yields [`ProviderError::RetriesExhausted`]
    /// wrapping the last error; a non-retryable error is returned as is.
    pub async fn execute<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        mut op: F,
    ) -> Result<Retried<T>, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Retry succeeded on attempt {}", attempt);
                    }
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) if !error.is_retryable() => {
                    debug!("Attempt {} failed permanently: {}", attempt, error);
                    return Err(error);
                }
                Err(error) => {
                    if attempt > policy.max_retries {
                        warn!("Giving up after {} attempts: {}", attempt, error);
                        return Err(if attempt == 1 {
                            error
                        } else {
                            ProviderError::RetriesExhausted {
                                attempts: attempt,
                                last: Box::new(error),
                            }
                        });
                    }

                    let delay = self.delay_for(policy, attempt - 1, error.retry_after());
                    debug!(
                        "Attempt {} failed: {}, retrying in {:?}",
                        attempt, error, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Wait before retry number `retry` (0-based).
    pub fn delay_for(
        &self,
        policy: &RetryPolicy,
        retry: u32,
        retry_after: Option<Duration>,
    ) -> Duration {
        let base = policy.backoff(retry);
        let max_jitter = base.as_secs_f64() * policy.jitter_ratio.max(0.0).min(1.0);
        let jitter = if max_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..=max_jitter)
        } else {
            0.0
        };
        let delay = base + Duration::from_secs_f64(jitter);
        retry_after.map_or(delay, |hint| delay.max(hint))
    }
}
