//! Per-provider token-bucket rate limiter.

use collab_domain::{ProviderId, RateLimitConfig};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Rate limit exceeded, retry after {}ms", .retry_after.as_millis())]
pub struct RateLimitError {
    pub retry_after: Duration,
}

/// Admission view of one bucket at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitState {
    /// Whether a call would be admitted now
    pub allowed: bool,
    /// Whole tokens left in the bucket
    pub remaining: u32,
    /// When the bucket is back at full capacity
    pub reset_at: Instant,
    /// Wait until the next token, when none is available
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_second: f64,
    last_refill: Instant,
}

/// Slowest refill a bucket accepts: one token per minute.
const MIN_REFILL_PER_SECOND: f64 = 1.0 / 60.0;

impl Bucket {
    fn new(config: &RateLimitConfig, now: Instant) -> Self {
        let capacity = config.burst_size.max(1) as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_per_second: config.refill_per_second().max(MIN_REFILL_PER_SECOND),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;
    }

    fn seconds_until(&self, tokens: f64) -> f64 {
        ((tokens - self.tokens).max(0.0) / self.refill_per_second).max(0.0)
    }

    fn state(&self, now: Instant) -> RateLimitState {
        let allowed = self.tokens >= 1.0;
        let retry_after = (!allowed).then(|| {
            // round up so that waiting exactly `retry_after` always suffices
            Duration::from_millis((self.seconds_until(1.0) * 1000.0).ceil() as u64)
                .max(Duration::from_millis(1))
        });
        RateLimitState {
            allowed,
            remaining: self.tokens.floor() as u32,
            reset_at: now + Duration::from_secs_f64(self.seconds_until(self.capacity)),
            retry_after,
        }
    }
}

/// Token buckets keyed by provider.
///
/// Every operation refills and inspects a bucket under one short lock that is
/// never held across an await, so concurrent fan-outs to the same provider
/// never lose an update. Providers without a bucket are not limited.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<ProviderId, Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the bucket of `provider`, starting full. A zero
    /// rate or burst is raised to one token per minute and a burst of one.
    pub fn register(&self, provider: &ProviderId, config: &RateLimitConfig) {
        let bucket = Bucket::new(config, Instant::now());
        self.lock().insert(provider.clone(), bucket);
    }

    pub fn unregister(&self, provider: &ProviderId) {
        self.lock().remove(provider);
    }

    /// Report whether a call would be admitted, without consuming a token.
    pub fn admit(&self, provider: &ProviderId) -> RateLimitState {
        let now = Instant::now();
        let mut buckets = self.lock();
        match buckets.get_mut(provider) {
            Some(bucket) => {
                bucket.refill(now);
                bucket.state(now)
            }
            None => unlimited(now),
        }
    }

    /// Take one token, or fail with the time until one is available.
    pub fn consume(&self, provider: &ProviderId) -> Result<RateLimitState, RateLimitError> {
        let now = Instant::now();
        let mut buckets = self.lock();
        let Some(bucket) = buckets.get_mut(provider) else {
            return Ok(unlimited(now));
        };

        bucket.refill(now);
        let state = bucket.state(now);
        if let Some(retry_after) = state.retry_after {
            debug!(provider = %provider, ?retry_after, "Rate limit bucket exhausted");
            return Err(RateLimitError { retry_after });
        }
        bucket.tokens -= 1.0;
        Ok(bucket.state(now))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ProviderId, Bucket>> {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unlimited(now: Instant) -> RateLimitState {
    RateLimitState {
        allowed: true,
        remaining: u32::MAX,
        reset_at: now,
        retry_after: None,
    }
}
