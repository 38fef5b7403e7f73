//! Call admission and retry around individual provider calls.

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimitError, RateLimitState, RateLimiter};
pub use retry::{Retried, RetryHandler};
