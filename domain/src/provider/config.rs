//! Provider configuration types (provider-neutral, serde-free).
//!
//! These types define the shape of provider settings without depending
//! on any serialization format (TOML, JSON, etc.). The infrastructure
//! layer converts its file representation into them.

use super::value_objects::ProviderId;
use std::time::Duration;

/// Token-bucket parameters for one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained admission rate
    pub tokens_per_minute: u32,
    /// Bucket capacity (maximum burst)
    pub burst_size: u32,
}

impl RateLimitConfig {
    /// Tokens added back to the bucket per second.
    pub fn refill_per_second(&self) -> f64 {
        self.tokens_per_minute as f64 / 60.0
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            tokens_per_minute: 60,
            burst_size: 10,
        }
    }
}

/// Retry/backoff policy applied around a single provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random jitter as a fraction of the computed delay
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (0-based), without jitter:
    /// `min(max_delay, base_delay * 2^retry)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_ratio: 0.25,
        }
    }
}

/// Settings for one registered provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: ProviderId,
    /// Adapter registry key: "openai", "anthropic", ...
    pub kind: String,
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    /// Per-attempt timeout for a single backend call
    pub timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
}

impl ProviderConfig {
    pub fn new(
        id: impl Into<ProviderId>,
        kind: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: String::new(),
            timeout: Duration::from_secs(30),
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check credentials, base URL and limits. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.id.as_str().trim().is_empty() {
            errors.push("provider id must not be empty".to_string());
        }
        if self.api_key.trim().is_empty() {
            errors.push(format!("provider {}: api key must not be empty", self.id));
        }
        match url::Url::parse(&self.base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
            _ => errors.push(format!(
                "provider {}: invalid base url '{}'",
                self.id, self.base_url
            )),
        }
        if self.timeout.is_zero() {
            errors.push(format!("provider {}: timeout must be greater than 0", self.id));
        }
        if self.rate_limit.burst_size == 0 || self.rate_limit.tokens_per_minute == 0 {
            errors.push(format!(
                "provider {}: rate limit must allow at least one request",
                self.id
            ));
        }
        let jitter = self.retry.jitter_ratio;
        if !(0.0..=1.0).contains(&jitter) {
            errors.push(format!(
                "provider {}: retry jitter_ratio must be between 0.0 and 1.0, got {}",
                self.id, jitter
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig::new("openai", "openai", "sk-test", "https://api.openai.com")
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_missing_key_and_bad_url() {
        let mut cfg = config();
        cfg.api_key = "  ".to_string();
        cfg.base_url = "not a url".to_string();

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("api key"));
        assert!(errors[1].contains("base url"));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let mut cfg = config();
        cfg.base_url = "ftp://example.com".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_jitter_ratio_must_be_a_fraction() {
        for jitter_ratio in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let cfg = config().with_retry(RetryPolicy {
                jitter_ratio,
                ..RetryPolicy::default()
            });
            let errors = cfg.validate().unwrap_err();
            assert_eq!(errors.len(), 1, "jitter_ratio = {jitter_ratio}");
            assert!(errors[0].contains("jitter_ratio"));
        }
        for jitter_ratio in [0.0, 0.5, 1.0] {
            let cfg = config().with_retry(RetryPolicy {
                jitter_ratio,
                ..RetryPolicy::default()
            });
            assert!(cfg.validate().is_ok(), "jitter_ratio = {jitter_ratio}");
        }
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter_ratio: 0.25,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_millis(1000));
        assert_eq!(policy.backoff(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_refill_rate() {
        let limit = RateLimitConfig {
            tokens_per_minute: 120,
            burst_size: 5,
        };
        assert_eq!(limit.refill_per_second(), 2.0);
    }
}
