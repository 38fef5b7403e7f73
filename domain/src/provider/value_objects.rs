//! Provider identity, health and capability value objects.

use crate::core::response::current_timestamp;
use serde::{Deserialize, Serialize};

/// Stable identifier of a registered provider (e.g. `"openai"`, `"claude-eu"`).
///
/// Ordering is lexical; it is the final tie-breaker when ranking responses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ProviderId> for ProviderId {
    fn from(id: &ProviderId) -> Self {
        id.clone()
    }
}

/// Health snapshot of a provider, owned and mutated by the provider manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub last_latency_ms: Option<u64>,
    /// Milliseconds since the Unix epoch of the last update
    pub last_checked: u64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ProviderHealth {
    /// Health right after a successful registration probe.
    pub fn healthy(latency_ms: Option<u64>) -> Self {
        Self {
            healthy: true,
            last_latency_ms: latency_ms,
            last_checked: current_timestamp(),
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// Record a successful call.
    pub fn mark_success(&mut self, latency_ms: u64) {
        self.healthy = true;
        self.last_latency_ms = Some(latency_ms);
        self.last_checked = current_timestamp();
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    /// Record a failed call. `fatal` failures (bad credentials) flip the
    /// provider to unhealthy immediately.
    pub fn mark_failure(&mut self, error: impl Into<String>, fatal: bool) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_checked = current_timestamp();
        self.last_error = Some(error.into());
        if fatal {
            self.healthy = false;
        }
    }

    /// Apply the result of an explicit health probe.
    pub fn apply_probe(&mut self, healthy: bool, latency_ms: Option<u64>) {
        self.healthy = healthy;
        self.last_latency_ms = latency_ms.or(self.last_latency_ms);
        self.last_checked = current_timestamp();
        if healthy {
            self.consecutive_failures = 0;
            self.last_error = None;
        }
    }
}

/// Static capability metadata exposed by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub models: Vec<String>,
    pub max_context_tokens: u32,
    pub supports_streaming: bool,
    pub supports_system_prompt: bool,
}

impl ProviderCapabilities {
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_ordering_is_lexical() {
        let mut ids = vec![ProviderId::from("b"), ProviderId::from("a"), ProviderId::from("c")];
        ids.sort();
        assert_eq!(ids, vec!["a".into(), "b".into(), "c".into()]);
    }

    #[test]
    fn test_provider_id_serializes_as_string() {
        let json = serde_json::to_string(&ProviderId::from("openai")).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn test_health_failure_tracking() {
        let mut health = ProviderHealth::healthy(Some(40));
        health.mark_failure("timeout", false);
        health.mark_failure("timeout", false);
        assert!(health.healthy);
        assert_eq!(health.consecutive_failures, 2);

        health.mark_success(55);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.last_latency_ms, Some(55));
        assert!(health.last_error.is_none());
    }

    #[test]
    fn test_fatal_failure_marks_unhealthy() {
        let mut health = ProviderHealth::healthy(None);
        health.mark_failure("invalid api key", true);
        assert!(!health.healthy);

        health.apply_probe(true, Some(10));
        assert!(health.healthy);
    }

    #[test]
    fn test_empty_model_list_supports_everything() {
        let caps = ProviderCapabilities {
            models: vec![],
            max_context_tokens: 8192,
            supports_streaming: false,
            supports_system_prompt: true,
        };
        assert!(caps.supports_model("anything"));
    }
}
