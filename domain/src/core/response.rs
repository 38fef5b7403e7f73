//! Provider response value objects

use crate::provider::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Accumulate another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Why a provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of output or a stop sequence was hit
    #[default]
    Stop,
    /// Output was cut at `max_tokens`
    Length,
    /// Output was withheld by a provider-side filter
    ContentFilter,
    /// Anything the adapter could not map
    Unknown,
}

impl FinishReason {
    /// Map the raw stop/finish reason strings used by common backends.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" | "refusal" => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }

    /// Whether the output was truncated before the model finished.
    pub fn is_truncated(&self) -> bool {
        matches!(self, FinishReason::Length)
    }
}

/// A successful provider completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    #[serde(default)]
    pub usage: TokenUsage,
    /// Wall-clock latency of the call that produced this response
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub finish_reason: FinishReason,
    pub provider: ProviderId,
    #[serde(default)]
    pub model: String,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ProviderResponse {
    pub fn new(
        provider: impl Into<ProviderId>,
        model: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            latency_ms: 0,
            finish_reason: FinishReason::Stop,
            provider: provider.into(),
            model: model.into(),
            timestamp: current_timestamp(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }

    #[test]
    fn test_token_usage_add() {
        let mut total = TokenUsage::new(10, 5);
        total.add(&TokenUsage::new(1, 2));
        assert_eq!(total, TokenUsage::new(11, 7));
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_provider("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_provider("max_tokens"), FinishReason::Length);
        assert_eq!(FinishReason::from_provider("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_provider("whatever"), FinishReason::Unknown);
        assert!(FinishReason::Length.is_truncated());
    }

    #[test]
    fn test_response_builder() {
        let response = ProviderResponse::new("openai", "gpt-4.1", "hello")
            .with_latency_ms(120)
            .with_metadata("request_id", serde_json::json!("abc"));

        assert_eq!(response.provider.as_str(), "openai");
        assert_eq!(response.latency_ms, 120);
        assert!(response.timestamp > 0);
        assert_eq!(response.metadata["request_id"], "abc");
    }
}
