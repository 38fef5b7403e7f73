//! Provider entries from TOML (`[[providers]]` array)

use super::ConfigIssue;
use crate::providers::{anthropic, openai};
use collab_domain::{ProviderConfig, RateLimitConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One `[[providers]]` table.
///
/// ```toml
/// [[providers]]
/// id = "gpt"
/// kind = "openai"
/// api_key_env = "OPENAI_API_KEY"
/// default_model = "gpt-4o-mini"
/// tokens_per_minute = 120
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    pub id: String,
    /// Adapter kind: "openai" or "anthropic"
    pub kind: String,
    pub enabled: bool,
    /// Inline key (prefer `api_key_env`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key; defaults per kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Defaults to the vendor's public endpoint for known kinds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub default_model: String,
    /// Falls back to `server.request_timeout_ms`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub tokens_per_minute: u32,
    pub burst_size: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ratio: f64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        let rate = RateLimitConfig::default();
        let retry = RetryPolicy::default();
        Self {
            id: String::new(),
            kind: openai::KIND.to_string(),
            enabled: true,
            api_key: None,
            api_key_env: None,
            base_url: None,
            default_model: String::new(),
            timeout_ms: None,
            tokens_per_minute: rate.tokens_per_minute,
            burst_size: rate.burst_size,
            max_retries: retry.max_retries,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            jitter_ratio: retry.jitter_ratio,
        }
    }
}

impl FileProviderConfig {
    fn field(&self, name: &str) -> String {
        if self.id.is_empty() {
            format!("providers.{}", name)
        } else {
            format!("providers.{}.{}", self.id, name)
        }
    }

    /// Environment variable consulted for the key.
    pub fn key_env(&self) -> Option<String> {
        if let Some(env) = &self.api_key_env {
            return Some(env.clone());
        }
        match self.kind.to_lowercase().as_str() {
            openai::KIND => Some("OPENAI_API_KEY".to_string()),
            anthropic::KIND => Some("ANTHROPIC_API_KEY".to_string()),
            _ => None,
        }
    }

    pub fn resolved_base_url(&self) -> Option<String> {
        if let Some(url) = &self.base_url {
            return Some(url.clone());
        }
        match self.kind.to_lowercase().as_str() {
            openai::KIND => Some("https://api.openai.com".to_string()),
            anthropic::KIND => Some("https://api.anthropic.com".to_string()),
            _ => None,
        }
    }

    /// Resolve credentials through `lookup_env` and build the runtime
    /// config. Fails when no key or base URL can be determined.
    pub fn to_provider_config(
        &self,
        default_timeout: Duration,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Result<ProviderConfig, ConfigIssue> {
        let api_key = match &self.api_key {
            Some(key) => key.clone(),
            None => {
                let env = self.key_env().ok_or_else(|| {
                    ConfigIssue::new(self.field("api_key"), "no api_key or api_key_env set")
                })?;
                lookup_env(&env)
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigIssue::new(
                            self.field("api_key"),
                            format!("environment variable {} is not set", env),
                        )
                    })?
            }
        };
        let base_url = self.resolved_base_url().ok_or_else(|| {
            ConfigIssue::new(
                self.field("base_url"),
                format!("required for provider kind '{}'", self.kind),
            )
        })?;

        Ok(ProviderConfig::new(self.id.as_str(), self.kind.to_lowercase(), api_key, base_url)
            .with_default_model(self.default_model.clone())
            .with_timeout(
                self.timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_timeout),
            )
            .with_rate_limit(RateLimitConfig {
                tokens_per_minute: self.tokens_per_minute,
                burst_size: self.burst_size,
            })
            .with_retry(RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.base_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                jitter_ratio: self.jitter_ratio,
            }))
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.id.trim().is_empty() {
            issues.push(ConfigIssue::new(self.field("id"), "must not be empty"));
        }
        if self.kind.trim().is_empty() {
            issues.push(ConfigIssue::new(self.field("kind"), "must not be empty"));
        }
        if self.timeout_ms == Some(0) {
            issues.push(ConfigIssue::new(
                self.field("timeout_ms"),
                "must be greater than 0",
            ));
        }
        if self.tokens_per_minute == 0 || self.burst_size == 0 {
            issues.push(ConfigIssue::new(
                self.field("rate_limit"),
                "tokens_per_minute and burst_size must be at least 1",
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            issues.push(ConfigIssue::new(
                self.field("base_delay_ms"),
                "must not exceed max_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            issues.push(ConfigIssue::new(
                self.field("jitter_ratio"),
                "must be between 0 and 1",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str) -> FileProviderConfig {
        FileProviderConfig {
            id: "main".into(),
            kind: kind.into(),
            default_model: "model-x".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_from_default_env_var() {
        let config = entry("anthropic")
            .to_provider_config(Duration::from_secs(30), |name| {
                (name == "ANTHROPIC_API_KEY").then(|| "sk-ant".to_string())
            })
            .unwrap();

        assert_eq!(config.api_key, "sk-ant");
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.kind, "anthropic");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inline_key_and_overrides() {
        let mut file = entry("OpenAI");
        file.api_key = Some("sk-inline".into());
        file.base_url = Some("http://localhost:11434".into());
        file.timeout_ms = Some(5_000);
        file.max_retries = 0;

        let config = file
            .to_provider_config(Duration::from_secs(30), |_| None)
            .unwrap();
        assert_eq!(config.api_key, "sk-inline");
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.kind, "openai");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn test_missing_env_key_names_variable() {
        let mut file = entry("openai");
        file.api_key_env = Some("MY_KEY".into());
        let issue = file
            .to_provider_config(Duration::from_secs(30), |_| Some("  ".into()))
            .unwrap_err();
        assert_eq!(issue.field, "providers.main.api_key");
        assert!(issue.message.contains("MY_KEY"));
    }

    #[test]
    fn test_unknown_kind_needs_base_url() {
        let mut file = entry("local");
        file.api_key = Some("k".into());
        let issue = file
            .to_provider_config(Duration::from_secs(30), |_| None)
            .unwrap_err();
        assert_eq!(issue.field, "providers.main.base_url");
    }

    #[test]
    fn test_validate_collects_issues() {
        let file = FileProviderConfig {
            timeout_ms: Some(0),
            burst_size: 0,
            jitter_ratio: 2.0,
            ..Default::default()
        };
        let mut issues = Vec::new();
        file.validate(&mut issues);
        assert_eq!(issues.len(), 4);
        assert_eq!(issues[0].field, "providers.id");
    }
}
