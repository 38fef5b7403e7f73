//! Raw TOML configuration data types
//!
//! These structs mirror the config file one-to-one. Every section is
//! `#[serde(default)]`, so a partial file (or none at all) is valid.
//! Conversion methods turn them into the application-layer types.

mod cache;
mod logging;
mod providers;
mod server;
mod strategy;
mod synthesis;

pub use cache::FileCacheConfig;
pub use logging::FileLoggingConfig;
pub use providers::FileProviderConfig;
pub use server::FileServerConfig;
pub use strategy::FileStrategyConfig;
pub use synthesis::FileSynthesisConfig;

use collab_application::OrchestratorConfig;
use collab_domain::{PricingTable, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// One problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path of the offending key, e.g. `strategy.timeout_ms`
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration:\n{}", render_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: FileServerConfig,
    pub strategy: FileStrategyConfig,
    pub synthesis: FileSynthesisConfig,
    pub cache: FileCacheConfig,
    pub providers: Vec<FileProviderConfig>,
    /// USD per 1k tokens, keyed by model name
    pub pricing: PricingTable,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning every issue found.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        self.server.validate(&mut issues);
        self.strategy.validate(&mut issues);
        self.synthesis.validate(&mut issues);

        let mut seen = HashSet::new();
        for provider in &self.providers {
            provider.validate(&mut issues);
            if !provider.id.is_empty() && !seen.insert(provider.id.as_str()) {
                issues.push(ConfigIssue::new(
                    format!("providers.{}", provider.id),
                    "duplicate provider id",
                ));
            }
        }

        for (model, pricing) in self.pricing.iter() {
            if pricing.prompt_per_1k < 0.0 || pricing.completion_per_1k < 0.0 {
                issues.push(ConfigIssue::new(
                    format!("pricing.{}", model),
                    "prices must not be negative",
                ));
            }
        }

        issues
    }

    /// `validate()` as a `Result`.
    pub fn check(&self) -> Result<(), ConfigError> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_max_concurrent_requests(self.server.max_concurrent_requests)
            .with_queue_capacity(self.server.queue_capacity)
            .with_strategy(self.strategy.to_strategy_config())
            .with_synthesis(self.synthesis.to_settings())
            .with_cache_ttl(self.cache.ttl())
    }

    pub fn default_provider_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// Runtime configs for every enabled provider, resolving keys from
    /// the process environment. Entries that cannot be resolved come back
    /// as issues so the caller can skip them.
    pub fn provider_configs(&self) -> Vec<Result<ProviderConfig, ConfigIssue>> {
        self.provider_configs_with(|name| std::env::var(name).ok())
    }

    pub fn provider_configs_with(
        &self,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Vec<Result<ProviderConfig, ConfigIssue>> {
        let timeout = self.default_provider_timeout();
        self.providers
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.to_provider_config(timeout, &lookup_env))
            .collect()
    }
}
