//! Provider adapters
//!
//! [`AdapterRegistry`] maps a provider `kind` string from configuration to
//! the constructor of the matching adapter. The built-in table knows
//! `"openai"` and `"anthropic"`; more kinds can be registered at startup.

pub mod anthropic;
pub mod http;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiCompatibleAdapter;

use collab_application::{AdapterFactory, ProviderAdapter, ProviderError};
use collab_domain::ProviderConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an adapter for one provider configuration.
pub type AdapterConstructor =
    fn(&ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError>;

pub struct AdapterRegistry {
    constructors: HashMap<String, AdapterConstructor>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in HTTP adapters.
    pub fn with_builtin() -> Self {
        Self::new()
            .with_kind(openai::KIND, |config| {
                Ok(Arc::new(OpenAiCompatibleAdapter::new(config)?))
            })
            .with_kind(anthropic::KIND, |config| {
                Ok(Arc::new(AnthropicAdapter::new(config)?))
            })
    }

    pub fn with_kind(mut self, kind: impl Into<String>, constructor: AdapterConstructor) -> Self {
        self.constructors.insert(kind.into().to_lowercase(), constructor);
        self
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.constructors.contains_key(&kind.to_lowercase())
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl AdapterFactory for AdapterRegistry {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let constructor = self
            .constructors
            .get(&config.kind.to_lowercase())
            .ok_or_else(|| {
                ProviderError::Other(format!(
                    "unknown provider kind '{}' (known: {})",
                    config.kind,
                    self.kinds().join(", ")
                ))
            })?;
        constructor(config)
    }
}
