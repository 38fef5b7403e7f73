//! Provider domain: identity, configuration, health and statistics.

pub mod config;
pub mod stats;
pub mod value_objects;

pub use config::{ProviderConfig, RateLimitConfig, RetryPolicy};
pub use stats::{ProviderStats, ProviderStatsSnapshot};
pub use value_objects::{ProviderCapabilities, ProviderHealth, ProviderId};
