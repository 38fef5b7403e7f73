//! Infrastructure layer for model-collab
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: HTTP provider adapters, the result cache,
//! the metrics sink, the JSONL transcript and configuration file loading.

pub mod cache;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod providers;

// Re-export commonly used types
pub use cache::MemoryCache;
pub use config::{ConfigError, ConfigIssue, ConfigLoader, FileConfig};
pub use logging::JsonlCollaborationLogger;
pub use metrics::TracingMetricsSink;
pub use providers::{AdapterRegistry, AnthropicAdapter, OpenAiCompatibleAdapter};
