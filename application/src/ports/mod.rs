//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod cache;
pub mod collaboration_logger;
pub mod metrics;
pub mod progress;
pub mod provider_adapter;
