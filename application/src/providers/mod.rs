//! Provider registry and call plumbing.

pub mod manager;

pub use manager::{ProviderManager, ProviderManagerError};
