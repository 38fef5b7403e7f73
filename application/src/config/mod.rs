//! Application-level configuration.
//!
//! - [`OrchestratorConfig`] — admission limits, strategy defaults, synthesis
//!   settings and cache lifetime of the collaboration orchestrator

pub mod orchestrator_config;

pub use orchestrator_config::{OrchestratorConfig, SynthesisSettings};
