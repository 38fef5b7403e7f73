//! Collaboration orchestration domain
//!
//! Strategy definitions, per-provider outcomes and the assembled
//! collaboration result.

pub mod pricing;
pub mod strategy;
pub mod value_objects;

pub use pricing::{ModelPricing, PricingTable};
pub use strategy::{ConsensusConfig, IterativeConfig, Strategy, StrategyConfig, StrategyState};
pub use value_objects::{
    CollaborationResult, OutcomeError, PerformanceMetrics, ProviderMetrics, ProviderOutcome,
    success_flags,
};
