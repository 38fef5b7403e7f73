//! Domain layer for model-collab
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Collaboration
//!
//! One client call fans a [`CollaborationRequest`] out to several providers
//! under a [`Strategy`], collects one [`ProviderOutcome`] per provider
//! attempted and merges the successful ones into a [`SynthesisResult`].
//!
//! ## Strategies
//!
//! - **Parallel**: every provider at once under one deadline
//! - **Sequential**: one provider at a time, optionally failing fast
//! - **Consensus**: repeated rounds until responses agree
//! - **Iterative**: draft and refine until quality stops improving

pub mod core;
pub mod orchestration;
pub mod provider;
pub mod synthesis;
pub mod util;

// Re-export commonly used types
pub use core::{
    error::{ErrorKind, SynthesisError},
    request::CollaborationRequest,
    response::{FinishReason, ProviderResponse, TokenUsage, current_timestamp},
};
pub use orchestration::{
    CollaborationResult, ConsensusConfig, IterativeConfig, ModelPricing, OutcomeError,
    PerformanceMetrics, PricingTable, ProviderMetrics, ProviderOutcome, Strategy, StrategyConfig,
    StrategyState, success_flags,
};
pub use provider::{
    ProviderCapabilities, ProviderConfig, ProviderHealth, ProviderId, ProviderStats,
    ProviderStatsSnapshot, RateLimitConfig, RetryPolicy,
};
pub use synthesis::{
    QualityScore, QualityScorer, QualityWeights, SynthesisEngine, SynthesisMethod,
    SynthesisOptions, SynthesisResult,
};
