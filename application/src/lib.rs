//! Application layer for model-collab
//!
//! This crate contains the provider manager, the strategy engine, use cases
//! and port definitions. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod protocol;
pub mod providers;
pub mod resilience;
pub mod strategy;
pub mod use_cases;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{OrchestratorConfig, SynthesisSettings};
pub use ports::{
    cache::{CollaborationCache, NoCache},
    collaboration_logger::{CollaborationEvent, CollaborationLogger, NoCollaborationLogger},
    metrics::{MetricsSink, NoMetrics},
    progress::{NoProgress, ProgressNotifier},
    provider_adapter::{
        AdapterFactory, HealthStatus, ProviderAdapter, ProviderError, RequestValidation,
    },
};
pub use protocol::{CollaborationService, ExecuteParams, ProtocolError, SynthesisParams};
pub use providers::{ProviderManager, ProviderManagerError};
pub use resilience::{RateLimitError, RateLimitState, RateLimiter, Retried, RetryHandler};
pub use strategy::{StrategyExecutionError, StrategyExecutor, StrategyOutput};
pub use use_cases::create_synthesis::{CreateSynthesisInput, CreateSynthesisUseCase};
pub use use_cases::run_collaboration::{
    CollaborationError, CollaborationOrchestrator, RunCollaborationInput, new_collaboration_id,
};
