//! Orchestrator configuration.
//!
//! [`OrchestratorConfig`] groups the static settings of the
//! [`CollaborationOrchestrator`](crate::use_cases::run_collaboration::CollaborationOrchestrator).
//! Per-call overrides (strategy config, synthesis method) travel in the
//! use case input instead.

use collab_domain::{StrategyConfig, SynthesisMethod, SynthesisOptions};
use std::time::Duration;

/// How finished strategy outcomes are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisSettings {
    /// When false, the first successful response is passed through unmerged
    pub enabled: bool,
    pub method: SynthesisMethod,
    pub options: SynthesisOptions,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            method: SynthesisMethod::Consensus,
            options: SynthesisOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Collaborations allowed to run at once
    pub max_concurrent_requests: usize,
    /// Collaborations allowed to wait for a slot; beyond this calls are rejected
    pub queue_capacity: usize,
    /// Used when a call brings no strategy config of its own
    pub strategy: StrategyConfig,
    pub synthesis: SynthesisSettings,
    /// Lifetime of cached results
    pub cache_ttl: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            queue_capacity: 100,
            strategy: StrategyConfig::default(),
            synthesis: SynthesisSettings::default(),
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl OrchestratorConfig {
    // ==================== Builder Methods ====================

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisSettings) -> Self {
        self.synthesis = synthesis;
        self
    }

    pub fn without_synthesis(mut self) -> Self {
        self.synthesis.enabled = false;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.max_concurrent_requests == 0 {
            errors.push("max_concurrent_requests must be at least 1".to_string());
        }
        if let Err(e) = self.strategy.validate() {
            errors.extend(e);
        }
        if let Err(e) = self.synthesis.options.validate() {
            errors.push(e.to_string());
        }
        if self.synthesis.method == SynthesisMethod::PassThrough {
            errors.push("pass_through is not a configurable synthesis method".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
