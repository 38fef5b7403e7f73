//! Coordination strategies
//!
//! A [`Strategy`] is a closed set of variants matched explicitly by the
//! executor. Shared knobs (deadline, concurrency, fail-fast) live in
//! [`StrategyConfig`]; strategy-specific knobs travel inside the variant.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the consensus strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Fraction of agreeing response pairs required to stop (0.0 to 1.0)
    pub consensus_threshold: f64,
    /// Similarity at or above which two responses count as agreeing
    pub similarity_threshold: f64,
    /// Upper bound on rounds, including the first fan-out
    pub max_iterations: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: 0.7,
            similarity_threshold: 0.5,
            max_iterations: 3,
        }
    }
}

/// Settings for the iterative refinement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterativeConfig {
    /// Upper bound on calls, including the first draft
    pub max_iterations: usize,
    /// Minimum quality gain a refinement must bring to keep going
    pub improvement_threshold: f64,
    /// Hand each refinement to the next provider instead of the drafting one
    pub rotate_providers: bool,
}

impl Default for IterativeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            improvement_threshold: 0.05,
            rotate_providers: true,
        }
    }
}

/// How providers are coordinated during one collaboration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// Call every provider at once under one shared deadline
    #[default]
    Parallel,
    /// Call providers one at a time in the given order
    Sequential,
    /// Fan out repeatedly until responses agree
    Consensus(ConsensusConfig),
    /// Draft once, then refine until quality stops improving
    Iterative(IterativeConfig),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Parallel => "parallel",
            Strategy::Sequential => "sequential",
            Strategy::Consensus(_) => "consensus",
            Strategy::Iterative(_) => "iterative",
        }
    }

    /// Check the variant-specific settings. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        match self {
            Strategy::Parallel | Strategy::Sequential => {}
            Strategy::Consensus(cfg) => {
                if !(0.0..=1.0).contains(&cfg.consensus_threshold) {
                    errors.push("consensus_threshold must be between 0 and 1".to_string());
                }
                if !(0.0..=1.0).contains(&cfg.similarity_threshold) {
                    errors.push("similarity_threshold must be between 0 and 1".to_string());
                }
                if cfg.max_iterations == 0 {
                    errors.push("max_iterations must be at least 1".to_string());
                }
            }
            Strategy::Iterative(cfg) => {
                if cfg.max_iterations == 0 {
                    errors.push("max_iterations must be at least 1".to_string());
                }
                if !cfg.improvement_threshold.is_finite() || cfg.improvement_threshold < 0.0 {
                    errors.push("improvement_threshold must be a non-negative number".to_string());
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    /// Parse a strategy name; variant settings take their defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parallel" => Ok(Strategy::Parallel),
            "sequential" => Ok(Strategy::Sequential),
            "consensus" => Ok(Strategy::Consensus(ConsensusConfig::default())),
            "iterative" => Ok(Strategy::Iterative(IterativeConfig::default())),
            other => Err(format!(
                "Unknown strategy: {}. Valid: parallel, sequential, consensus, iterative",
                other
            )),
        }
    }
}

/// Knobs shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Deadline for the whole strategy run, in milliseconds
    pub timeout_ms: u64,
    /// Cap on simultaneously running provider calls within one collaboration
    pub max_concurrent_providers: usize,
    /// Sequential only: stop dispatching after the first failure
    pub fail_fast: bool,
}

impl StrategyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_max_concurrent_providers(mut self, max: usize) -> Self {
        self.max_concurrent_providers = max;
        self
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.timeout_ms == 0 {
            errors.push("timeout must be greater than 0".to_string());
        }
        if self.max_concurrent_providers == 0 {
            errors.push("max_concurrent_providers must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_concurrent_providers: 5,
            fail_fast: false,
        }
    }
}

/// Lifecycle of one strategy run.
///
/// ```text
/// Pending → Dispatching → Collecting → Evaluating → Completed
///                ↑                          │     ↘ Failed
///                └──────── next round ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyState {
    #[default]
    Pending,
    Dispatching,
    Collecting,
    Evaluating,
    Completed,
    Failed,
}

impl StrategyState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: StrategyState) -> bool {
        use StrategyState::*;
        matches!(
            (self, next),
            (Pending, Dispatching)
                | (Pending, Failed)
                | (Dispatching, Collecting)
                | (Dispatching, Failed)
                | (Collecting, Evaluating)
                | (Collecting, Failed)
                | (Evaluating, Dispatching)
                | (Evaluating, Completed)
                | (Evaluating, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StrategyState::Completed | StrategyState::Failed)
    }
}
