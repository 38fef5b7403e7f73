//! Strategy execution engine
//!
//! Runs one of the closed set of [`Strategy`] variants against the provider
//! manager. Each run walks the state machine
//! `Pending → Dispatching → Collecting → Evaluating → {Completed | Failed}`,
//! looping back to `Dispatching` for multi-round strategies.
//!
//! Individual provider failures never raise: they are recorded as failed
//! outcomes. [`StrategyExecutionError`] is reserved for malformed input and
//! internal faults, and carries whatever outcomes were already collected.

mod consensus;
mod iterative;
mod parallel;
mod sequential;

use crate::ports::progress::ProgressNotifier;
use crate::providers::ProviderManager;
use collab_domain::{
    CollaborationRequest, ErrorKind, ProviderId, ProviderOutcome, QualityScorer, QualityWeights,
    Strategy, StrategyConfig, StrategyState,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Error, Debug, Clone)]
#[error("Strategy execution failed: {message}")]
pub struct StrategyExecutionError {
    pub message: String,
    /// Outcomes collected before the failure
    pub partial: Vec<ProviderOutcome>,
}

impl StrategyExecutionError {
    pub fn new(message: impl Into<String>, partial: Vec<ProviderOutcome>) -> Self {
        Self {
            message: message.into(),
            partial,
        }
    }
}

/// What a strategy run hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct StrategyOutput {
    pub strategy: Strategy,
    /// Exactly one per provider attempted, in dispatch order
    pub outcomes: Vec<ProviderOutcome>,
    pub state: StrategyState,
    /// Max of provider times for concurrent rounds, sum for sequential calls
    pub execution_time_ms: u64,
    pub rounds: usize,
    /// Agreement of the returned round (consensus only)
    pub consensus_level: Option<f64>,
}

impl StrategyOutput {
    pub fn success(&self) -> bool {
        self.outcomes.iter().any(|o| o.success)
    }
}

/// Everything one strategy run needs, borrowed for the duration of the run.
pub(crate) struct RunContext<'a> {
    pub manager: &'a Arc<ProviderManager>,
    pub providers: &'a [ProviderId],
    pub request: &'a CollaborationRequest,
    pub config: &'a StrategyConfig,
    pub progress: &'a dyn ProgressNotifier,
    pub scorer: &'a QualityScorer,
    /// One deadline for the whole run, shared by every dispatch
    pub deadline: Instant,
}

impl RunContext<'_> {
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Fan out to `providers` with what is left of the run's deadline and
    /// the concurrency cap. Once the deadline has passed nothing is called
    /// and every provider comes back as Timeout.
    pub async fn dispatch(
        &self,
        providers: &[ProviderId],
        request: &CollaborationRequest,
    ) -> Vec<ProviderOutcome> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return providers.iter().map(not_dispatched).collect();
        }
        self.manager
            .fan_out(
                providers,
                request,
                remaining,
                self.config.max_concurrent_providers,
                self.progress,
            )
            .await
    }
}

/// Timeout outcome for a provider the run never reached before its deadline.
pub(crate) fn not_dispatched(id: &ProviderId) -> ProviderOutcome {
    ProviderOutcome::failure(
        id.clone(),
        ErrorKind::Timeout,
        "strategy deadline elapsed before dispatch",
        0,
        0,
    )
}

/// State machine of one run.
pub(crate) struct RunState {
    state: StrategyState,
    pub rounds: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            state: StrategyState::Pending,
            rounds: 0,
        }
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn advance(
        &mut self,
        next: StrategyState,
        collected: &[ProviderOutcome],
    ) -> Result<(), StrategyExecutionError> {
        if !self.state.can_transition_to(next) {
            return Err(StrategyExecutionError::new(
                format!("illegal state transition {:?} -> {:?}", self.state, next),
                collected.to_vec(),
            ));
        }
        debug!(from = ?self.state, to = ?next, "Strategy state transition");
        if next == StrategyState::Dispatching {
            self.rounds += 1;
        }
        self.state = next;
        Ok(())
    }

    /// Terminal state from the collected outcomes.
    pub fn finish(
        &mut self,
        outcomes: &[ProviderOutcome],
    ) -> Result<StrategyState, StrategyExecutionError> {
        let terminal = if outcomes.iter().any(|o| o.success) {
            StrategyState::Completed
        } else {
            StrategyState::Failed
        };
        self.advance(terminal, outcomes)?;
        Ok(terminal)
    }
}

/// A fan-out must hand back exactly one outcome per dispatched provider.
pub(crate) fn ensure_complete(
    outcomes: &[ProviderOutcome],
    dispatched: usize,
) -> Result<(), StrategyExecutionError> {
    if outcomes.len() != dispatched {
        return Err(StrategyExecutionError::new(
            format!(
                "expected {} outcomes, collected {}",
                dispatched,
                outcomes.len()
            ),
            outcomes.to_vec(),
        ));
    }
    Ok(())
}

pub(crate) fn max_time(outcomes: &[ProviderOutcome]) -> u64 {
    outcomes.iter().map(|o| o.execution_time_ms).max().unwrap_or(0)
}

pub(crate) fn sum_time(outcomes: &[ProviderOutcome]) -> u64 {
    outcomes.iter().map(|o| o.execution_time_ms).sum()
}

pub(crate) fn successful_contents(outcomes: &[ProviderOutcome]) -> Vec<&str> {
    outcomes.iter().filter_map(|o| o.content()).collect()
}

/// Runs strategies against a shared provider manager.
pub struct StrategyExecutor {
    manager: Arc<ProviderManager>,
    scorer: QualityScorer,
}

impl StrategyExecutor {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            manager,
            scorer: QualityScorer::new(QualityWeights::default(), 0.5),
        }
    }

    /// Quality function used by the iterative strategy to measure improvement.
    pub fn with_quality(mut self, weights: QualityWeights, similarity_threshold: f64) -> Self {
        self.scorer = QualityScorer::new(weights, similarity_threshold);
        self
    }

    pub fn manager(&self) -> &Arc<ProviderManager> {
        &self.manager
    }

    pub async fn execute(
        &self,
        strategy: &Strategy,
        providers: &[ProviderId],
        request: &CollaborationRequest,
        config: &StrategyConfig,
        progress: &dyn ProgressNotifier,
    ) -> Result<StrategyOutput, StrategyExecutionError> {
        validate(strategy, providers, config)?;

        info!(
            strategy = strategy.name(),
            providers = providers.len(),
            "Starting strategy"
        );
        progress.on_strategy_start(strategy, providers);

        let ctx = RunContext {
            manager: &self.manager,
            providers,
            request,
            config,
            progress,
            scorer: &self.scorer,
            deadline: Instant::now() + config.timeout(),
        };
        let result = match strategy {
            Strategy::Parallel => parallel::run(&ctx).await,
            Strategy::Sequential => sequential::run(&ctx).await,
            Strategy::Consensus(cfg) => consensus::run(&ctx, cfg).await,
            Strategy::Iterative(cfg) => iterative::run(&ctx, cfg).await,
        };

        match &result {
            Ok(output) => {
                info!(
                    strategy = strategy.name(),
                    succeeded = output.outcomes.iter().filter(|o| o.success).count(),
                    attempted = output.outcomes.len(),
                    rounds = output.rounds,
                    "Strategy finished"
                );
                progress.on_strategy_complete(strategy, output.success());
            }
            Err(_) => progress.on_strategy_complete(strategy, false),
        }
        result
    }
}

fn validate(
    strategy: &Strategy,
    providers: &[ProviderId],
    config: &StrategyConfig,
) -> Result<(), StrategyExecutionError> {
    let mut errors = Vec::new();
    if providers.is_empty() {
        errors.push("provider list is empty".to_string());
    }
    let mut seen = HashSet::new();
    for id in providers {
        if !seen.insert(id) {
            errors.push(format!("provider {} listed more than once", id));
        }
    }
    if let Err(e) = config.validate() {
        errors.extend(e);
    }
    if let Err(e) = strategy.validate() {
        errors.extend(e);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StrategyExecutionError::new(errors.join("; "), Vec::new()))
    }
}
