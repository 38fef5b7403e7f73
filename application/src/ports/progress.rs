//! Progress notification port
//!
//! Defines the interface for reporting progress while a strategy runs.

use collab_domain::{ProviderId, ProviderOutcome, Strategy};

/// Callback for progress updates during a collaboration
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console, web UI, etc.)
pub trait ProgressNotifier: Send + Sync {
    /// Called when a strategy starts with its resolved providers
    fn on_strategy_start(&self, strategy: &Strategy, providers: &[ProviderId]);

    /// Called when a dispatch round (or a sequential step) starts
    fn on_round_start(&self, _round: usize, _providers: usize) {}

    /// Called as soon as one provider call resolves
    fn on_provider_complete(&self, outcome: &ProviderOutcome);

    /// Called when the strategy finishes
    fn on_strategy_complete(&self, strategy: &Strategy, success: bool);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_strategy_start(&self, _strategy: &Strategy, _providers: &[ProviderId]) {}
    fn on_provider_complete(&self, _outcome: &ProviderOutcome) {}
    fn on_strategy_complete(&self, _strategy: &Strategy, _success: bool) {}
}
