//! Progress reporting for collaboration runs

use collab_application::ports::progress::ProgressNotifier;
use collab_domain::{ProviderId, ProviderOutcome, Strategy};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Reports progress with one progress bar per dispatch round
pub struct ProgressReporter {
    multi: MultiProgress,
    round_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            round_bar: Mutex::new(None),
        }
    }

    fn round_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn round_name(round: usize) -> String {
        format!("Round {}", round)
    }

    fn outcome_line(outcome: &ProviderOutcome) -> String {
        match outcome.error_kind() {
            None => format!(
                "{} {} ({} ms)",
                "v".green(),
                outcome.provider,
                outcome.execution_time_ms
            ),
            Some(kind) => format!("{} {} ({})", "x".red(), outcome.provider, kind),
        }
    }

    fn finish_round(&self) {
        let mut guard = self
            .round_bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pb) = guard.take() {
            pb.finish_with_message("done".green().to_string());
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_strategy_start(&self, strategy: &Strategy, providers: &[ProviderId]) {
        let _ = self.multi.println(format!(
            "{} {} strategy with {} provider(s)",
            "->".cyan(),
            strategy.name().bold(),
            providers.len()
        ));
    }

    fn on_round_start(&self, round: usize, providers: usize) {
        self.finish_round();

        let pb = self.multi.add(ProgressBar::new(providers as u64));
        pb.set_style(Self::round_style());
        pb.set_prefix(Self::round_name(round));
        pb.set_message("Waiting for providers...");

        *self
            .round_bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(pb);
    }

    fn on_provider_complete(&self, outcome: &ProviderOutcome) {
        let guard = self
            .round_bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pb) = guard.as_ref() {
            pb.set_message(Self::outcome_line(outcome));
            pb.inc(1);
        }
    }

    fn on_strategy_complete(&self, strategy: &Strategy, success: bool) {
        self.finish_round();
        let status = if success {
            "complete".green()
        } else {
            "failed".red()
        };
        let _ = self
            .multi
            .println(format!("{} {} {}", "->".cyan(), strategy.name().bold(), status));
    }
}

/// Simple text-based progress (no fancy UI), written to stderr
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_strategy_start(&self, strategy: &Strategy, providers: &[ProviderId]) {
        let names: Vec<&str> = providers.iter().map(|p| p.as_str()).collect();
        eprintln!(
            "{} {} strategy ({})",
            "->".cyan(),
            strategy.name().bold(),
            names.join(", ")
        );
    }

    fn on_round_start(&self, round: usize, providers: usize) {
        eprintln!("  {} ({} provider(s))", ProgressReporter::round_name(round), providers);
    }

    fn on_provider_complete(&self, outcome: &ProviderOutcome) {
        eprintln!("    {}", ProgressReporter::outcome_line(outcome));
    }

    fn on_strategy_complete(&self, _strategy: &Strategy, _success: bool) {
        eprintln!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collab_domain::{ErrorKind, ProviderResponse};

    #[test]
    fn test_outcome_line() {
        colored::control::set_override(false);
        let ok = ProviderOutcome::success(ProviderResponse::new("gpt", "m", "x"), 42);
        assert_eq!(ProgressReporter::outcome_line(&ok), "v gpt (42 ms)");

        let failed = ProviderOutcome::failure("claude", ErrorKind::RateLimited, "slow down", 3, 10);
        assert_eq!(
            ProgressReporter::outcome_line(&failed),
            "x claude (rate_limited)"
        );
    }

    #[test]
    fn test_reporter_tracks_rounds_without_panicking() {
        let reporter = ProgressReporter::new();
        let providers: Vec<ProviderId> = vec!["a".into(), "b".into()];
        reporter.on_strategy_start(&Strategy::Parallel, &providers);
        reporter.on_round_start(1, 2);
        reporter.on_provider_complete(&ProviderOutcome::timeout("a", 5));
        reporter.on_round_start(2, 2);
        assert!(reporter.round_bar.lock().unwrap().is_some());
        reporter.on_strategy_complete(&Strategy::Parallel, false);
        assert!(reporter.round_bar.lock().unwrap().is_none());
    }
}
