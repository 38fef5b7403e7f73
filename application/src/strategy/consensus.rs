//! Consensus strategy: fan out until the responses agree.
//!
//! Round 1 is a plain parallel fan-out. While agreement stays below
//! `consensus_threshold`, every provider is asked again with the previous
//! round's answers as context. The run always stops after `max_iterations`
//! rounds, or once the run's deadline has passed, and returns the round with
//! the highest agreement together with the agreement it actually reached.
//! Between rounds of equal agreement the one with more successful responses
//! wins, then the later one.

use super::{
    RunContext, RunState, StrategyExecutionError, StrategyOutput, ensure_complete, max_time,
    successful_contents,
};
use collab_domain::synthesis::similarity::pairwise_agreement;
use collab_domain::{ConsensusConfig, ProviderOutcome, Strategy, StrategyState};
use tracing::{debug, info};

struct Round {
    outcomes: Vec<ProviderOutcome>,
    agreement: f64,
    successes: usize,
}

impl Round {
    fn new(outcomes: Vec<ProviderOutcome>, agreement: f64) -> Self {
        let successes = outcomes.iter().filter(|o| o.success).count();
        Self {
            outcomes,
            agreement,
            successes,
        }
    }

    fn supersedes(&self, best: &Round) -> bool {
        self.agreement > best.agreement
            || (self.agreement == best.agreement && self.successes >= best.successes)
    }
}

pub(super) async fn run(
    ctx: &RunContext<'_>,
    cfg: &ConsensusConfig,
) -> Result<StrategyOutput, StrategyExecutionError> {
    let mut run = RunState::new();
    let mut best: Option<Round> = None;
    let mut execution_time_ms = 0;
    let mut request = ctx.request.clone();

    for round in 1..=cfg.max_iterations {
        if round > 1 && ctx.expired() {
            info!(round, "Strategy deadline reached: no further consensus rounds");
            break;
        }
        let collected = best.as_ref().map_or(&[][..], |b| b.outcomes.as_slice());
        run.advance(StrategyState::Dispatching, collected)?;
        ctx.progress.on_round_start(round, ctx.providers.len());
        let outcomes = ctx.dispatch(ctx.providers, &request).await;

        run.advance(StrategyState::Collecting, &outcomes)?;
        ensure_complete(&outcomes, ctx.providers.len())?;
        execution_time_ms += max_time(&outcomes);

        run.advance(StrategyState::Evaluating, &outcomes)?;
        let agreement = agreement(&outcomes, ctx.providers.len(), cfg.similarity_threshold);
        debug!(round, agreement, "Consensus round evaluated");

        let contents: Vec<String> = successful_contents(&outcomes)
            .into_iter()
            .map(str::to_string)
            .collect();
        let candidate = Round::new(outcomes, agreement);
        if best.as_ref().is_none_or(|b| candidate.supersedes(b)) {
            best = Some(candidate);
        }

        if agreement >= cfg.consensus_threshold {
            info!(round, agreement, "Consensus reached");
            break;
        }
        if round < cfg.max_iterations && !contents.is_empty() {
            request = ctx.request.derive(convergence_prompt(ctx.request.prompt(), &contents));
        }
    }

    let Round {
        outcomes,
        agreement,
        ..
    } = best.ok_or_else(|| StrategyExecutionError::new("consensus ran no rounds", Vec::new()))?;
    if agreement < cfg.consensus_threshold {
        info!(
            agreement,
            threshold = cfg.consensus_threshold,
            rounds = run.rounds,
            "Consensus not reached within max_iterations"
        );
    }

    let state = run.finish(&outcomes)?;
    Ok(StrategyOutput {
        strategy: Strategy::Consensus(*cfg),
        outcomes,
        state,
        execution_time_ms,
        rounds: run.rounds,
        consensus_level: Some(agreement),
    })
}

/// Share of agreeing pairs among the successful responses of one round.
///
/// A lone provider agrees with itself; a lone survivor among several
/// providers agrees with no one.
fn agreement(outcomes: &[ProviderOutcome], providers: usize, threshold: f64) -> f64 {
    let contents = successful_contents(outcomes);
    match contents.len() {
        0 => 0.0,
        1 if providers == 1 => 1.0,
        1 => 0.0,
        _ => pairwise_agreement(&contents, threshold),
    }
}

fn convergence_prompt(original: &str, previous: &[String]) -> String {
    let mut prompt = format!("{}\n\nOther participants answered this question as follows:\n", original);
    for (i, answer) in previous.iter().enumerate() {
        prompt.push_str(&format!("\n[Answer {}]\n{}\n", i + 1, answer));
    }
    prompt.push_str(
        "\nConsider these answers and give your own answer to the original question. \
         Keep the points you agree with and correct the ones you do not.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::progress::NoProgress;
    use crate::strategy::StrategyExecutor;
    use crate::ports::provider_adapter::ProviderError;
    use crate::test_support::{MockAdapter, Scripted, manager_with};
    use collab_domain::{CollaborationRequest, ProviderId, StrategyConfig};
    use std::sync::Arc;
    use std::time::Duration;

    fn consensus(max_iterations: usize) -> Strategy {
        Strategy::Consensus(ConsensusConfig {
            max_iterations,
            ..ConsensusConfig::default()
        })
    }

    async fn execute(
        adapters: Vec<(&str, Arc<MockAdapter>)>,
        strategy: Strategy,
    ) -> StrategyOutput {
        execute_with(adapters, strategy, StrategyConfig::default()).await
    }

    async fn execute_with(
        adapters: Vec<(&str, Arc<MockAdapter>)>,
        strategy: Strategy,
        config: StrategyConfig,
    ) -> StrategyOutput {
        let ids: Vec<ProviderId> = adapters.iter().map(|(id, _)| ProviderId::from(*id)).collect();
        let manager = manager_with(adapters).await;
        StrategyExecutor::new(manager)
            .execute(
                &strategy,
                &ids,
                &CollaborationRequest::new("What is the capital of France?"),
                &config,
                &NoProgress,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_agreeing_first_round_stops_immediately() {
        let a = Arc::new(MockAdapter::replying("a", "The capital of France is Paris"));
        let b = Arc::new(MockAdapter::replying("b", "The capital of France is Paris"));
        let output = execute(vec![("a", Arc::clone(&a)), ("b", b)], consensus(3)).await;

        assert_eq!(output.rounds, 1);
        assert_eq!(output.consensus_level, Some(1.0));
        assert_eq!(output.state, StrategyState::Completed);
        assert_eq!(a.call_count(), 1);
    }

    #[tokio::test]
    async fn test_disagreement_terminates_at_max_iterations() {
        let a = Arc::new(MockAdapter::replying("a", "Paris is the capital city"));
        let b = Arc::new(MockAdapter::replying("b", "bananas grow on tall plants"));
        let output = execute(vec![("a", Arc::clone(&a)), ("b", b)], consensus(3)).await;

        assert_eq!(output.rounds, 3);
        assert_eq!(a.call_count(), 3);
        assert_eq!(output.consensus_level, Some(0.0));
        assert_eq!(output.state, StrategyState::Completed);
        assert_eq!(output.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_later_rounds_carry_previous_answers() {
        let a = Arc::new(MockAdapter::replying("a", "Paris is the capital city"));
        let b = Arc::new(MockAdapter::scripted(
            "b",
            vec![
                Scripted::reply("bananas grow on tall plants"),
                Scripted::reply("Paris is the capital city"),
            ],
        ));
        let output = execute(vec![("a", Arc::clone(&a)), ("b", b)], consensus(5)).await;

        assert_eq!(output.rounds, 2);
        assert_eq!(output.consensus_level, Some(1.0));
        let prompts = a.prompts();
        assert_eq!(prompts[0], "What is the capital of France?");
        assert!(prompts[1].starts_with("What is the capital of France?"));
        assert!(prompts[1].contains("bananas grow on tall plants"));
    }

    #[tokio::test]
    async fn test_best_round_is_returned() {
        let a = Arc::new(MockAdapter::replying("a", "Paris is the capital city"));
        let b = Arc::new(MockAdapter::scripted(
            "b",
            vec![
                Scripted::reply("Paris is the capital city of France"),
                Scripted::reply("bananas grow on tall plants"),
            ],
        ));
        let c = Arc::new(MockAdapter::scripted(
            "c",
            vec![
                Scripted::reply("completely unrelated words here"),
                Scripted::reply("other unrelated words entirely"),
            ],
        ));
        let output = execute(vec![("a", a), ("b", b), ("c", c)], consensus(2)).await;

        assert_eq!(output.rounds, 2);
        let level = output.consensus_level.unwrap();
        assert!((level - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            output.outcomes[1].content(),
            Some("Paris is the capital city of France")
        );
    }

    #[tokio::test]
    async fn test_tied_round_without_answers_does_not_replace_answered_round() {
        let a = Arc::new(MockAdapter::scripted(
            "a",
            vec![
                Scripted::reply("Paris is the capital city"),
                Scripted::fail(ProviderError::Other("down".into())),
            ],
        ));
        let b = Arc::new(MockAdapter::scripted(
            "b",
            vec![
                Scripted::reply("bananas grow on tall plants"),
                Scripted::fail(ProviderError::Other("down".into())),
            ],
        ));
        let output = execute(vec![("a", a), ("b", b)], consensus(2)).await;

        assert_eq!(output.rounds, 2);
        assert_eq!(output.consensus_level, Some(0.0));
        assert_eq!(output.state, StrategyState::Completed);
        assert_eq!(output.outcomes.iter().filter(|o| o.success).count(), 2);
        assert_eq!(output.outcomes[0].content(), Some("Paris is the capital city"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_stop_at_the_run_deadline() {
        let a = Arc::new(MockAdapter::scripted(
            "a",
            vec![Scripted::reply_after(2000, "Paris is the capital city")],
        ));
        let b = Arc::new(MockAdapter::scripted(
            "b",
            vec![Scripted::reply_after(2000, "bananas grow on tall plants")],
        ));
        let config = StrategyConfig::default().with_timeout(Duration::from_millis(3000));
        let output = execute_with(
            vec![("a", Arc::clone(&a)), ("b", b)],
            consensus(5),
            config,
        )
        .await;

        assert_eq!(output.rounds, 2);
        assert_eq!(a.call_count(), 2);
        assert_eq!(output.outcomes.iter().filter(|o| o.success).count(), 2);
        assert_eq!(output.state, StrategyState::Completed);
    }

    #[test]
    fn test_agreement_with_single_survivor() {
        let ok = ProviderOutcome::success(
            collab_domain::ProviderResponse::new("a", "m", "answer"),
            10,
        );
        let failed = ProviderOutcome::timeout("b", 10);
        assert_eq!(agreement(&[ok.clone()], 1, 0.5), 1.0);
        assert_eq!(agreement(&[ok, failed], 2, 0.5), 0.0);
        assert_eq!(agreement(&[], 2, 0.5), 0.0);
    }
}
