//! Iterative strategy: draft once, then refine while quality improves.
//!
//! The draft falls back through the provider list until one call succeeds.
//! Each refinement goes to the drafting provider, or to the next provider in
//! turn when `rotate_providers` is set, and is scored with the same quality
//! function synthesis uses. A refinement is kept only when it scores higher;
//! the run stops once the gain drops below `improvement_threshold` or
//! `max_iterations` calls have produced a draft or refinement. Nothing is
//! dispatched once the run's deadline has passed; draft candidates not
//! reached by then are recorded as timeouts.
//!
//! The outcome list holds one entry per provider attempted: its best
//! successful response, or its last failure.

use super::{
    RunContext, RunState, StrategyExecutionError, StrategyOutput, not_dispatched, sum_time,
};
use collab_domain::{IterativeConfig, ProviderId, ProviderOutcome, Strategy, StrategyState};
use tracing::{debug, info};

/// Best outcome seen per provider, in first-attempt order.
#[derive(Default)]
struct Attempts {
    entries: Vec<(ProviderOutcome, f64, u64)>,
}

impl Attempts {
    fn record(&mut self, outcome: ProviderOutcome, score: f64) {
        let elapsed = outcome.execution_time_ms;
        match self
            .entries
            .iter_mut()
            .find(|(o, _, _)| o.provider == outcome.provider)
        {
            Some((kept, kept_score, total)) => {
                *total += elapsed;
                let better = match (kept.success, outcome.success) {
                    (false, _) => true,
                    (true, true) => score > *kept_score,
                    (true, false) => false,
                };
                if better {
                    *kept = outcome;
                    *kept_score = score;
                }
            }
            None => self.entries.push((outcome, score, elapsed)),
        }
    }

    fn all(&self) -> Vec<ProviderOutcome> {
        self.entries.iter().map(|(o, _, _)| o.clone()).collect()
    }

    fn into_outcomes(self) -> Vec<ProviderOutcome> {
        self.entries
            .into_iter()
            .map(|(mut outcome, _, total)| {
                outcome.execution_time_ms = total;
                outcome
            })
            .collect()
    }
}

pub(super) async fn run(
    ctx: &RunContext<'_>,
    cfg: &IterativeConfig,
) -> Result<StrategyOutput, StrategyExecutionError> {
    let mut run = RunState::new();
    let mut attempts = Attempts::default();
    let mut calls = 0usize;

    // Draft: first provider that answers.
    let mut draft: Option<(usize, String, f64)> = None;
    for (index, id) in ctx.providers.iter().enumerate() {
        if ctx.expired() {
            info!(attempted = index, "Strategy deadline reached before a draft");
            for skipped in &ctx.providers[index..] {
                attempts.record(not_dispatched(skipped), 0.0);
            }
            break;
        }
        let outcome = step(ctx, &mut run, &attempts, id, ctx.request).await?;
        calls += 1;
        match outcome.content().map(str::to_string) {
            Some(content) => {
                let score = score(ctx, &outcome);
                debug!(provider = %id, score, "Draft produced");
                attempts.record(outcome, score);
                draft = Some((index, content, score));
                break;
            }
            None => attempts.record(outcome, 0.0),
        }
    }

    if let Some((drafter, mut current, mut current_score)) = draft {
        for iteration in 2..=cfg.max_iterations {
            if ctx.expired() {
                info!(iteration, "Strategy deadline reached: refinement stopped");
                break;
            }
            let index = if cfg.rotate_providers {
                (drafter + iteration - 1) % ctx.providers.len()
            } else {
                drafter
            };
            let id = &ctx.providers[index];
            let request = ctx.request.derive(refinement_prompt(ctx.request.prompt(), &current));
            let outcome = step(ctx, &mut run, &attempts, id, &request).await?;
            calls += 1;

            let Some(refined) = outcome.content().map(str::to_string) else {
                attempts.record(outcome, 0.0);
                continue;
            };
            let refined_score = score(ctx, &outcome);
            let improvement = refined_score - current_score;
            attempts.record(outcome, refined_score);
            debug!(provider = %id, iteration, refined_score, improvement, "Refinement scored");

            if refined_score > current_score {
                current = refined;
                current_score = refined_score;
            }
            if improvement < cfg.improvement_threshold {
                info!(iteration, improvement, "Refinement stopped improving");
                break;
            }
        }
    }

    let outcomes = attempts.into_outcomes();
    let state = run.finish(&outcomes)?;
    Ok(StrategyOutput {
        strategy: Strategy::Iterative(*cfg),
        execution_time_ms: sum_time(&outcomes),
        outcomes,
        state,
        rounds: calls,
        consensus_level: None,
    })
}

/// One single-provider call walked through the state machine.
async fn step(
    ctx: &RunContext<'_>,
    run: &mut RunState,
    attempts: &Attempts,
    id: &ProviderId,
    request: &collab_domain::CollaborationRequest,
) -> Result<ProviderOutcome, StrategyExecutionError> {
    run.advance(StrategyState::Dispatching, &attempts.all())?;
    ctx.progress.on_round_start(run.rounds, 1);
    let mut outcomes = ctx.dispatch(std::slice::from_ref(id), request).await;
    run.advance(StrategyState::Collecting, &attempts.all())?;
    let outcome = outcomes.pop().ok_or_else(|| {
        StrategyExecutionError::new(format!("no outcome for provider {}", id), attempts.all())
    })?;
    run.advance(StrategyState::Evaluating, &attempts.all())?;
    Ok(outcome)
}

fn score(ctx: &RunContext<'_>, outcome: &ProviderOutcome) -> f64 {
    outcome.response.as_ref().map_or(0.0, |response| {
        ctx.scorer
            .score(
                &response.content,
                response.finish_reason,
                Some(ctx.request.prompt()),
                &[],
            )
            .overall
    })
}

fn refinement_prompt(original: &str, current: &str) -> String {
    format!(
        "{}\n\nHere is the current answer:\n\n{}\n\n\
         Improve this answer. Fix mistakes, fill in what is missing and make it clearer. \
         Reply with the improved answer only.",
        original, current
    )
}
