//! Parallel strategy: every provider at once under one deadline.

use super::{RunContext, RunState, StrategyExecutionError, StrategyOutput, ensure_complete, max_time};
use collab_domain::{Strategy, StrategyState};

pub(super) async fn run(ctx: &RunContext<'_>) -> Result<StrategyOutput, StrategyExecutionError> {
    let mut run = RunState::new();

    run.advance(StrategyState::Dispatching, &[])?;
    ctx.progress.on_round_start(1, ctx.providers.len());
    let outcomes = ctx.dispatch(ctx.providers, ctx.request).await;

    run.advance(StrategyState::Collecting, &outcomes)?;
    ensure_complete(&outcomes, ctx.providers.len())?;

    run.advance(StrategyState::Evaluating, &outcomes)?;
    let state = run.finish(&outcomes)?;

    Ok(StrategyOutput {
        strategy: Strategy::Parallel,
        execution_time_ms: max_time(&outcomes),
        outcomes,
        state,
        rounds: run.rounds,
        consensus_level: None,
    })
}

#[cfg(test)]
mod tests {
    use crate::ports::progress::NoProgress;
    use crate::strategy::StrategyExecutor;
    use crate::test_support::{MockAdapter, Scripted, manager_with};
    use collab_domain::{CollaborationRequest, ProviderId, Strategy, StrategyConfig};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_execution_time_is_the_slowest_provider() {
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::scripted("a", vec![Scripted::reply_after(200, "a")]))),
            ("b", Arc::new(MockAdapter::scripted("b", vec![Scripted::reply_after(700, "b")]))),
        ])
        .await;
        let ids: Vec<ProviderId> = vec!["a".into(), "b".into()];

        let output = StrategyExecutor::new(manager)
            .execute(
                &Strategy::Parallel,
                &ids,
                &CollaborationRequest::new("q"),
                &StrategyConfig::default(),
                &NoProgress,
            )
            .await
            .unwrap();

        assert!(output.outcomes.iter().all(|o| o.success));
        assert!(output.execution_time_ms >= 700 && output.execution_time_ms < 800);
    }
}
