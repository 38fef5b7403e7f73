//! Sequential strategy: one provider at a time in caller order.
//!
//! Each step is a single-provider dispatch bounded by whatever remains of
//! the run's deadline. Providers not reached before the deadline are
//! recorded as timeouts without being called. With `fail_fast`, the first
//! failed step ends the run.

use super::{
    RunContext, RunState, StrategyExecutionError, StrategyOutput, not_dispatched, sum_time,
};
use collab_domain::{Strategy, StrategyState};
use tracing::info;

pub(super) async fn run(ctx: &RunContext<'_>) -> Result<StrategyOutput, StrategyExecutionError> {
    let mut run = RunState::new();
    let mut outcomes = Vec::with_capacity(ctx.providers.len());

    for (step, id) in ctx.providers.iter().enumerate() {
        if ctx.expired() {
            info!(
                attempted = outcomes.len(),
                requested = ctx.providers.len(),
                "Strategy deadline reached: skipping remaining providers"
            );
            outcomes.extend(ctx.providers[step..].iter().map(not_dispatched));
            break;
        }

        run.advance(StrategyState::Dispatching, &outcomes)?;
        ctx.progress.on_round_start(step + 1, 1);
        let mut step_outcomes = ctx.dispatch(std::slice::from_ref(id), ctx.request).await;

        run.advance(StrategyState::Collecting, &outcomes)?;
        let outcome = step_outcomes.pop().ok_or_else(|| {
            StrategyExecutionError::new(format!("no outcome for provider {}", id), outcomes.clone())
        })?;
        let failed = !outcome.success;
        outcomes.push(outcome);

        run.advance(StrategyState::Evaluating, &outcomes)?;
        if failed && ctx.config.fail_fast {
            info!(
                provider = %id,
                attempted = outcomes.len(),
                requested = ctx.providers.len(),
                "Fail fast: stopping after failed provider"
            );
            break;
        }
    }

    let state = run.finish(&outcomes)?;
    Ok(StrategyOutput {
        strategy: Strategy::Sequential,
        execution_time_ms: sum_time(&outcomes),
        outcomes,
        state,
        rounds: run.rounds,
        consensus_level: None,
    })
}

#[cfg(test)]
mod tests {
    use crate::ports::progress::NoProgress;
    use crate::ports::provider_adapter::ProviderError;
    use crate::strategy::StrategyExecutor;
    use crate::test_support::{MockAdapter, Scripted, manager_with};
    use collab_domain::{
        CollaborationRequest, ErrorKind, ProviderId, Strategy, StrategyConfig, StrategyState,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn ids() -> Vec<ProviderId> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_one_at_a_time_and_sums_time() {
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::scripted("a", vec![Scripted::reply_after(100, "a")]))),
            ("b", Arc::new(MockAdapter::scripted("b", vec![Scripted::reply_after(200, "b")]))),
            ("c", Arc::new(MockAdapter::scripted("c", vec![Scripted::reply_after(300, "c")]))),
        ])
        .await;

        let started = Instant::now();
        let output = StrategyExecutor::new(manager)
            .execute(
                &Strategy::Sequential,
                &ids(),
                &CollaborationRequest::new("q"),
                &StrategyConfig::default(),
                &NoProgress,
            )
            .await
            .unwrap();

        assert_eq!(output.outcomes.len(), 3);
        assert_eq!(output.execution_time_ms, 600);
        assert!(started.elapsed().as_millis() >= 600);
        let order: Vec<_> = output.outcomes.iter().map(|o| o.provider.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fail_fast_halts_after_first_failure() {
        let c = Arc::new(MockAdapter::replying("c", "c"));
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::replying("a", "a"))),
            ("b", Arc::new(MockAdapter::failing("b", ProviderError::Other("boom".into())))),
            ("c", Arc::clone(&c)),
        ])
        .await;

        let output = StrategyExecutor::new(manager)
            .execute(
                &Strategy::Sequential,
                &ids(),
                &CollaborationRequest::new("q"),
                &StrategyConfig::default().with_fail_fast(true),
                &NoProgress,
            )
            .await
            .unwrap();

        assert_eq!(output.outcomes.len(), 2);
        assert_eq!(output.outcomes[1].error_kind(), Some(ErrorKind::Internal));
        assert_eq!(c.call_count(), 0);
        assert_eq!(output.state, StrategyState::Completed);
    }

    #[tokio::test]
    async fn test_without_fail_fast_every_provider_is_tried() {
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::failing("a", ProviderError::Other("boom".into())))),
            ("b", Arc::new(MockAdapter::replying("b", "b"))),
            ("c", Arc::new(MockAdapter::replying("c", "c"))),
        ])
        .await;

        let output = StrategyExecutor::new(manager)
            .execute(
                &Strategy::Sequential,
                &ids(),
                &CollaborationRequest::new("q"),
                &StrategyConfig::default(),
                &NoProgress,
            )
            .await
            .unwrap();

        assert_eq!(output.outcomes.len(), 3);
        assert_eq!(output.outcomes.iter().filter(|o| o.success).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_covers_the_whole_run() {
        let c = Arc::new(MockAdapter::scripted("c", vec![Scripted::reply_after(2000, "c")]));
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::scripted("a", vec![Scripted::reply_after(2000, "a")]))),
            ("b", Arc::new(MockAdapter::scripted("b", vec![Scripted::reply_after(2000, "b")]))),
            ("c", Arc::clone(&c)),
        ])
        .await;

        let started = Instant::now();
        let output = StrategyExecutor::new(manager)
            .execute(
                &Strategy::Sequential,
                &ids(),
                &CollaborationRequest::new("q"),
                &StrategyConfig::default().with_timeout(Duration::from_millis(3000)),
                &NoProgress,
            )
            .await
            .unwrap();

        let kinds: Vec<_> = output.outcomes.iter().map(|o| o.error_kind()).collect();
        assert_eq!(kinds, vec![None, Some(ErrorKind::Timeout), Some(ErrorKind::Timeout)]);
        assert_eq!(c.call_count(), 0);
        assert!(started.elapsed() < Duration::from_millis(3100));
    }
}
