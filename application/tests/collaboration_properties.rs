//! End-to-end properties of the orchestration core, driven through the
//! public orchestrator API with scripted providers.

mod common;

use collab_application::{
    CollaborationOrchestrator, CreateSynthesisInput, CreateSynthesisUseCase, OrchestratorConfig,
    ProviderAdapter, ProviderError, ProviderManager, RunCollaborationInput,
};
use collab_domain::{
    CollaborationRequest, ConsensusConfig, ErrorKind, ProviderId, ProviderResponse, RetryPolicy,
    Strategy, StrategyConfig, StrategyState, SynthesisMethod,
};
use common::{MapCache, Reply, ScriptedAdapter};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn orchestrator(manager: Arc<ProviderManager>) -> CollaborationOrchestrator {
    CollaborationOrchestrator::new(manager, OrchestratorConfig::default())
}

fn request() -> CollaborationRequest {
    CollaborationRequest::new("Which language has a borrow checker?")
}

#[tokio::test]
async fn parallel_success_flags_follow_success_count() {
    for successes in 0..=3usize {
        let adapters: Vec<_> = (0..3)
            .map(|i| {
                let name = ["p0", "p1", "p2"][i];
                if i < successes {
                    ScriptedAdapter::new(name, vec![Reply::Ok("Rust has one")])
                } else {
                    ScriptedAdapter::new(name, vec![Reply::Fail(ProviderError::Server {
                        status: 500,
                        message: "boom".into(),
                    })])
                }
            })
            .collect();
        let manager = common::manager(&adapters).await;

        let result = orchestrator(manager)
            .execute(RunCollaborationInput::new(request(), Strategy::Parallel))
            .await
            .unwrap();

        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.success, successes >= 1, "M = {successes}");
        assert_eq!(result.partial_success, successes > 0 && successes < 3, "M = {successes}");
        assert_eq!(result.synthesis.is_some(), successes >= 1);
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_turns_pending_calls_into_timeouts() {
    let fast = ScriptedAdapter::new("fast", vec![Reply::After(100, "Rust")]);
    let stuck = ScriptedAdapter::new("stuck", vec![Reply::Stall]);
    let manager = common::manager(&[fast, stuck]).await;

    let started = Instant::now();
    let result = orchestrator(manager)
        .execute(
            RunCollaborationInput::new(request(), Strategy::Parallel)
                .with_strategy_config(StrategyConfig::default().with_timeout(Duration::from_millis(3000))),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(3200));
    assert!(result.success);
    assert!(result.partial_success);
    assert_eq!(result.content(), Some("Rust"));
    let stuck = result
        .outcomes
        .iter()
        .find(|o| o.provider.as_str() == "stuck")
        .unwrap();
    assert_eq!(stuck.error_kind(), Some(ErrorKind::Timeout));
}

#[tokio::test]
async fn identical_requests_get_distinct_ids() {
    let adapter = ScriptedAdapter::new("a", vec![Reply::Ok("Rust")]);
    let manager = common::manager(&[adapter.clone()]).await;
    let orchestrator = orchestrator(manager).with_cache(Arc::new(MapCache::default()));

    let mut ids = HashSet::new();
    for _ in 0..1000 {
        let result = orchestrator
            .execute(RunCollaborationInput::new(request(), Strategy::Parallel))
            .await
            .unwrap();
        assert!(result.id.starts_with("collab-"));
        ids.insert(result.id);
    }

    assert_eq!(ids.len(), 1000);
    // everything after the first run is a cache hit
    assert_eq!(adapter.calls(), 1);
}

#[test]
fn best_of_is_idempotent() {
    let responses = vec![
        ProviderResponse::new("a", "m", "Rust has a borrow checker.").with_latency_ms(40),
        ProviderResponse::new("b", "m", "Rust has a borrow checker.").with_latency_ms(40),
        ProviderResponse::new("c", "m", "Rust has a borrow checker that checks lifetimes.")
            .with_latency_ms(90),
    ];
    let use_case = CreateSynthesisUseCase::new();

    let winners: Vec<Vec<ProviderId>> = (0..5)
        .map(|_| {
            use_case
                .execute(CreateSynthesisInput::new(
                    responses.clone(),
                    SynthesisMethod::BestOf,
                ))
                .unwrap()
                .contributors
        })
        .collect();

    assert!(winners.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(winners[0].len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_transient_errors_only() {
    let server = ScriptedAdapter::new(
        "server",
        vec![Reply::Fail(ProviderError::Server {
            status: 503,
            message: "unavailable".into(),
        })],
    );
    let auth = ScriptedAdapter::new(
        "auth",
        vec![Reply::Fail(ProviderError::Authentication("bad key".into()))],
    );
    let invalid = ScriptedAdapter::new(
        "invalid",
        vec![Reply::Fail(ProviderError::Validation(vec!["bad".into()]))],
    );

    let manager = Arc::new(ProviderManager::new());
    let policy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(10),
        jitter_ratio: 0.0,
    };
    for (id, adapter) in [("server", &server), ("auth", &auth), ("invalid", &invalid)] {
        manager
            .register_adapter(
                common::config(id, policy),
                Arc::clone(adapter) as Arc<dyn ProviderAdapter>,
            )
            .await
            .unwrap();
    }

    let started = Instant::now();
    let outcome = manager.call(&"server".into(), &request()).await.unwrap();
    assert_eq!(server.calls(), 4);
    assert_eq!(outcome.error.as_ref().unwrap().attempts, 4);
    // 100 + 200 + 400 ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(700));

    manager.call(&"auth".into(), &request()).await.unwrap();
    manager.call(&"invalid".into(), &request()).await.unwrap();
    assert_eq!(auth.calls(), 1);
    assert_eq!(invalid.calls(), 1);
}

#[tokio::test]
async fn sequential_fail_fast_halts_after_first_failure() {
    let first = ScriptedAdapter::new(
        "first",
        vec![Reply::Fail(ProviderError::Network("reset".into()))],
    );
    let second = ScriptedAdapter::new("second", vec![Reply::Ok("Rust")]);
    let third = ScriptedAdapter::new("third", vec![Reply::Ok("Rust")]);
    let manager = common::manager(&[first, second.clone(), third.clone()]).await;

    let result = orchestrator(manager)
        .execute(
            RunCollaborationInput::new(request(), Strategy::Sequential)
                .with_providers(vec!["first".into(), "second".into(), "third".into()])
                .with_strategy_config(StrategyConfig::default().with_fail_fast(true)),
        )
        .await
        .unwrap();

    assert_eq!(result.outcomes.len(), 1);
    assert!(result.outcomes.len() < 3);
    assert!(!result.success);
    assert_eq!(result.state, StrategyState::Failed);
    assert_eq!(second.calls() + third.calls(), 0);
}

#[tokio::test]
async fn consensus_terminates_within_max_iterations() {
    let a = ScriptedAdapter::new("a", vec![Reply::Ok("Rust has a borrow checker")]);
    let b = ScriptedAdapter::new("b", vec![Reply::Ok("Haskell uses lazy evaluation")]);
    let manager = common::manager(&[a.clone(), b]).await;

    for max_iterations in 1..=4 {
        let before = a.calls();
        let result = orchestrator(Arc::clone(&manager))
            .execute(
                RunCollaborationInput::new(
                    request(),
                    Strategy::Consensus(ConsensusConfig {
                        consensus_threshold: 0.9,
                        similarity_threshold: 0.5,
                        max_iterations,
                    }),
                )
                .without_synthesis(),
            )
            .await
            .unwrap();

        assert_eq!(a.calls() - before, max_iterations);
        assert_eq!(result.metrics.rounds, max_iterations);
        assert_eq!(result.state, StrategyState::Completed);
        assert_eq!(result.consensus_level, Some(0.0));
    }
}
