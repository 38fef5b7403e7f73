//! Provider manager
//!
//! Registry of provider adapters. Every call goes through the provider's
//! rate limiter and retry policy and updates its health and statistics.

use crate::ports::metrics::{MetricsSink, NoMetrics, names};
use crate::ports::progress::ProgressNotifier;
use crate::ports::provider_adapter::{AdapterFactory, ProviderAdapter, ProviderError};
use crate::resilience::{RateLimiter, RetryHandler};
use collab_domain::{
    CollaborationRequest, ErrorKind, ProviderCapabilities, ProviderConfig, ProviderHealth,
    ProviderId, ProviderOutcome, ProviderResponse, ProviderStats, ProviderStatsSnapshot,
};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderManagerError {
    #[error("Provider initialization failed: {0}")]
    ProviderInit(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(ProviderId),
}

struct RegisteredProvider {
    config: ProviderConfig,
    adapter: Arc<dyn ProviderAdapter>,
    health: Mutex<ProviderHealth>,
    stats: ProviderStats,
}

impl RegisteredProvider {
    fn health(&self) -> std::sync::MutexGuard<'_, ProviderHealth> {
        self.health
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct ProviderManager {
    providers: RwLock<HashMap<ProviderId, Arc<RegisteredProvider>>>,
    rate_limiter: RateLimiter,
    retry: RetryHandler,
    factory: Option<Arc<dyn AdapterFactory>>,
    metrics: Arc<dyn MetricsSink>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            rate_limiter: RateLimiter::new(),
            retry: RetryHandler::new(),
            factory: None,
            metrics: Arc::new(NoMetrics),
        }
    }

    /// Use `factory` to build adapters in [`ProviderManager::register_provider`].
    pub fn with_factory(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    // ==================== Registration ====================

    /// Build an adapter for `config` through the factory and register it.
    pub async fn register_provider(&self, config: ProviderConfig) -> Result<(), ProviderManagerError> {
        validate_config(&config)?;
        let factory = self.factory.as_ref().ok_or_else(|| {
            ProviderManagerError::ProviderInit("no adapter factory configured".to_string())
        })?;
        let adapter = factory
            .create(&config)
            .map_err(|e| ProviderManagerError::ProviderInit(format!("{}: {}", config.id, e)))?;
        self.register_adapter(config, adapter).await
    }

    /// Validate `config`, initialize `adapter` and probe it once.
    ///
    /// The provider is only added when the probe reports healthy.
    pub async fn register_adapter(
        &self,
        config: ProviderConfig,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), ProviderManagerError> {
        validate_config(&config)?;
        adapter
            .initialize(&config)
            .await
            .map_err(|e| ProviderManagerError::ProviderInit(format!("{}: {}", config.id, e)))?;

        let probe = adapter.health_status().await;
        if !probe.healthy {
            return Err(ProviderManagerError::ProviderInit(format!(
                "{}: health probe failed: {}",
                config.id,
                probe.message.unwrap_or_else(|| "unreachable".to_string())
            )));
        }

        let id = config.id.clone();
        self.rate_limiter.register(&id, &config.rate_limit);
        let entry = Arc::new(RegisteredProvider {
            config,
            adapter,
            health: Mutex::new(ProviderHealth::healthy(probe.latency_ms)),
            stats: ProviderStats::new(),
        });
        self.write().insert(id.clone(), entry);

        info!(provider = %id, latency_ms = ?probe.latency_ms, "Provider registered");
        Ok(())
    }

    /// Remove a provider and dispose its adapter.
    pub async fn unregister(&self, id: &ProviderId) -> Result<(), ProviderManagerError> {
        let entry = self
            .write()
            .remove(id)
            .ok_or_else(|| ProviderManagerError::UnknownProvider(id.clone()))?;
        self.rate_limiter.unregister(id);
        entry.adapter.dispose().await;
        info!(provider = %id, "Provider unregistered");
        Ok(())
    }

    /// Dispose every adapter.
    pub async fn shutdown(&self) {
        let entries: Vec<_> = self.write().drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            entry.adapter.dispose().await;
        }
    }

    // ==================== Read-only views ====================

    /// Registered provider ids in lexical order.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registered and currently healthy provider ids in lexical order.
    pub fn healthy_provider_ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self
            .read()
            .iter()
            .filter(|(_, entry)| entry.health().healthy)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn is_registered(&self, id: &ProviderId) -> bool {
        self.read().contains_key(id)
    }

    pub fn is_healthy(&self, id: &ProviderId) -> bool {
        self.entry(id).is_ok_and(|entry| {
            let healthy = entry.health().healthy;
            healthy
        })
    }

    pub fn health(&self, id: &ProviderId) -> Result<ProviderHealth, ProviderManagerError> {
        Ok(self.entry(id)?.health().clone())
    }

    pub fn stats(&self, id: &ProviderId) -> Result<ProviderStatsSnapshot, ProviderManagerError> {
        Ok(self.entry(id)?.stats.snapshot())
    }

    pub fn capabilities(&self, id: &ProviderId) -> Result<ProviderCapabilities, ProviderManagerError> {
        Ok(self.entry(id)?.adapter.capabilities())
    }

    /// Default model of the provider, used for pricing lookups.
    pub fn default_model(&self, id: &ProviderId) -> Option<String> {
        self.entry(id).ok().map(|entry| entry.config.default_model.clone())
    }

    /// Zero the statistics of one provider.
    pub fn reset_stats(&self, id: &ProviderId) -> Result<(), ProviderManagerError> {
        self.entry(id)?.stats.reset();
        Ok(())
    }

    /// Probe a provider and record the result in its health.
    pub async fn check_health(&self, id: &ProviderId) -> Result<ProviderHealth, ProviderManagerError> {
        let entry = self.entry(id)?;
        let probe = entry.adapter.health_status().await;
        let mut health = entry.health();
        health.apply_probe(probe.healthy, probe.latency_ms);
        if let Some(message) = probe.message.filter(|_| !probe.healthy) {
            health.last_error = Some(message);
        }
        Ok(health.clone())
    }

    // ==================== Calls ====================

    /// Call one provider with rate limiting and retries.
    ///
    /// Provider failures come back as a failed [`ProviderOutcome`]; the only
    /// error is an unknown provider id.
    pub async fn call(
        &self,
        id: &ProviderId,
        request: &CollaborationRequest,
    ) -> Result<ProviderOutcome, ProviderManagerError> {
        let entry = self.entry(id)?;
        let started = Instant::now();

        let validation = entry.adapter.validate_request(request);
        let result = if validation.valid {
            let entry_ref = entry.as_ref();
            self.retry
                .execute(&entry.config.retry, move |attempt| {
                    self.attempt(entry_ref, request, attempt)
                })
                .await
        } else {
            Err(ProviderError::Validation(validation.errors))
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(retried) => {
                let mut response: ProviderResponse = retried.value;
                response.provider = id.clone();
                if response.latency_ms == 0 {
                    response.latency_ms = elapsed_ms;
                }

                entry.stats.record_success(elapsed_ms);
                entry.stats.record_retries(u64::from(retried.attempts - 1));
                entry.health().mark_success(response.latency_ms);

                self.metrics.increment(
                    names::PROVIDER_REQUESTS,
                    &[("provider", id.as_str()), ("status", "success")],
                );
                self.metrics.record_duration(
                    names::PROVIDER_LATENCY,
                    Duration::from_millis(elapsed_ms),
                    &[("provider", id.as_str())],
                );
                self.metrics.record_tokens(id, &response.usage);

                debug!(provider = %id, attempts = retried.attempts, elapsed_ms, "Provider call succeeded");
                ProviderOutcome::success(response, elapsed_ms)
            }
            Err(error) => {
                let attempts = error.attempts();
                entry.stats.record_failure(elapsed_ms);
                entry.stats.record_retries(u64::from(attempts.saturating_sub(1)));

                let fatal = error.kind() == ErrorKind::Authentication;
                entry.health().mark_failure(error.to_string(), fatal);
                if fatal {
                    warn!(provider = %id, "Authentication failed, marking provider unhealthy");
                } else {
                    warn!(provider = %id, attempts, elapsed_ms, "Provider call failed: {}", error);
                }

                self.metrics.increment(
                    names::PROVIDER_REQUESTS,
                    &[("provider", id.as_str()), ("status", error.kind().as_str())],
                );
                ProviderOutcome::failure(id.clone(), error.kind(), error.to_string(), attempts, elapsed_ms)
            }
        };
        Ok(outcome)
    }

    /// One attempt: take a rate-limit token, then call under the per-attempt timeout.
    async fn attempt(
        &self,
        entry: &RegisteredProvider,
        request: &CollaborationRequest,
        attempt: u32,
    ) -> Result<ProviderResponse, ProviderError> {
        let id = &entry.config.id;
        if let Err(limited) = self.rate_limiter.consume(id) {
            entry.stats.record_rate_limit_hit();
            debug!(provider = %id, attempt, "Rejected by local rate limiter");
            return Err(ProviderError::RateLimited {
                retry_after: Some(limited.retry_after),
            });
        }

        match tokio::time::timeout(entry.config.timeout, entry.adapter.generate_response(request)).await
        {
            Ok(result) => {
                if let Err(ProviderError::RateLimited { .. }) = &result {
                    entry.stats.record_rate_limit_hit();
                }
                result
            }
            Err(_) => Err(ProviderError::Timeout(entry.config.timeout)),
        }
    }

    /// Call several providers concurrently under one deadline.
    ///
    /// At most `max_concurrency` calls run at once. One provider's failure
    /// never cancels another's call. Calls still pending when `deadline`
    /// elapses are aborted and recorded as Timeout. The returned outcomes
    /// follow the order of `ids`, one per id.
    pub async fn fan_out(
        self: &Arc<Self>,
        ids: &[ProviderId],
        request: &CollaborationRequest,
        deadline: Duration,
        max_concurrency: usize,
        progress: &dyn ProgressNotifier,
    ) -> Vec<ProviderOutcome> {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (index, id) in ids.iter().enumerate() {
            let manager = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let id = id.clone();
            let request = request.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let call = AssertUnwindSafe(manager.call(&id, &request)).catch_unwind();
                let outcome = match call.await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        ProviderOutcome::failure(id, ErrorKind::Internal, e.to_string(), 1, 0)
                    }
                    Err(_) => ProviderOutcome::failure(
                        id,
                        ErrorKind::Internal,
                        "provider task panicked",
                        1,
                        0,
                    ),
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<ProviderOutcome>> = vec![None; ids.len()];
        let expiry = tokio::time::sleep_until(started + deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                joined = join_set.join_next() => match joined {
                    Some(Ok((index, outcome))) => {
                        progress.on_provider_complete(&outcome);
                        slots[index] = Some(outcome);
                    }
                    Some(Err(e)) => warn!("Provider task aborted: {}", e),
                    None => break,
                },
                _ = &mut expiry => {
                    join_set.abort_all();
                    break;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| {
                    self.record_cancelled(id, elapsed_ms);
                    let outcome = ProviderOutcome::timeout(id.clone(), elapsed_ms);
                    progress.on_provider_complete(&outcome);
                    outcome
                })
            })
            .collect()
    }

    fn record_cancelled(&self, id: &ProviderId, elapsed_ms: u64) {
        if let Ok(entry) = self.entry(id) {
            entry.stats.record_failure(elapsed_ms);
            entry
                .health()
                .mark_failure(format!("cancelled at deadline after {}ms", elapsed_ms), false);
        }
        warn!(provider = %id, elapsed_ms, "Provider call cancelled at deadline");
    }

    // ==================== Internals ====================

    fn entry(&self, id: &ProviderId) -> Result<Arc<RegisteredProvider>, ProviderManagerError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderManagerError::UnknownProvider(id.clone()))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ProviderId, Arc<RegisteredProvider>>> {
        self.providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ProviderId, Arc<RegisteredProvider>>> {
        self.providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(config: &ProviderConfig) -> Result<(), ProviderManagerError> {
    config
        .validate()
        .map_err(|errors| ProviderManagerError::ProviderInit(errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::progress::NoProgress;
    use crate::test_support::{MockAdapter, Scripted, manager_with, test_config};
    use collab_domain::RetryPolicy;

    fn request() -> CollaborationRequest {
        CollaborationRequest::new("Explain X")
    }

    #[tokio::test]
    async fn test_register_rejects_bad_config() {
        let manager = ProviderManager::new();
        let mut config = test_config("a");
        config.api_key = String::new();

        let result = manager
            .register_adapter(config, Arc::new(MockAdapter::replying("a", "x")))
            .await;
        assert!(matches!(result, Err(ProviderManagerError::ProviderInit(_))));
        assert!(!manager.is_registered(&"a".into()));
    }

    #[tokio::test]
    async fn test_register_rejects_failed_probe() {
        let manager = ProviderManager::new();
        let adapter = MockAdapter::replying("a", "x").unhealthy();
        let result = manager
            .register_adapter(test_config("a"), Arc::new(adapter))
            .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("health probe failed"));
    }

    #[tokio::test]
    async fn test_register_provider_without_factory() {
        let manager = ProviderManager::new();
        let result = manager.register_provider(test_config("a")).await;
        assert!(matches!(result, Err(ProviderManagerError::ProviderInit(_))));
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let manager = ProviderManager::new();
        let id = ProviderId::from("ghost");
        assert_eq!(
            manager.call(&id, &request()).await.unwrap_err(),
            ProviderManagerError::UnknownProvider(id.clone())
        );
        assert!(manager.health(&id).is_err());
        assert!(manager.stats(&id).is_err());
    }

    #[tokio::test]
    async fn test_call_success_updates_stats() {
        let manager = manager_with(vec![("a", Arc::new(MockAdapter::replying("a", "foo")))]).await;
        let id = ProviderId::from("a");

        let outcome = manager.call(&id, &request()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.content(), Some("foo"));

        let stats = manager.stats(&id).unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.successful_requests, 1);

        manager.reset_stats(&id).unwrap();
        assert_eq!(manager.stats(&id).unwrap().total_requests, 0);
    }

    #[tokio::test]
    async fn test_auth_failure_marks_unhealthy() {
        let adapter = MockAdapter::failing("a", ProviderError::Authentication("bad key".into()));
        let manager = manager_with(vec![("a", Arc::new(adapter))]).await;
        let id = ProviderId::from("a");

        let outcome = manager.call(&id, &request()).await.unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Authentication));
        assert!(!manager.is_healthy(&id));
        assert!(manager.healthy_provider_ids().is_empty());

        let health = manager.check_health(&id).await.unwrap();
        assert!(health.healthy);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_sent() {
        let adapter = Arc::new(MockAdapter::replying("a", "x"));
        let manager = manager_with(vec![("a", Arc::clone(&adapter))]).await;

        let bad = CollaborationRequest::new("q").with_max_tokens(0);
        let outcome = manager.call(&"a".into(), &bad).await.unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        assert_eq!(adapter.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_counted() {
        let adapter = Arc::new(MockAdapter::scripted(
            "a",
            vec![
                Scripted::fail(ProviderError::Server {
                    status: 502,
                    message: "bad gateway".into(),
                }),
                Scripted::reply("ok"),
            ],
        ));
        let manager = Arc::new(ProviderManager::new());
        manager
            .register_adapter(
                test_config("a").with_retry(RetryPolicy::default()),
                Arc::clone(&adapter) as Arc<dyn ProviderAdapter>,
            )
            .await
            .unwrap();

        let outcome = manager.call(&"a".into(), &request()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(adapter.call_count(), 2);
        assert_eq!(manager.stats(&"a".into()).unwrap().retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_attempt_timeout() {
        let manager = Arc::new(ProviderManager::new());
        manager
            .register_adapter(
                test_config("slow").with_timeout(Duration::from_millis(200)),
                Arc::new(MockAdapter::stalling("slow")),
            )
            .await
            .unwrap();

        let outcome = manager.call(&"slow".into(), &request()).await.unwrap();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Timeout));
        assert!(outcome.execution_time_ms >= 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_isolates_failures_and_keeps_order() {
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::scripted("a", vec![Scripted::reply_after(300, "from a")]))),
            ("b", Arc::new(MockAdapter::failing("b", ProviderError::Network("reset".into())))),
            ("c", Arc::new(MockAdapter::scripted("c", vec![Scripted::reply_after(100, "from c")]))),
        ])
        .await;

        let ids: Vec<ProviderId> = vec!["a".into(), "b".into(), "c".into()];
        let outcomes = manager
            .fan_out(&ids, &request(), Duration::from_secs(5), 5, &NoProgress)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].content(), Some("from a"));
        assert_eq!(outcomes[1].error_kind(), Some(ErrorKind::Network));
        assert_eq!(outcomes[2].content(), Some("from c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_deadline_cancels_pending_calls() {
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::scripted("a", vec![Scripted::reply_after(100, "foo")]))),
            ("b", Arc::new(MockAdapter::stalling("b"))),
        ])
        .await;

        let started = Instant::now();
        let ids: Vec<ProviderId> = vec!["a".into(), "b".into()];
        let outcomes = manager
            .fan_out(&ids, &request(), Duration::from_millis(3000), 5, &NoProgress)
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000) && elapsed < Duration::from_millis(3100));
        assert!(outcomes[0].success);
        assert_eq!(outcomes[1].error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(manager.stats(&"b".into()).unwrap().failed_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_respects_concurrency_cap() {
        let manager = manager_with(vec![
            ("a", Arc::new(MockAdapter::scripted("a", vec![Scripted::reply_after(1000, "a")]))),
            ("b", Arc::new(MockAdapter::scripted("b", vec![Scripted::reply_after(1000, "b")]))),
            ("c", Arc::new(MockAdapter::scripted("c", vec![Scripted::reply_after(1000, "c")]))),
        ])
        .await;

        let started = Instant::now();
        let ids: Vec<ProviderId> = vec!["a".into(), "b".into(), "c".into()];
        let outcomes = manager
            .fan_out(&ids, &request(), Duration::from_secs(10), 1, &NoProgress)
            .await;

        assert!(outcomes.iter().all(|o| o.success));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000) && elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_rate_limit_counts_hits() {
        let manager = Arc::new(ProviderManager::new());
        manager
            .register_adapter(
                test_config("a").with_rate_limit(collab_domain::RateLimitConfig {
                    tokens_per_minute: 1,
                    burst_size: 1,
                }),
                Arc::new(MockAdapter::replying("a", "x")),
            )
            .await
            .unwrap();

        assert!(manager.call(&"a".into(), &request()).await.unwrap().success);
        let second = manager.call(&"a".into(), &request()).await.unwrap();
        assert_eq!(second.error_kind(), Some(ErrorKind::RateLimited));
        assert_eq!(manager.stats(&"a".into()).unwrap().rate_limit_hits, 1);
    }
}
