//! Run Collaboration use case
//!
//! Orchestrates one collaboration end to end:
//!
//! 1. Admission against the server-wide concurrency cap and waiting queue
//! 2. Request validation (every violation reported at once)
//! 3. Provider resolution (unknown and unhealthy ids are dropped)
//! 4. Cache lookup and coalescing of identical in-flight calls
//! 5. Strategy execution
//! 6. Synthesis, degrading instead of failing the call
//! 7. Result assembly with timings, token usage and cost estimates

use crate::config::OrchestratorConfig;
use crate::ports::cache::{CollaborationCache, NoCache};
use crate::ports::collaboration_logger::{
    CollaborationEvent, CollaborationLogger, NoCollaborationLogger, events,
};
use crate::ports::metrics::{MetricsSink, NoMetrics, names};
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::providers::ProviderManager;
use crate::strategy::{StrategyExecutionError, StrategyExecutor, StrategyOutput};
use collab_domain::synthesis::similarity::pairwise_agreement;
use collab_domain::{
    CollaborationRequest, CollaborationResult, PerformanceMetrics, PricingTable, ProviderId,
    ProviderMetrics, ProviderOutcome, Strategy, StrategyConfig, SynthesisEngine, SynthesisError,
    SynthesisMethod, SynthesisOptions, SynthesisResult, TokenUsage,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OnceCell, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors that end a collaboration call without a result
#[derive(Error, Debug, Clone)]
pub enum CollaborationError {
    #[error("Invalid request: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("No valid providers available")]
    NoValidProviders,

    #[error(transparent)]
    Strategy(#[from] StrategyExecutionError),

    #[error("Too many collaborations in progress, try again later")]
    Overloaded,
}

/// Input for the RunCollaboration use case
#[derive(Debug, Clone)]
pub struct RunCollaborationInput {
    pub request: CollaborationRequest,
    pub strategy: Strategy,
    /// Providers to use; empty means every registered healthy provider
    pub providers: Vec<ProviderId>,
    /// Overrides the orchestrator's default strategy config
    pub strategy_config: Option<StrategyConfig>,
    pub synthesis_method: Option<SynthesisMethod>,
    pub synthesis_options: Option<SynthesisOptions>,
    /// Overrides whether synthesis runs at all
    pub synthesis_enabled: Option<bool>,
}

impl RunCollaborationInput {
    pub fn new(request: CollaborationRequest, strategy: Strategy) -> Self {
        Self {
            request,
            strategy,
            providers: Vec::new(),
            strategy_config: None,
            synthesis_method: None,
            synthesis_options: None,
            synthesis_enabled: None,
        }
    }

    pub fn with_providers(mut self, providers: Vec<ProviderId>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_strategy_config(mut self, config: StrategyConfig) -> Self {
        self.strategy_config = Some(config);
        self
    }

    pub fn with_synthesis_method(mut self, method: SynthesisMethod) -> Self {
        self.synthesis_method = Some(method);
        self
    }

    pub fn with_synthesis_options(mut self, options: SynthesisOptions) -> Self {
        self.synthesis_options = Some(options);
        self
    }

    pub fn without_synthesis(mut self) -> Self {
        self.synthesis_enabled = Some(false);
        self
    }
}

/// Validated, fully resolved settings of one call.
#[derive(Debug)]
struct Plan {
    strategy: Strategy,
    providers: Vec<ProviderId>,
    strategy_config: StrategyConfig,
    /// `None` passes the first success through unmerged
    synthesis: Option<(SynthesisMethod, SynthesisOptions)>,
}

type Shared = Result<CollaborationResult, CollaborationError>;

/// Entry point of the orchestration core.
pub struct CollaborationOrchestrator {
    executor: StrategyExecutor,
    engine: SynthesisEngine,
    config: OrchestratorConfig,
    admission: Semaphore,
    waiting: AtomicUsize,
    cache: Arc<dyn CollaborationCache>,
    metrics: Arc<dyn MetricsSink>,
    logger: Arc<dyn CollaborationLogger>,
    pricing: PricingTable,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<Shared>>>>,
}

impl CollaborationOrchestrator {
    pub fn new(manager: Arc<ProviderManager>, config: OrchestratorConfig) -> Self {
        let options = &config.synthesis.options;
        let executor = StrategyExecutor::new(manager)
            .with_quality(options.weights, options.similarity_threshold);
        Self {
            executor,
            engine: SynthesisEngine::new(),
            admission: Semaphore::new(config.max_concurrent_requests.max(1)),
            waiting: AtomicUsize::new(0),
            cache: Arc::new(NoCache),
            metrics: Arc::new(NoMetrics),
            logger: Arc::new(NoCollaborationLogger),
            pricing: PricingTable::new(),
            in_flight: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CollaborationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn CollaborationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn manager(&self) -> &Arc<ProviderManager> {
        self.executor.manager()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn engine(&self) -> &SynthesisEngine {
        &self.engine
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(
        &self,
        input: RunCollaborationInput,
    ) -> Result<CollaborationResult, CollaborationError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute the use case with progress callbacks
    ///
    /// Provider failures, total or partial, come back inside the result.
    /// Every call gets a fresh collaboration id, including calls served
    /// from the cache or joined onto an identical in-flight call.
    pub async fn execute_with_progress(
        &self,
        input: RunCollaborationInput,
        progress: &dyn ProgressNotifier,
    ) -> Result<CollaborationResult, CollaborationError> {
        let started = Instant::now();
        let _permit = self.admit().await?;

        let plan = self.plan(&input)?;
        let key = fingerprint(&input.request, &plan);

        if let Some(mut cached) = self.cache.get(&key).await {
            self.metrics.increment(names::CACHE_HITS, &[]);
            cached.id = new_collaboration_id();
            cached.metrics.cache_hit = true;
            cached.metrics.total_time_ms = elapsed_ms(started);
            debug!(collaboration = %cached.id, "Served collaboration from cache");
            return Ok(cached);
        }
        self.metrics.increment(names::CACHE_MISSES, &[]);

        let cell = Arc::clone(self.lock_in_flight().entry(key.clone()).or_default());
        let mut leader = false;
        let shared = cell
            .get_or_init(|| {
                leader = true;
                self.run(&input.request, &plan, &key, progress, started)
            })
            .await
            .clone();

        {
            let mut in_flight = self.lock_in_flight();
            if in_flight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                in_flight.remove(&key);
            }
        }

        let mut result = shared?;
        if !leader {
            result.id = new_collaboration_id();
            debug!(collaboration = %result.id, "Joined identical in-flight collaboration");
        }
        Ok(result)
    }

    // ==================== Admission ====================

    /// Take a slot, waiting in the bounded queue when all slots are busy.
    async fn admit(&self) -> Result<SemaphorePermit<'_>, CollaborationError> {
        if let Ok(permit) = self.admission.try_acquire() {
            return Ok(permit);
        }

        let _slot = QueueSlot::take(&self.waiting, self.config.queue_capacity).ok_or_else(|| {
            warn!(
                queue_capacity = self.config.queue_capacity,
                "Admission queue full, rejecting collaboration"
            );
            CollaborationError::Overloaded
        })?;
        self.admission
            .acquire()
            .await
            .map_err(|_| CollaborationError::Overloaded)
    }

    // ==================== Planning ====================

    fn plan(&self, input: &RunCollaborationInput) -> Result<Plan, CollaborationError> {
        let mut errors = input.request.validate().err().unwrap_or_default();
        if let Err(e) = input.strategy.validate() {
            errors.extend(e);
        }
        let strategy_config = input.strategy_config.unwrap_or(self.config.strategy);
        if let Err(e) = strategy_config.validate() {
            errors.extend(e);
        }
        if !errors.is_empty() {
            warn!("Rejecting invalid request: {}", errors.join("; "));
            return Err(CollaborationError::Validation(errors));
        }

        let providers = self.resolve_providers(&input.providers)?;

        let settings = &self.config.synthesis;
        let method = input.synthesis_method.unwrap_or(settings.method);
        let enabled = input.synthesis_enabled.unwrap_or(settings.enabled)
            && method != SynthesisMethod::PassThrough;
        let synthesis = enabled.then(|| {
            let mut options = input
                .synthesis_options
                .clone()
                .unwrap_or_else(|| settings.options.clone());
            if options.prompt.is_none() {
                options.prompt = Some(input.request.prompt().to_string());
            }
            (method, options)
        });

        Ok(Plan {
            strategy: input.strategy,
            providers,
            strategy_config,
            synthesis,
        })
    }

    /// Registered healthy providers, in request order without duplicates.
    fn resolve_providers(
        &self,
        requested: &[ProviderId],
    ) -> Result<Vec<ProviderId>, CollaborationError> {
        let manager = self.manager();
        let resolved = if requested.is_empty() {
            manager.healthy_provider_ids()
        } else {
            let mut seen = HashSet::new();
            requested
                .iter()
                .filter(|id| {
                    if !manager.is_registered(id) {
                        warn!(provider = %id, "Dropping unknown provider");
                        false
                    } else if !manager.is_healthy(id) {
                        warn!(provider = %id, "Dropping unhealthy provider");
                        false
                    } else {
                        seen.insert(*id)
                    }
                })
                .cloned()
                .collect()
        };

        if resolved.is_empty() {
            return Err(CollaborationError::NoValidProviders);
        }
        Ok(resolved)
    }

    // ==================== Execution ====================

    async fn run(
        &self,
        request: &CollaborationRequest,
        plan: &Plan,
        key: &str,
        progress: &dyn ProgressNotifier,
        started: Instant,
    ) -> Shared {
        let id = new_collaboration_id();
        info!(
            collaboration = %id,
            strategy = plan.strategy.name(),
            providers = plan.providers.len(),
            "Starting collaboration"
        );
        self.logger.log(CollaborationEvent::new(
            events::COLLABORATION_STARTED,
            json!({
                "collaboration_id": id,
                "request_id": request.id(),
                "strategy": plan.strategy.name(),
                "providers": plan.providers,
                "prompt_chars": request.prompt().chars().count(),
            }),
        ));

        let strategy_started = Instant::now();
        let output = match self
            .executor
            .execute(
                &plan.strategy,
                &plan.providers,
                request,
                &plan.strategy_config,
                progress,
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(collaboration = %id, "{}", e);
                self.metrics.increment(
                    names::COLLABORATION_REQUESTS,
                    &[("strategy", plan.strategy.name()), ("status", "error")],
                );
                self.logger.log(CollaborationEvent::new(
                    events::COLLABORATION_FINISHED,
                    json!({
                        "collaboration_id": id,
                        "success": false,
                        "error": e.to_string(),
                        "partial_outcomes": e.partial.len(),
                    }),
                ));
                return Err(CollaborationError::Strategy(e));
            }
        };
        let strategy_time_ms = elapsed_ms(strategy_started);

        for outcome in &output.outcomes {
            self.logger.log(CollaborationEvent::new(
                events::PROVIDER_OUTCOME,
                json!({
                    "collaboration_id": id,
                    "provider": outcome.provider,
                    "success": outcome.success,
                    "execution_time_ms": outcome.execution_time_ms,
                    "tokens": outcome.usage().total_tokens,
                    "error": outcome.error.as_ref().map(|e| e.message.as_str()),
                }),
            ));
        }

        let synthesis_started = Instant::now();
        let synthesis = self.synthesize(&output.outcomes, plan.synthesis.as_ref());
        let synthesis_time_ms = elapsed_ms(synthesis_started);

        let mut metrics = self.performance_metrics(&output, strategy_time_ms, synthesis_time_ms);
        let StrategyOutput {
            strategy,
            outcomes,
            state,
            consensus_level,
            ..
        } = output;
        let mut result = CollaborationResult::new(id, strategy, state, outcomes)
            .with_consensus_level(consensus_level);

        match synthesis {
            Ok(synthesis) => {
                self.logger.log(CollaborationEvent::new(
                    events::SYNTHESIS_COMPLETED,
                    json!({
                        "collaboration_id": result.id,
                        "method": synthesis.method.as_str(),
                        "confidence": synthesis.confidence,
                        "consensus_level": synthesis.consensus_level,
                        "contributors": synthesis.contributors,
                    }),
                ));
                result = result.with_synthesis(synthesis);
            }
            Err(e) => {
                warn!(collaboration = %result.id, "Synthesis skipped: {}", e);
                result = result.with_synthesis_error(e.to_string());
            }
        }

        metrics.total_time_ms = elapsed_ms(started);
        let result = result.with_metrics(metrics);

        let status = match (result.success, result.partial_success) {
            (false, _) => "failed",
            (true, true) => "partial",
            (true, false) => "success",
        };
        self.metrics.increment(
            names::COLLABORATION_REQUESTS,
            &[("strategy", result.strategy.name()), ("status", status)],
        );
        self.metrics.record_duration(
            names::COLLABORATION_DURATION,
            Duration::from_millis(result.metrics.total_time_ms),
            &[("strategy", result.strategy.name())],
        );

        if result.success {
            self.cache.set(key, result.clone(), self.config.cache_ttl).await;
        }

        info!(
            collaboration = %result.id,
            status,
            succeeded = result.success_count(),
            attempted = result.outcomes.len(),
            total_time_ms = result.metrics.total_time_ms,
            "Collaboration finished"
        );
        self.logger.log(CollaborationEvent::new(
            events::COLLABORATION_FINISHED,
            json!({
                "collaboration_id": result.id,
                "success": result.success,
                "partial_success": result.partial_success,
                "total_time_ms": result.metrics.total_time_ms,
                "total_tokens": result.metrics.total_tokens.total_tokens,
                "total_cost_usd": result.metrics.total_cost_usd,
            }),
        ));
        Ok(result)
    }

    /// Merge outcomes, degrading to best_of when the options are unusable.
    fn synthesize(
        &self,
        outcomes: &[ProviderOutcome],
        settings: Option<&(SynthesisMethod, SynthesisOptions)>,
    ) -> Result<SynthesisResult, SynthesisError> {
        let Some((method, options)) = settings else {
            return pass_through(outcomes);
        };
        match self.engine.synthesize(outcomes, *method, options) {
            Err(SynthesisError::InvalidOptions(reason)) => {
                warn!("Synthesis options rejected ({}), falling back to best_of", reason);
                let fallback = SynthesisOptions {
                    prompt: options.prompt.clone(),
                    ..SynthesisOptions::default()
                };
                self.engine
                    .synthesize(outcomes, SynthesisMethod::BestOf, &fallback)
            }
            other => other,
        }
    }

    fn performance_metrics(
        &self,
        output: &StrategyOutput,
        strategy_time_ms: u64,
        synthesis_time_ms: u64,
    ) -> PerformanceMetrics {
        let mut providers = BTreeMap::new();
        let mut total_tokens = TokenUsage::default();
        let mut total_cost_usd: Option<f64> = None;

        for outcome in &output.outcomes {
            let usage = outcome.usage();
            let cost_usd = outcome.response.as_ref().and_then(|response| {
                let model = if response.model.is_empty() {
                    self.manager().default_model(&outcome.provider)?
                } else {
                    response.model.clone()
                };
                self.pricing.estimate(&model, &usage)
            });
            if let Some(cost) = cost_usd {
                *total_cost_usd.get_or_insert(0.0) += cost;
            }
            total_tokens.add(&usage);
            providers.insert(
                outcome.provider.clone(),
                ProviderMetrics {
                    tokens: usage,
                    latency_ms: outcome.execution_time_ms,
                    cost_usd,
                },
            );
        }

        PerformanceMetrics {
            total_time_ms: 0,
            strategy_time_ms,
            execution_time_ms: output.execution_time_ms,
            synthesis_time_ms,
            providers,
            total_tokens,
            total_cost_usd,
            rounds: output.rounds,
            cache_hit: false,
        }
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<Shared>>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Place in the admission queue, released on drop.
struct QueueSlot<'a>(&'a AtomicUsize);

impl<'a> QueueSlot<'a> {
    fn take(waiting: &'a AtomicUsize, capacity: usize) -> Option<Self> {
        waiting
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            })
            .ok()
            .map(|_| Self(waiting))
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Unmerged result: the first successful response, as is.
///
/// Confidence is not assessed and reported as 0.
fn pass_through(outcomes: &[ProviderOutcome]) -> Result<SynthesisResult, SynthesisError> {
    let first = outcomes
        .iter()
        .filter(|o| o.success)
        .find_map(|o| o.response.as_ref())
        .ok_or(SynthesisError::NoSuccessfulResponses)?;
    let contents: Vec<&str> = outcomes.iter().filter_map(|o| o.content()).collect();
    Ok(SynthesisResult {
        content: first.content.clone(),
        confidence: 0.0,
        consensus_level: pairwise_agreement(&contents, SynthesisOptions::default().similarity_threshold),
        key_insights: Vec::new(),
        method: SynthesisMethod::PassThrough,
        contributors: vec![first.provider.clone()],
    })
}

/// Random, process-wide unique collaboration id.
pub fn new_collaboration_id() -> String {
    format!("collab-{}", Uuid::new_v4())
}

/// Cache key over everything that shapes the result.
///
/// Parallel and consensus runs treat providers as a set, so their list is
/// sorted. Sequential and iterative runs depend on the order given.
fn fingerprint(request: &CollaborationRequest, plan: &Plan) -> String {
    let mut providers: Vec<&str> = plan.providers.iter().map(ProviderId::as_str).collect();
    if matches!(plan.strategy, Strategy::Parallel | Strategy::Consensus(_)) {
        providers.sort_unstable();
    }

    let descriptor = json!({
        "prompt": request.prompt(),
        "model": request.model(),
        "temperature": request.temperature(),
        "max_tokens": request.max_tokens(),
        "stop": request.stop(),
        "strategy": plan.strategy,
        "strategy_config": plan.strategy_config,
        "providers": providers,
        "synthesis": plan.synthesis.as_ref().map(|(method, options)| json!({
            "method": method.as_str(),
            "options": options,
        })),
    });

    let digest = Sha256::digest(descriptor.to_string().as_bytes());
    format!("{:x}", digest)
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
