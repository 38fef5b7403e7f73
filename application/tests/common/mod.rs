//! Scripted provider adapter for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use collab_application::{
    CollaborationCache, HealthStatus, ProviderAdapter, ProviderError, ProviderManager,
};
use collab_domain::{
    CollaborationRequest, CollaborationResult, ProviderCapabilities, ProviderConfig, ProviderId,
    ProviderResponse, RateLimitConfig, RetryPolicy, TokenUsage,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
pub enum Reply {
    Ok(&'static str),
    After(u64, &'static str),
    Fail(ProviderError),
    Stall,
}

pub struct ScriptedAdapter {
    id: ProviderId,
    script: Vec<Reply>,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    /// Answers from `script` in order, repeating the last entry.
    pub fn new(id: &str, script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::from(id),
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            models: vec!["scripted".to_string()],
            max_context_tokens: 4096,
            supports_streaming: false,
            supports_system_prompt: false,
        }
    }

    async fn initialize(&self, _config: &ProviderConfig) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn generate_response(
        &self,
        _request: &CollaborationRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.script[call.min(self.script.len() - 1)].clone();
        let content = match reply {
            Reply::Ok(content) => content,
            Reply::After(ms, content) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                content
            }
            Reply::Fail(error) => return Err(error),
            Reply::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                "too late"
            }
        };
        Ok(ProviderResponse::new(self.id.clone(), "scripted", content)
            .with_usage(TokenUsage::new(5, 5)))
    }

    async fn health_status(&self) -> HealthStatus {
        HealthStatus::healthy(1)
    }
}

pub fn config(id: &str, retry: RetryPolicy) -> ProviderConfig {
    ProviderConfig::new(id, "scripted", "key", "https://scripted.invalid")
        .with_timeout(Duration::from_secs(600))
        .with_retry(retry)
        .with_rate_limit(RateLimitConfig {
            tokens_per_minute: 60_000,
            burst_size: 1000,
        })
}

/// Manager with every adapter registered without retries.
pub async fn manager(adapters: &[Arc<ScriptedAdapter>]) -> Arc<ProviderManager> {
    let manager = Arc::new(ProviderManager::new());
    for adapter in adapters {
        manager
            .register_adapter(
                config(adapter.id.as_str(), RetryPolicy::none()),
                Arc::clone(adapter) as Arc<dyn ProviderAdapter>,
            )
            .await
            .unwrap();
    }
    manager
}

/// Cache backed by a plain map, ignoring ttl.
#[derive(Default)]
pub struct MapCache {
    entries: Mutex<HashMap<String, CollaborationResult>>,
}

#[async_trait]
impl CollaborationCache for MapCache {
    async fn get(&self, key: &str) -> Option<CollaborationResult> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: CollaborationResult, _ttl: Duration) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
}
