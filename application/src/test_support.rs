//! Scripted provider adapters shared by the unit tests of this crate.

use crate::ports::provider_adapter::{HealthStatus, ProviderAdapter, ProviderError};
use crate::providers::ProviderManager;
use async_trait::async_trait;
use collab_domain::{
    CollaborationRequest, ProviderCapabilities, ProviderConfig, ProviderId, ProviderResponse,
    RateLimitConfig, RetryPolicy, TokenUsage,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer: wait `delay`, then return `result`.
#[derive(Clone)]
pub(crate) struct Scripted {
    pub delay: Duration,
    pub result: Result<String, ProviderError>,
}

impl Scripted {
    pub fn reply(content: &str) -> Self {
        Self::reply_after(0, content)
    }

    pub fn reply_after(ms: u64, content: &str) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            result: Ok(content.to_string()),
        }
    }

    pub fn fail(error: ProviderError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn stall() -> Self {
        Self::reply_after(3_600_000, "too late")
    }
}

type Responder = Box<dyn Fn(&CollaborationRequest, usize) -> Scripted + Send + Sync>;

pub(crate) struct MockAdapter {
    id: ProviderId,
    responder: Responder,
    healthy: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn with_responder(
        id: &str,
        responder: impl Fn(&CollaborationRequest, usize) -> Scripted + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: ProviderId::from(id),
            responder: Box::new(responder),
            healthy: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers from `script` in order, repeating the last entry.
    pub fn scripted(id: &str, script: Vec<Scripted>) -> Self {
        Self::with_responder(id, move |_, call| {
            script[call.min(script.len() - 1)].clone()
        })
    }

    pub fn replying(id: &str, content: &str) -> Self {
        Self::scripted(id, vec![Scripted::reply(content)])
    }

    pub fn failing(id: &str, error: ProviderError) -> Self {
        Self::scripted(id, vec![Scripted::fail(error)])
    }

    pub fn stalling(id: &str) -> Self {
        Self::scripted(id, vec![Scripted::stall()])
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            models: vec![],
            max_context_tokens: 8192,
            supports_streaming: false,
            supports_system_prompt: true,
        }
    }

    async fn initialize(&self, _config: &ProviderConfig) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn generate_response(
        &self,
        request: &CollaborationRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.prompt().to_string());
            prompts.len() - 1
        };
        let scripted = (self.responder)(request, call);
        tokio::time::sleep(scripted.delay).await;
        scripted.result.map(|content| {
            ProviderResponse::new(self.id.clone(), "mock-model", content)
                .with_usage(TokenUsage::new(10, 20))
                .with_latency_ms(scripted.delay.as_millis() as u64)
        })
    }

    async fn health_status(&self) -> HealthStatus {
        if self.healthy {
            HealthStatus::healthy(1)
        } else {
            HealthStatus::unhealthy("probe refused")
        }
    }
}

/// Valid configuration without retries and with a generous rate limit.
pub(crate) fn test_config(id: &str) -> ProviderConfig {
    ProviderConfig::new(id, "mock", "test-key", "https://mock.invalid")
        .with_timeout(Duration::from_secs(600))
        .with_retry(RetryPolicy::none())
        .with_rate_limit(RateLimitConfig {
            tokens_per_minute: 6000,
            burst_size: 100,
        })
}

/// Manager with every adapter registered under its test config.
pub(crate) async fn manager_with(adapters: Vec<(&str, Arc<MockAdapter>)>) -> Arc<ProviderManager> {
    let manager = Arc::new(ProviderManager::new());
    for (id, adapter) in adapters {
        manager
            .register_adapter(test_config(id), adapter)
            .await
            .unwrap();
    }
    manager
}
