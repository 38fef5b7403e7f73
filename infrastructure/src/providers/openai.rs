//! OpenAI-compatible chat completions adapter
//!
//! Works against api.openai.com and any server exposing the same
//! `/v1/chat/completions` shape (vLLM, Ollama, LiteLLM proxies, ...).

use super::http;
use async_trait::async_trait;
use collab_application::{HealthStatus, ProviderAdapter, ProviderError, RequestValidation};
use collab_domain::{
    CollaborationRequest, FinishReason, ProviderCapabilities, ProviderConfig, ProviderResponse,
    TokenUsage,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

pub const KIND: &str = "openai";

const COMPLETIONS_PATH: &str = "v1/chat/completions";
const MODELS_PATH: &str = "v1/models";

pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiCompatibleAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn model_for<'a>(&'a self, request: &'a CollaborationRequest) -> &'a str {
        request.model().unwrap_or(self.config.default_model.as_str())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn build_body<'a>(request: &'a CollaborationRequest, model: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: request.prompt(),
        }],
        temperature: request.temperature(),
        max_tokens: request.max_tokens(),
        stop: request.stop(),
    }
}

fn into_response(
    body: ChatResponse,
    provider: &ProviderConfig,
    requested_model: &str,
    latency: Duration,
) -> Result<ProviderResponse, ProviderError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Other("Response contained no choices".to_string()))?;

    let usage = body
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();
    let finish_reason = choice
        .finish_reason
        .as_deref()
        .map(FinishReason::from_provider)
        .unwrap_or(FinishReason::Unknown);

    let mut response = ProviderResponse::new(
        provider.id.clone(),
        body.model.unwrap_or_else(|| requested_model.to_string()),
        choice.message.content.unwrap_or_default(),
    )
    .with_usage(usage)
    .with_latency_ms(latency.as_millis() as u64)
    .with_finish_reason(finish_reason);
    if let Some(id) = body.id {
        response = response.with_metadata("completion_id", serde_json::Value::String(id));
    }
    Ok(response)
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            models: if self.config.default_model.is_empty() {
                Vec::new()
            } else {
                vec![self.config.default_model.clone()]
            },
            max_context_tokens: 128_000,
            supports_streaming: false,
            supports_system_prompt: true,
        }
    }

    async fn initialize(&self, config: &ProviderConfig) -> Result<(), ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Authentication(format!(
                "no API key configured for {}",
                config.id
            )));
        }
        Ok(())
    }

    async fn generate_response(
        &self,
        request: &CollaborationRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let model = self.model_for(request);
        let url = http::endpoint(&self.config.base_url, COMPLETIONS_PATH);
        debug!(provider = %self.config.id, model, "POST {}", url);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&build_body(request, model))
            .send()
            .await
            .map_err(|e| http::classify_transport(&e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(http::classify_status(status, &headers, &text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| http::classify_transport(&e, self.config.timeout))?;
        into_response(body, &self.config, model, started.elapsed())
    }

    fn validate_request(&self, request: &CollaborationRequest) -> RequestValidation {
        let mut errors = request.validate().err().unwrap_or_default();
        if self.model_for(request).is_empty() {
            errors.push(format!(
                "provider {} has no default model and the request names none",
                self.config.id
            ));
        }
        RequestValidation::from_result(if errors.is_empty() { Ok(()) } else { Err(errors) })
    }

    async fn health_status(&self) -> HealthStatus {
        http::probe(
            self.client
                .get(http::endpoint(&self.config.base_url, MODELS_PATH))
                .bearer_auth(&self.config.api_key),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ProviderConfig {
        ProviderConfig::new("gpt", KIND, "sk-test", "https://api.openai.com")
            .with_default_model("gpt-4o-mini")
    }

    #[test]
    fn test_body_uses_request_parameters() {
        let request = CollaborationRequest::new("Hello")
            .with_temperature(0.2)
            .with_max_tokens(64)
            .with_stop(vec!["END".into()]);
        let body = serde_json::to_value(build_body(&request, "gpt-4o")).unwrap();

        assert_eq!(body["model"], json!("gpt-4o"));
        assert_eq!(body["messages"][0]["role"], json!("user"));
        assert_eq!(body["messages"][0]["content"], json!("Hello"));
        assert_eq!(body["max_tokens"], json!(64));
        assert_eq!(body["stop"], json!(["END"]));
    }

    #[test]
    fn test_body_omits_empty_stop() {
        let request = CollaborationRequest::new("Hello");
        let body = serde_json::to_value(build_body(&request, "m")).unwrap();
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn test_parse_completion() {
        let body: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Paris" },
                "finish_reason": "length"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        }))
        .unwrap();

        let response =
            into_response(body, &config(), "gpt-4o-mini", Duration::from_millis(42)).unwrap();
        assert_eq!(response.content, "Paris");
        assert_eq!(response.model, "gpt-4o-mini-2024");
        assert_eq!(response.usage, TokenUsage::new(12, 3));
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.latency_ms, 42);
        assert_eq!(response.provider.as_str(), "gpt");
        assert_eq!(response.metadata["completion_id"], json!("chatcmpl-1"));
    }

    #[test]
    fn test_parse_without_choices_fails() {
        let body: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        let err = into_response(body, &config(), "m", Duration::ZERO).unwrap_err();
        assert!(matches!(err, ProviderError::Other(_)));
    }

    #[test]
    fn test_validate_requires_some_model() {
        let mut cfg = config();
        cfg.default_model.clear();
        let adapter = OpenAiCompatibleAdapter::new(&cfg).unwrap();

        assert!(!adapter.validate_request(&CollaborationRequest::new("q")).valid);
        assert!(
            adapter
                .validate_request(&CollaborationRequest::new("q").with_model("gpt-4o"))
                .valid
        );
    }

    #[tokio::test]
    async fn test_initialize_rejects_blank_key() {
        let mut cfg = config();
        let adapter = OpenAiCompatibleAdapter::new(&cfg).unwrap();
        cfg.api_key = " ".into();
        assert!(matches!(
            adapter.initialize(&cfg).await,
            Err(ProviderError::Authentication(_))
        ));
    }
}
