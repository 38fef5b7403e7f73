//! Anthropic Messages API adapter

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

pub const KIND: &str = "anthropic";

pub const API_VERSION: &str = "2023-06-01";

const MESSAGES_PATH: &str = "v1/messages";
const MODELS_PATH: &str = "v1/models";

/// The Messages API caps temperature at 1.0.
const MAX_TEMPERATURE: f32 = 1.0;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl AnthropicAdapter {
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

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn build_body<'a>(request: &'a CollaborationRequest, model: &'a str) -> MessagesRequest<'a> {
    MessagesRequest {
        model,
        max_tokens: request.max_tokens(),
        messages: vec![Message {
            role: "user",
            content: request.prompt(),
        }],
        temperature: request.temperature().min(MAX_TEMPERATURE),
        stop_sequences: request.stop(),
    }
}

fn into_response(
    body: MessagesResponse,
    provider: &ProviderConfig,
    requested_model: &str,
    latency: Duration,
) -> Result<ProviderResponse, ProviderError> {
    let texts: Vec<String> = body
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if texts.is_empty() {
        return Err(ProviderError::Other(
            "Response contained no text blocks".to_string(),
        ));
    }

    let usage = body
        .usage
        .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
        .unwrap_or_default();
    let finish_reason = body
        .stop_reason
        .as_deref()
        .map(FinishReason::from_provider)
        .unwrap_or(FinishReason::Unknown);

    let mut response = ProviderResponse::new(
        provider.id.clone(),
        body.model.unwrap_or_else(|| requested_model.to_string()),
        texts.concat(),
    )
    .with_usage(usage)
    .with_latency_ms(latency.as_millis() as u64)
    .with_finish_reason(finish_reason);
    if let Some(id) = body.id {
        response = response.with_metadata("message_id", serde_json::Value::String(id));
    }
    Ok(response)
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            models: if self.config.default_model.is_empty() {
                Vec::new()
            } else {
                vec![self.config.default_model.clone()]
            },
            max_context_tokens: 200_000,
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
        let url = http::endpoint(&self.config.base_url, MESSAGES_PATH);
        debug!(provider = %self.config.id, model, "POST {}", url);

        let started = Instant::now();
        let response = self
            .authorized(self.client.post(&url))
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

        let body: MessagesResponse = response
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
        http::probe(self.authorized(
            self.client
                .get(http::endpoint(&self.config.base_url, MODELS_PATH)),
        ))
        .await
    }
}
