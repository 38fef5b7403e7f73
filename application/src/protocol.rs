//! Protocol-facing service
//!
//! The surface a transport (JSON-RPC over stdio, HTTP, ...) calls into:
//!
//! | Method                   | Params            | Result                |
//! |--------------------------|-------------------|-----------------------|
//! | `collaboration/execute`  | [`ExecuteParams`] | `CollaborationResult` |
//! | `synthesis/create`       | [`SynthesisParams`] | `SynthesisResult`   |
//!
//! Every failure is a [`ProtocolError`] with a JSON-RPC style code; nothing
//! here panics or terminates the process.

use crate::use_cases::create_synthesis::{CreateSynthesisInput, CreateSynthesisUseCase};
use crate::use_cases::run_collaboration::{
    CollaborationError, CollaborationOrchestrator, RunCollaborationInput,
};
use collab_domain::{
    CollaborationRequest, CollaborationResult, ProviderId, ProviderResponse, Strategy,
    StrategyConfig, SynthesisError, SynthesisMethod, SynthesisOptions, SynthesisResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const METHOD_EXECUTE: &str = "collaboration/execute";
pub const METHOD_CREATE_SYNTHESIS: &str = "synthesis/create";

/// Error codes returned in [`ProtocolError::code`].
pub mod codes {
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const NO_VALID_PROVIDERS: i32 = -32001;
    pub const STRATEGY_FAILED: i32 = -32002;
    pub const SYNTHESIS_FAILED: i32 = -32003;
    pub const OVERLOADED: i32 = -32004;
}

/// Structured error object handed back to protocol clients.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ProtocolError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProtocolError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }
}

impl From<CollaborationError> for ProtocolError {
    fn from(error: CollaborationError) -> Self {
        let message = error.to_string();
        match error {
            CollaborationError::Validation(errors) => {
                Self::new(codes::INVALID_PARAMS, message).with_data(json!({ "errors": errors }))
            }
            CollaborationError::NoValidProviders => Self::new(codes::NO_VALID_PROVIDERS, message),
            CollaborationError::Strategy(e) => Self::new(codes::STRATEGY_FAILED, message)
                .with_data(json!({ "partial_outcomes": e.partial })),
            CollaborationError::Overloaded => Self::new(codes::OVERLOADED, message),
        }
    }
}

impl From<SynthesisError> for ProtocolError {
    fn from(error: SynthesisError) -> Self {
        match error {
            SynthesisError::InvalidOptions(_) => Self::new(codes::INVALID_PARAMS, error.to_string()),
            SynthesisError::NoSuccessfulResponses => {
                Self::new(codes::SYNTHESIS_FAILED, error.to_string())
            }
        }
    }
}

/// Params of `collaboration/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteParams {
    #[serde(default)]
    pub strategy: Strategy,
    /// Empty means every registered healthy provider
    #[serde(default)]
    pub providers: Vec<ProviderId>,
    pub request: CollaborationRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_config: Option<StrategyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_method: Option<SynthesisMethod>,
}

/// Params of `synthesis/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisParams {
    pub responses: Vec<ProviderResponse>,
    #[serde(default)]
    pub method: SynthesisMethod,
    #[serde(default)]
    pub options: SynthesisOptions,
}

pub struct CollaborationService {
    orchestrator: Arc<CollaborationOrchestrator>,
    synthesis: CreateSynthesisUseCase,
}

impl CollaborationService {
    pub fn new(orchestrator: Arc<CollaborationOrchestrator>) -> Self {
        Self {
            orchestrator,
            synthesis: CreateSynthesisUseCase::new(),
        }
    }

    pub async fn execute(&self, params: ExecuteParams) -> Result<CollaborationResult, ProtocolError> {
        let mut input = RunCollaborationInput::new(params.request, params.strategy)
            .with_providers(params.providers);
        if let Some(config) = params.strategy_config {
            input = input.with_strategy_config(config);
        }
        if let Some(method) = params.synthesis_method {
            input = input.with_synthesis_method(method);
        }
        Ok(self.orchestrator.execute(input).await?)
    }

    pub fn create_synthesis(&self, params: SynthesisParams) -> Result<SynthesisResult, ProtocolError> {
        let input =
            CreateSynthesisInput::new(params.responses, params.method).with_options(params.options);
        Ok(self.synthesis.execute(input)?)
    }

    /// Dispatch a raw method call with JSON params.
    pub async fn handle(&self, method: &str, params: Value) -> Result<Value, ProtocolError> {
        debug!(method, "Handling protocol call");
        match method {
            METHOD_EXECUTE => {
                let params: ExecuteParams = parse(params)?;
                to_value(self.execute(params).await?)
            }
            METHOD_CREATE_SYNTHESIS => {
                let params: SynthesisParams = parse(params)?;
                to_value(self.create_synthesis(params)?)
            }
            other => Err(ProtocolError::new(
                codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", other),
            )),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(params)
        .map_err(|e| ProtocolError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ProtocolError> {
    serde_json::to_value(value).map_err(|e| {
        ProtocolError::new(codes::STRATEGY_FAILED, format!("Unserializable result: {}", e))
    })
}
