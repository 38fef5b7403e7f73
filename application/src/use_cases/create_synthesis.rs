//! Create Synthesis use case
//!
//! Merges caller-supplied responses without calling any provider.

use collab_domain::{
    ProviderOutcome, ProviderResponse, SynthesisEngine, SynthesisError, SynthesisMethod,
    SynthesisOptions, SynthesisResult,
};
use tracing::debug;

/// Input for the CreateSynthesis use case
#[derive(Debug, Clone)]
pub struct CreateSynthesisInput {
    pub responses: Vec<ProviderResponse>,
    pub method: SynthesisMethod,
    pub options: SynthesisOptions,
}

impl CreateSynthesisInput {
    pub fn new(responses: Vec<ProviderResponse>, method: SynthesisMethod) -> Self {
        Self {
            responses,
            method,
            options: SynthesisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SynthesisOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateSynthesisUseCase {
    engine: SynthesisEngine,
}

impl CreateSynthesisUseCase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every response counts as a successful outcome with its own latency.
    pub fn execute(&self, input: CreateSynthesisInput) -> Result<SynthesisResult, SynthesisError> {
        if input.method == SynthesisMethod::PassThrough {
            return Err(SynthesisError::InvalidOptions(
                "pass_through is not a synthesis method".to_string(),
            ));
        }
        debug!(
            responses = input.responses.len(),
            method = input.method.as_str(),
            "Synthesizing supplied responses"
        );
        let outcomes: Vec<ProviderOutcome> = input
            .responses
            .into_iter()
            .map(|response| {
                let latency_ms = response.latency_ms;
                ProviderOutcome::success(response, latency_ms)
            })
            .collect();
        self.engine.synthesize(&outcomes, input.method, &input.options)
    }
}
