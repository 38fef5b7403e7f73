//! Collaboration request value object

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inclusive temperature bounds accepted by every provider.
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);

fn generate_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

/// An abstract generation request sent to every provider of a collaboration.
///
/// Fields are private and the type only offers consuming builders, so a
/// request is effectively immutable once it has been handed to a strategy.
/// Refinement rounds derive a *new* request through [`CollaborationRequest::derive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationRequest {
    #[serde(default = "generate_request_id")]
    id: String,
    prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

impl CollaborationRequest {
    /// Create a request with default sampling parameters and a fresh id.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: generate_request_id(),
            prompt: prompt.into(),
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            stop: Vec::new(),
        }
    }

    /// Set the model hint passed to adapters.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    /// Build a follow-up request with a different prompt.
    ///
    /// Sampling parameters are carried over; the id is regenerated so that
    /// each provider call stays uniquely identifiable.
    pub fn derive(&self, prompt: impl Into<String>) -> Self {
        Self {
            id: generate_request_id(),
            prompt: prompt.into(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn stop(&self) -> &[String] {
        &self.stop
    }

    /// Check every field and report all violations at once.
    ///
    /// Returns `Ok(())` for a valid request, otherwise the full list of
    /// human-readable problems (never just the first one).
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.prompt.trim().is_empty() {
            errors.push("prompt must not be empty".to_string());
        }

        let (min, max) = TEMPERATURE_RANGE;
        if !self.temperature.is_finite() || self.temperature < min || self.temperature > max {
            errors.push(format!(
                "temperature must be between {} and {}, got {}",
                min, max, self.temperature
            ));
        }

        if self.max_tokens == 0 {
            errors.push("max_tokens must be greater than 0".to_string());
        }

        if self.stop.iter().any(|s| s.is_empty()) {
            errors.push("stop sequences must not be empty strings".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<&str> for CollaborationRequest {
    fn from(s: &str) -> Self {
        CollaborationRequest::new(s)
    }
}

impl From<String> for CollaborationRequest {
    fn from(s: String) -> Self {
        CollaborationRequest::new(s)
    }
}
