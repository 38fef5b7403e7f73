//! Provider adapter port
//!
//! Defines the interface every AI backend implements. Adapters translate a
//! [`CollaborationRequest`] into one backend call and classify its failures;
//! transport details stay in the infrastructure layer.

use async_trait::async_trait;
use collab_domain::{
    CollaborationRequest, ErrorKind, ProviderCapabilities, ProviderConfig, ProviderResponse,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Classified failure of a provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Invalid request: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),

    #[error("{last} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Validation(_) => ErrorKind::Validation,
            ProviderError::Authentication(_) => ErrorKind::Authentication,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::Timeout(_) => ErrorKind::Timeout,
            ProviderError::Server { .. } => ErrorKind::ServerError,
            ProviderError::Network(_) => ErrorKind::Network,
            ProviderError::Other(_) => ErrorKind::Internal,
            ProviderError::RetriesExhausted { last, .. } => last.kind(),
        }
    }

    /// Whether repeating the call may succeed.
    ///
    /// Rate limiting is retryable only when the backend says when to retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::Server { .. }
            | ProviderError::Network(_) => true,
            ProviderError::RateLimited { retry_after } => retry_after.is_some(),
            ProviderError::Validation(_)
            | ProviderError::Authentication(_)
            | ProviderError::Other(_)
            | ProviderError::RetriesExhausted { .. } => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Attempts behind this error (1 unless retries were exhausted).
    pub fn attempts(&self) -> u32 {
        match self {
            ProviderError::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

/// Result of [`ProviderAdapter::validate_request`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl RequestValidation {
    pub fn from_result(result: Result<(), Vec<String>>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                errors: Vec::new(),
            },
            Err(errors) => Self {
                valid: false,
                errors,
            },
        }
    }
}

/// Result of [`ProviderAdapter::health_status`].
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            healthy: true,
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            latency_ms: None,
            message: Some(message.into()),
        }
    }
}

/// One AI backend behind a uniform capability interface.
///
/// Implementations must be cheap to share: the provider manager keeps one
/// instance per registered provider and calls it from many tasks at once.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Static capability metadata
    fn capabilities(&self) -> ProviderCapabilities;

    /// Prepare the adapter for `config`; called once at registration
    async fn initialize(&self, config: &ProviderConfig) -> Result<(), ProviderError>;

    /// Generate one completion
    async fn generate_response(
        &self,
        request: &CollaborationRequest,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Check a request before sending it
    fn validate_request(&self, request: &CollaborationRequest) -> RequestValidation {
        RequestValidation::from_result(request.validate())
    }

    /// Probe the backend
    async fn health_status(&self) -> HealthStatus;

    /// Release resources held by the adapter
    async fn dispose(&self) {}
}

/// Builds adapters from provider configuration (a name-keyed registry in
/// the infrastructure layer).
pub trait AdapterFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(
            ProviderError::Server {
                status: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            }
            .is_retryable()
        );
        assert!(!ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(!ProviderError::Validation(vec!["bad".into()]).is_retryable());
        assert!(!ProviderError::Authentication("bad key".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_keeps_last_kind() {
        let error = ProviderError::RetriesExhausted {
            attempts: 4,
            last: Box::new(ProviderError::Timeout(Duration::from_millis(500))),
        };
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert_eq!(error.attempts(), 4);
        assert!(!error.is_retryable());
        assert_eq!(
            error.to_string(),
            "Timed out after 500ms (gave up after 4 attempts)"
        );
    }

    #[test]
    fn test_validation_display_joins_errors() {
        let error = ProviderError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(error.to_string(), "Invalid request: a; b");
    }

    #[test]
    fn test_request_validation_from_result() {
        let ok = RequestValidation::from_result(Ok(()));
        assert!(ok.valid);
        let bad = RequestValidation::from_result(Err(vec!["prompt".into()]));
        assert!(!bad.valid);
        assert_eq!(bad.errors, vec!["prompt".to_string()]);
    }
}
