//! Domain error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed provider call.
///
/// This is the serializable summary recorded in a
/// [`ProviderOutcome`](crate::orchestration::ProviderOutcome); the richer
/// error values live with the provider port in the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was rejected as malformed
    Validation,
    /// Credentials were missing or refused
    Authentication,
    /// The provider's rate limit (local or remote) was hit
    RateLimited,
    /// The call did not finish before its deadline
    Timeout,
    /// The backend answered with a 5xx status
    ServerError,
    /// Connection-level failure
    Network,
    /// Anything else, including a crashed provider task
    Internal,
}

impl ErrorKind {
    /// Whether a call failing with this kind may succeed when repeated.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::ServerError | ErrorKind::Network
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Network => "network",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised while merging provider outputs.
///
/// Synthesis errors are non-fatal for a collaboration: the orchestrator
/// degrades to a raw result instead of failing the whole call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("No successful responses to synthesize")]
    NoSuccessfulResponses,

    #[error("Invalid synthesis options: {0}")]
    InvalidOptions(String),
}
