//! Orchestration value objects - immutable result types for one collaboration.
//!
//! These types represent what a strategy run produces:
//! - [`ProviderOutcome`] - Exactly one per provider attempted
//! - [`PerformanceMetrics`] - Timings, tokens and cost estimates
//! - [`CollaborationResult`] - Complete result handed back to the caller

use super::strategy::{Strategy, StrategyState};
use crate::core::error::ErrorKind;
use crate::core::response::{ProviderResponse, TokenUsage};
use crate::provider::ProviderId;
use crate::synthesis::SynthesisResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classified failure recorded for an unsuccessful provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Attempts made before giving up (1 when no retry happened)
    pub attempts: u32,
}

/// Result of calling one provider during a strategy run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: ProviderId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ProviderResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
    /// Wall-clock time spent on this provider, retries included
    pub execution_time_ms: u64,
}

impl ProviderOutcome {
    pub fn success(response: ProviderResponse, execution_time_ms: u64) -> Self {
        Self {
            provider: response.provider.clone(),
            success: true,
            response: Some(response),
            error: None,
            execution_time_ms,
        }
    }

    pub fn failure(
        provider: impl Into<ProviderId>,
        kind: ErrorKind,
        message: impl Into<String>,
        attempts: u32,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            provider: provider.into(),
            success: false,
            response: None,
            error: Some(OutcomeError {
                kind,
                message: message.into(),
                attempts,
            }),
            execution_time_ms,
        }
    }

    /// Outcome for a call that was still pending when its deadline fired.
    pub fn timeout(provider: impl Into<ProviderId>, execution_time_ms: u64) -> Self {
        Self::failure(
            provider,
            ErrorKind::Timeout,
            format!("deadline of {}ms elapsed", execution_time_ms),
            1,
            execution_time_ms,
        )
    }

    pub fn content(&self) -> Option<&str> {
        self.response.as_ref().map(|r| r.content.as_str())
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn usage(&self) -> TokenUsage {
        self.response.as_ref().map(|r| r.usage).unwrap_or_default()
    }
}

/// Per-provider slice of the performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetrics {
    pub tokens: TokenUsage,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// End-to-end time inside the orchestrator
    pub total_time_ms: u64,
    /// Wall-clock time of the strategy run
    pub strategy_time_ms: u64,
    /// Strategy-defined execution time (max for parallel, sum for sequential)
    pub execution_time_ms: u64,
    pub synthesis_time_ms: u64,
    pub providers: BTreeMap<ProviderId, ProviderMetrics>,
    pub total_tokens: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    pub rounds: usize,
    pub cache_hit: bool,
}

/// Complete result of one collaboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationResult {
    /// Unique per call, never derived from the request content
    pub id: String,
    pub success: bool,
    pub partial_success: bool,
    pub strategy: Strategy,
    pub state: StrategyState,
    pub outcomes: Vec<ProviderOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<SynthesisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_level: Option<f64>,
    pub metrics: PerformanceMetrics,
}

impl CollaborationResult {
    /// Build a result from strategy outcomes, deriving the success flags.
    pub fn new(
        id: impl Into<String>,
        strategy: Strategy,
        state: StrategyState,
        outcomes: Vec<ProviderOutcome>,
    ) -> Self {
        let (success, partial_success) = success_flags(&outcomes);
        Self {
            id: id.into(),
            success,
            partial_success,
            strategy,
            state,
            outcomes,
            synthesis: None,
            synthesis_error: None,
            consensus_level: None,
            metrics: PerformanceMetrics::default(),
        }
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisResult) -> Self {
        self.synthesis = Some(synthesis);
        self
    }

    pub fn with_synthesis_error(mut self, error: impl Into<String>) -> Self {
        self.synthesis_error = Some(error.into());
        self
    }

    pub fn with_consensus_level(mut self, level: Option<f64>) -> Self {
        self.consensus_level = level;
        self
    }

    pub fn with_metrics(mut self, metrics: PerformanceMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn successful(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn success_count(&self) -> usize {
        self.successful().count()
    }

    /// Final answer text: the synthesis when present, otherwise nothing.
    pub fn content(&self) -> Option<&str> {
        self.synthesis.as_ref().map(|s| s.content.as_str())
    }
}

/// `(success, partial_success)` for a set of attempted outcomes.
///
/// `success` needs at least one success; `partial_success` holds only when
/// some but not all attempted providers succeeded.
pub fn success_flags(outcomes: &[ProviderOutcome]) -> (bool, bool) {
    let attempted = outcomes.len();
    let succeeded = outcomes.iter().filter(|o| o.success).count();
    (succeeded >= 1, succeeded > 0 && succeeded < attempted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(provider: &str) -> ProviderOutcome {
        ProviderOutcome::success(ProviderResponse::new(provider, "m", "content"), 10)
    }

    fn failed(provider: &str) -> ProviderOutcome {
        ProviderOutcome::failure(provider, ErrorKind::ServerError, "boom", 4, 20)
    }

    #[test]
    fn test_success_flags() {
        assert_eq!(success_flags(&[ok("a"), ok("b")]), (true, false));
        assert_eq!(success_flags(&[ok("a"), failed("b")]), (true, true));
        assert_eq!(success_flags(&[failed("a"), failed("b")]), (false, false));
        assert_eq!(success_flags(&[]), (false, false));
    }

    #[test]
    fn test_timeout_outcome() {
        let outcome = ProviderOutcome::timeout("slow", 3000);
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Timeout));
        assert!(outcome.content().is_none());
    }

    #[test]
    fn test_result_counts_successes() {
        let result = CollaborationResult::new(
            "collab-1",
            Strategy::Parallel,
            StrategyState::Completed,
            vec![ok("a"), failed("b"), ok("c")],
        );
        assert!(result.success);
        assert!(result.partial_success);
        assert_eq!(result.success_count(), 2);
        assert!(result.content().is_none());
    }

    #[test]
    fn test_outcome_serialization_skips_empty_fields() {
        let json = serde_json::to_value(failed("b")).unwrap();
        assert!(json.get("response").is_none());
        assert_eq!(json["error"]["kind"], "server_error");
        assert_eq!(json["error"]["attempts"], 4);
    }
}
