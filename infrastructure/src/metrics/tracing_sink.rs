//! Metrics emitted as `tracing` events
//!
//! Every value becomes a `debug` event on the `collab::metrics` target, so
//! `RUST_LOG=collab::metrics=debug` is enough to see them without a
//! metrics backend.

use collab_application::MetricsSink;
use collab_application::ports::metrics::Labels;
use collab_domain::{ProviderId, TokenUsage};
use std::time::Duration;
use tracing::debug;

pub const METRICS_TARGET: &str = "collab::metrics";

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl TracingMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

/// `k=v,k=v`
fn render(labels: Labels<'_>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

impl MetricsSink for TracingMetricsSink {
    fn increment(&self, name: &'static str, labels: Labels<'_>) {
        debug!(target: "collab::metrics", metric = name, kind = "counter", value = 1u64, labels = %render(labels));
    }

    fn record_duration(&self, name: &'static str, duration: Duration, labels: Labels<'_>) {
        debug!(
            target: "collab::metrics",
            metric = name,
            kind = "histogram",
            value_ms = duration.as_millis() as u64,
            labels = %render(labels)
        );
    }

    fn record_tokens(&self, provider: &ProviderId, usage: &TokenUsage) {
        debug!(
            target: "collab::metrics",
            metric = "provider_tokens_total",
            kind = "counter",
            provider = %provider,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_labels() {
        assert_eq!(render(&[]), "");
        assert_eq!(
            render(&[("provider", "openai"), ("status", "success")]),
            "provider=openai,status=success"
        );
    }

    #[test]
    fn test_sink_accepts_all_metrics_without_subscriber() {
        let sink = TracingMetricsSink::new();
        sink.increment("cache_hits_total", &[]);
        sink.record_duration(
            "collaboration_duration",
            Duration::from_millis(12),
            &[("strategy", "parallel")],
        );
        sink.record_tokens(&ProviderId::from("a"), &TokenUsage::new(3, 4));
    }
}
