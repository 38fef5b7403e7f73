//! Metrics sink port
//!
//! The core only emits values; exporting and aggregation belong to the sink.

use collab_domain::{ProviderId, TokenUsage};
use std::time::Duration;

/// Metric names emitted by the orchestration core.
pub mod names {
    pub const COLLABORATION_REQUESTS: &str = "collaboration_requests_total";
    pub const COLLABORATION_DURATION: &str = "collaboration_duration";
    pub const PROVIDER_REQUESTS: &str = "provider_requests_total";
    pub const PROVIDER_LATENCY: &str = "provider_latency";
    pub const CACHE_HITS: &str = "cache_hits_total";
    pub const CACHE_MISSES: &str = "cache_misses_total";
}

/// Label key/value pairs attached to one measurement.
pub type Labels<'a> = &'a [(&'static str, &'a str)];

pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &'static str, labels: Labels<'_>);

    fn record_duration(&self, name: &'static str, duration: Duration, labels: Labels<'_>);

    fn record_tokens(&self, provider: &ProviderId, usage: &TokenUsage);
}

/// Sink that drops every measurement.
pub struct NoMetrics;

impl MetricsSink for NoMetrics {
    fn increment(&self, _name: &'static str, _labels: Labels<'_>) {}

    fn record_duration(&self, _name: &'static str, _duration: Duration, _labels: Labels<'_>) {}

    fn record_tokens(&self, _provider: &ProviderId, _usage: &TokenUsage) {}
}
