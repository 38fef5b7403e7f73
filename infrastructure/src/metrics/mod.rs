//! Metrics sinks

mod tracing_sink;

pub use tracing_sink::{METRICS_TARGET, TracingMetricsSink};
