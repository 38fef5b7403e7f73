//! Port for structured collaboration transcripts.
//!
//! Separate from `tracing`-based diagnostics: tracing carries human-readable
//! operation logs, while this port records each collaboration as
//! machine-readable events (one JSON object per event).

use serde_json::Value;

/// Event type identifiers written by the orchestrator.
pub mod events {
    pub const COLLABORATION_STARTED: &str = "collaboration_started";
    pub const PROVIDER_OUTCOME: &str = "provider_outcome";
    pub const SYNTHESIS_COMPLETED: &str = "synthesis_completed";
    pub const COLLABORATION_FINISHED: &str = "collaboration_finished";
}

/// One structured transcript event.
pub struct CollaborationEvent {
    pub event_type: &'static str,
    /// Event-specific fields
    pub payload: Value,
}

impl CollaborationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Records transcript events.
///
/// `log` is synchronous and infallible; write failures are the
/// implementation's problem and never reach the collaboration.
pub trait CollaborationLogger: Send + Sync {
    fn log(&self, event: CollaborationEvent);
}

/// Logger for tests and when transcripts are disabled.
pub struct NoCollaborationLogger;

impl CollaborationLogger for NoCollaborationLogger {
    fn log(&self, _event: CollaborationEvent) {}
}
