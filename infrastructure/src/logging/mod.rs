//! Collaboration transcript logging
//!
//! [`JsonlCollaborationLogger`] appends one JSON object per
//! [`CollaborationEvent`](collab_application::CollaborationEvent) to a file,
//! separate from the diagnostic `tracing` output.

mod jsonl_logger;

pub use jsonl_logger::JsonlCollaborationLogger;
