//! Output formatter trait

use collab_domain::CollaborationResult;

/// Trait for formatting collaboration results
pub trait OutputFormatter {
    /// Format the complete result: every outcome, the synthesis and metrics
    fn format(&self, prompt: &str, result: &CollaborationResult) -> String;

    /// Format as JSON
    fn format_json(&self, result: &CollaborationResult) -> String;

    /// Format the synthesized answer only (concise output)
    fn format_synthesis_only(&self, result: &CollaborationResult) -> String;
}
