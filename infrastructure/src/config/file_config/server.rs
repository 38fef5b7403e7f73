//! Server configuration from TOML (`[server]` section)

use super::ConfigIssue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    /// Collaborations allowed to run at once
    pub max_concurrent_requests: usize,
    /// Collaborations allowed to wait for a slot
    pub queue_capacity: usize,
    /// Per-attempt provider timeout used when a provider sets none
    pub request_timeout_ms: u64,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            queue_capacity: 100,
            request_timeout_ms: 30_000,
        }
    }
}

impl FileServerConfig {
    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.max_concurrent_requests == 0 {
            issues.push(ConfigIssue::new(
                "server.max_concurrent_requests",
                "must be at least 1",
            ));
        }
        if self.request_timeout_ms == 0 {
            issues.push(ConfigIssue::new(
                "server.request_timeout_ms",
                "must be greater than 0",
            ));
        }
    }
}
