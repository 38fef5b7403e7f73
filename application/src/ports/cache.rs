//! Collaboration cache port
//!
//! Stores finished collaboration results under a request fingerprint.
//! Eviction (LRU, LFU, TTL sweep) is the backend's concern.

use async_trait::async_trait;
use collab_domain::CollaborationResult;
use std::time::Duration;

#[async_trait]
pub trait CollaborationCache: Send + Sync {
    /// Cached result for `key`, if present and not expired
    async fn get(&self, key: &str) -> Option<CollaborationResult>;

    /// Store `value` under `key` for at most `ttl`
    async fn set(&self, key: &str, value: CollaborationResult, ttl: Duration);
}

/// Cache that never stores anything.
pub struct NoCache;

#[async_trait]
impl CollaborationCache for NoCache {
    async fn get(&self, _key: &str) -> Option<CollaborationResult> {
        None
    }

    async fn set(&self, _key: &str, _value: CollaborationResult, _ttl: Duration) {}
}
