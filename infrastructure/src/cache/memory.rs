//! In-memory LRU cache with per-entry expiry

use async_trait::async_trait;
use collab_application::CollaborationCache;
use collab_domain::CollaborationResult;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

struct Entry {
    value: CollaborationResult,
    expires_at: Instant,
}

/// Bounded result cache. The least recently used entry is evicted when
/// full; expired entries are dropped lazily on lookup.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    /// A cache holding at most `max_entries` results (at least one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl CollaborationCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<CollaborationResult> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            trace!(key, "Cache entry expired");
        }
        None
    }

    async fn set(&self, key: &str, value: CollaborationResult, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        if let Some((evicted, _)) = self.lock().push(key.to_string(), entry)
            && evicted != key
        {
            trace!(key = %evicted, "Cache entry evicted");
        }
    }
}
