//! In-process memory backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use outpost_core::{Backend, BackendResult, CacheKey, CacheValue, DeleteStatus};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredEntry {
    value: CacheValue<Bytes>,
    evict_at: DateTime<Utc>,
}

/// Concurrent in-process cache store.
///
/// Entries past their hard eviction bound are dropped lazily on read and in
/// bulk by [`MemoryBackend::sweep`], which the server runs on a timer.
/// Capacity is unbounded; the eviction bound keeps the working set to the
/// resource keys actually requested within the stale window.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<DashMap<CacheKey, StoredEntry>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, counting ones not yet swept.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Drops every entry past its eviction bound. Returns how many were
    /// removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.evict_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheValue<Bytes>>> {
        let now = Utc::now();
        self.entries.remove_if(key, |_, entry| entry.evict_at <= now);
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn write(
        &self,
        key: &CacheKey,
        value: CacheValue<Bytes>,
        eviction: Duration,
    ) -> BackendResult<()> {
        let entry = StoredEntry {
            evict_at: Utc::now() + eviction,
            value,
        };
        self.entries.insert(key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        match self.entries.remove(key) {
            Some(_) => Ok(DeleteStatus::Deleted(1)),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn ping(&self) -> BackendResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
