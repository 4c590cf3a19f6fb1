//! Storage backend contract.
//!
//! A [`Backend`] is the TTL-bounded key→value store behind the fetch
//! pipeline. Implementations serialize conflicting writes to the same key
//! (last writer wins) and keep different keys independent. Entries outlive
//! their freshness TTL — the `eviction` bound passed to [`Backend::write`]
//! is the hard retention limit after which an implementation may discard
//! the entry.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendError;
use crate::key::CacheKey;
use crate::value::CacheValue;

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Outcome of a [`Backend::remove`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// The number of deleted entries.
    Deleted(u32),
    /// No entry existed for the key.
    Missing,
}

/// Asynchronous cache store.
///
/// Object-safe so the server can pick an implementation at runtime and the
/// rest of the node can hold an `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reads the entry for `key`, with its stored timestamps intact.
    ///
    /// Returns `Ok(None)` for absent (or evicted) keys. Freshness is the
    /// caller's call — a returned value may well be stale.
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheValue<Bytes>>>;

    /// Stores `value` under `key`, overwriting unconditionally.
    ///
    /// `eviction` is the hard retention bound; it is at least the value's
    /// freshness TTL so stale entries stay available for fallback.
    async fn write(
        &self,
        key: &CacheKey,
        value: CacheValue<Bytes>,
        eviction: Duration,
    ) -> BackendResult<()>;

    /// Removes the entry for `key`.
    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus>;

    /// Issues a minimal round-trip against the backing store.
    ///
    /// Used by the latency probe; the caller measures the elapsed time.
    async fn ping(&self) -> BackendResult<()>;

    /// Returns the name of this backend for logs and status reporting.
    fn name(&self) -> &str {
        "backend"
    }
}
