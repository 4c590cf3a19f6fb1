//! Cached value types with freshness metadata.
//!
//! A [`CacheValue`] wraps a stored payload with two timestamps:
//!
//! - `stored_at` — when the payload was fetched from the upstream
//! - `stale_at` — `stored_at + ttl`; the moment the entry stops being fresh
//!
//! Freshness is computed from these timestamps rather than from the backing
//! store's native expiry, so an entry past its TTL stays retrievable as
//! *stale* until the backend's separate hard eviction bound removes it. That
//! window is what makes serve-stale-on-error possible.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Freshness state of a cached value at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Within its TTL; serve directly.
    Fresh,
    /// Past its TTL; refresh before serving, fall back to it on failure.
    Stale,
}

/// A cached payload together with its freshness metadata.
///
/// Values are immutable once stored; a refresh replaces the whole entry.
///
/// # Example
///
/// ```
/// use outpost_core::value::{CacheState, CacheValue};
/// use chrono::Utc;
/// use std::time::Duration;
///
/// let value = CacheValue::fresh("payload", Duration::from_secs(60));
/// assert_eq!(value.state(Utc::now()), CacheState::Fresh);
/// assert_eq!(value.state(Utc::now() + chrono::Duration::seconds(61)), CacheState::Stale);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue<T> {
    data: T,
    stored_at: DateTime<Utc>,
    stale_at: DateTime<Utc>,
}

impl<T> CacheValue<T> {
    /// Creates a value stored now, fresh for `ttl`.
    pub fn fresh(data: T, ttl: Duration) -> Self {
        let stored_at = Utc::now();
        CacheValue {
            data,
            stored_at,
            stale_at: stored_at + ttl,
        }
    }

    /// Reassembles a value from timestamps read back from a backend.
    pub fn from_parts(data: T, stored_at: DateTime<Utc>, stale_at: DateTime<Utc>) -> Self {
        CacheValue {
            data,
            stored_at,
            stale_at,
        }
    }

    /// Returns a reference to the cached payload.
    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Returns when the payload was stored.
    #[inline]
    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    /// Returns when the payload stops being fresh.
    #[inline]
    pub fn stale_at(&self) -> DateTime<Utc> {
        self.stale_at
    }

    /// Consumes the value and returns the inner payload.
    pub fn into_data(self) -> T {
        self.data
    }

    /// Freshness state at `now`.
    pub fn state(&self, now: DateTime<Utc>) -> CacheState {
        if now < self.stale_at {
            CacheState::Fresh
        } else {
            CacheState::Stale
        }
    }

    /// Whether the value is still fresh at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == CacheState::Fresh
    }

    /// Time elapsed since the payload was stored, clamped to zero.
    ///
    /// The stale-fallback bound compares this against the configured
    /// maximum stale age.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
