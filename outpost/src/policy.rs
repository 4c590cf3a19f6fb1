use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Freshness policy for one proxied resource.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ResourcePolicy {
    /// Time-to-live before a cached entry becomes stale (e.g., "60s", "5m").
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Oldest age at which a stale entry may still be served when the
    /// upstream is down (e.g., "30m").
    #[serde(with = "humantime_serde")]
    pub max_stale: Duration,
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_stale: Duration::from_secs(30 * 60),
        }
    }
}

impl ResourcePolicy {
    /// Creates a policy with the given freshness window and stale bound.
    pub fn new(ttl: Duration, max_stale: Duration) -> Self {
        Self { ttl, max_stale }
    }

    /// Hard retention bound handed to storage backends.
    ///
    /// An entry is kept long enough to cover the stale-fallback window even
    /// when that window is longer than the freshness TTL.
    pub fn eviction(&self) -> Duration {
        self.ttl.max(self.max_stale)
    }
}

/// Timeouts applied around the cache store and the upstream.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct FetcherConfig {
    /// Budget for one cache store operation (e.g., "1s"). A read slower than
    /// this degrades the request to a direct upstream pass-through.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    /// Budget for one upstream call (e.g., "10s").
    #[serde(with = "humantime_serde")]
    pub upstream_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(1),
            upstream_timeout: Duration::from_secs(10),
        }
    }
}
