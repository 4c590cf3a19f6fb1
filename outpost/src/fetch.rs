use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use outpost_core::{Backend, CacheKey, CacheValue, FetchStatus, UpstreamError};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::flight::FlightGroup;
use crate::metrics;
use crate::policy::{FetcherConfig, ResourcePolicy};

/// Payload returned by [`Fetcher::fetch`] together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Response body, as received from upstream or read back from the cache.
    pub payload: Bytes,
    /// How the payload was obtained.
    pub status: FetchStatus,
}

/// Cache-aside fetcher for proxied upstream resources.
///
/// Every request runs the same sequence: read the cache, serve a fresh entry
/// directly, otherwise call upstream through a [`FlightGroup`] so concurrent
/// requests for the same key share one call, write the fresh result back,
/// and fall back to a bounded-age stale entry when the upstream fails.
///
/// The cache store is never load-bearing. A store that errors or stalls
/// degrades the request to a direct upstream pass-through instead of failing
/// it.
pub struct Fetcher {
    backend: Arc<dyn Backend>,
    flight: FlightGroup<CacheValue<Bytes>>,
    config: FetcherConfig,
}

impl Fetcher {
    /// Creates a fetcher over the given storage backend.
    pub fn new(backend: Arc<dyn Backend>, config: FetcherConfig) -> Self {
        Self {
            backend,
            flight: FlightGroup::new(),
            config,
        }
    }

    /// Resolves `key` under `policy`, calling `forward` for the upstream
    /// payload when the cache cannot answer.
    ///
    /// `forward` is invoked at most once per in-flight refresh, no matter
    /// how many concurrent callers ask for the same key.
    pub async fn fetch<F, Fut>(
        &self,
        key: &CacheKey,
        policy: &ResourcePolicy,
        forward: F,
    ) -> Result<Fetched, UpstreamError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Bytes, UpstreamError>> + Send + 'static,
    {
        let started = Instant::now();
        let result = self.fetch_inner(key, policy, forward).await;
        if let Ok(fetched) = &result {
            metrics::record_fetch(fetched.status, started.elapsed());
        }
        result
    }

    async fn fetch_inner<F, Fut>(
        &self,
        key: &CacheKey,
        policy: &ResourcePolicy,
        forward: F,
    ) -> Result<Fetched, UpstreamError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Bytes, UpstreamError>> + Send + 'static,
    {
        let cached = match timeout(self.config.store_timeout, self.backend.read(key)).await {
            Ok(Ok(cached)) => cached,
            Ok(Err(error)) => {
                warn!(
                    key = %key,
                    backend = self.backend.name(),
                    %error,
                    "cache read failed, passing request through"
                );
                return self.passthrough(forward).await;
            }
            Err(_elapsed) => {
                warn!(
                    key = %key,
                    backend = self.backend.name(),
                    "cache read timed out, passing request through"
                );
                return self.passthrough(forward).await;
            }
        };

        let stale = match cached {
            Some(value) if value.is_fresh(Utc::now()) => {
                debug!(key = %key, "fresh cache hit");
                return Ok(Fetched {
                    payload: value.into_data(),
                    status: FetchStatus::Hit,
                });
            }
            other => other,
        };

        match self.refresh(key, policy, forward).await {
            Ok(value) => Ok(Fetched {
                payload: value.into_data(),
                status: FetchStatus::Miss,
            }),
            Err(error) if error.stale_eligible() => match stale {
                Some(value) => {
                    let age = value.age(Utc::now());
                    if age <= policy.max_stale {
                        warn!(
                            key = %key,
                            %error,
                            age_secs = age.as_secs(),
                            "upstream failed, serving stale entry"
                        );
                        Ok(Fetched {
                            payload: value.into_data(),
                            status: FetchStatus::Stale,
                        })
                    } else {
                        warn!(
                            key = %key,
                            %error,
                            age_secs = age.as_secs(),
                            max_stale_secs = policy.max_stale.as_secs(),
                            "stale entry too old to serve as fallback"
                        );
                        Err(error)
                    }
                }
                None => Err(error),
            },
            Err(error) => Err(error),
        }
    }

    /// Calls upstream through the flight group and writes the result back.
    async fn refresh<F, Fut>(
        &self,
        key: &CacheKey,
        policy: &ResourcePolicy,
        forward: F,
    ) -> Result<CacheValue<Bytes>, UpstreamError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Bytes, UpstreamError>> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let flight_key = key.clone();
        let ttl = policy.ttl;
        let eviction = policy.eviction();
        let store_timeout = self.config.store_timeout;
        let upstream_timeout = self.config.upstream_timeout;

        self.flight
            .execute(key, move || async move {
                let started = Instant::now();
                let payload = match timeout(upstream_timeout, forward()).await {
                    Ok(Ok(payload)) => payload,
                    Ok(Err(error)) => return Err(error),
                    Err(_elapsed) => return Err(UpstreamError::Timeout),
                };
                metrics::record_upstream(started.elapsed());

                let value = CacheValue::fresh(payload, ttl);
                // One write-back per flight, not per waiter. A failing or
                // slow store must not fail a request the upstream already
                // answered.
                let write = backend.write(&flight_key, value.clone(), eviction);
                match timeout(store_timeout, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => warn!(
                        key = %flight_key,
                        backend = backend.name(),
                        %error,
                        "cache write-back failed"
                    ),
                    Err(_elapsed) => warn!(
                        key = %flight_key,
                        backend = backend.name(),
                        "cache write-back timed out"
                    ),
                }
                Ok(value)
            })
            .await
    }

    async fn passthrough<F, Fut>(&self, forward: F) -> Result<Fetched, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, UpstreamError>>,
    {
        match timeout(self.config.upstream_timeout, forward()).await {
            Ok(Ok(payload)) => Ok(Fetched {
                payload,
                status: FetchStatus::Bypass,
            }),
            Ok(Err(error)) => Err(error),
            Err(_elapsed) => Err(UpstreamError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use outpost_core::{BackendError, BackendResult, DeleteStatus};
    use outpost_memory::MemoryBackend;
    use tokio::time::sleep;

    use super::*;

    fn policy(ttl_secs: u64, max_stale_secs: u64) -> ResourcePolicy {
        ResourcePolicy::new(
            Duration::from_secs(ttl_secs),
            Duration::from_secs(max_stale_secs),
        )
    }

    fn fetcher_over(backend: impl Backend + 'static) -> Fetcher {
        Fetcher::new(Arc::new(backend), FetcherConfig::default())
    }

    async fn seed(backend: &MemoryBackend, key: &CacheKey, payload: &'static [u8], age: Duration) {
        let stored_at = Utc::now() - age;
        let value = CacheValue::from_parts(
            Bytes::from_static(payload),
            stored_at,
            stored_at + Duration::from_secs(60),
        );
        backend
            .write(key, value, Duration::from_secs(3600))
            .await
            .unwrap();
    }

    /// Store whose every operation fails with a connection error.
    struct DownBackend;

    #[async_trait]
    impl Backend for DownBackend {
        async fn read(&self, _key: &CacheKey) -> BackendResult<Option<CacheValue<Bytes>>> {
            Err(BackendError::Connection(Box::new(std::io::Error::other(
                "connection refused",
            ))))
        }

        async fn write(
            &self,
            _key: &CacheKey,
            _value: CacheValue<Bytes>,
            _eviction: Duration,
        ) -> BackendResult<()> {
            Err(BackendError::Connection(Box::new(std::io::Error::other(
                "connection refused",
            ))))
        }

        async fn remove(&self, _key: &CacheKey) -> BackendResult<DeleteStatus> {
            Err(BackendError::Connection(Box::new(std::io::Error::other(
                "connection refused",
            ))))
        }

        async fn ping(&self) -> BackendResult<()> {
            Err(BackendError::Connection(Box::new(std::io::Error::other(
                "connection refused",
            ))))
        }
    }

    /// Store whose reads never come back.
    struct StuckBackend;

    #[async_trait]
    impl Backend for StuckBackend {
        async fn read(&self, _key: &CacheKey) -> BackendResult<Option<CacheValue<Bytes>>> {
            sleep(Duration::from_secs(600)).await;
            Ok(None)
        }

        async fn write(
            &self,
            _key: &CacheKey,
            _value: CacheValue<Bytes>,
            _eviction: Duration,
        ) -> BackendResult<()> {
            sleep(Duration::from_secs(600)).await;
            Ok(())
        }

        async fn remove(&self, _key: &CacheKey) -> BackendResult<DeleteStatus> {
            Ok(DeleteStatus::Missing)
        }

        async fn ping(&self) -> BackendResult<()> {
            Ok(())
        }
    }

    /// Store that reads fine but rejects writes.
    struct ReadOnlyBackend(MemoryBackend);

    #[async_trait]
    impl Backend for ReadOnlyBackend {
        async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheValue<Bytes>>> {
            self.0.read(key).await
        }

        async fn write(
            &self,
            _key: &CacheKey,
            _value: CacheValue<Bytes>,
            _eviction: Duration,
        ) -> BackendResult<()> {
            Err(BackendError::Internal(Box::new(std::io::Error::other(
                "store is read-only",
            ))))
        }

        async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
            self.0.remove(key).await
        }

        async fn ping(&self) -> BackendResult<()> {
            self.0.ping().await
        }
    }

    #[tokio::test]
    async fn fresh_hit_skips_upstream() {
        let backend = MemoryBackend::new();
        let key = CacheKey::new("news");
        seed(&backend, &key, b"cached news", Duration::ZERO).await;
        let fetcher = fetcher_over(backend);
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_in = Arc::clone(&calls);
        let fetched = fetcher
            .fetch(&key, &policy(60, 1800), move || async move {
                calls_in.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(b"fresh news"))
            })
            .await
            .unwrap();

        assert_eq!(fetched.status, FetchStatus::Hit);
        assert_eq!(fetched.payload, Bytes::from_static(b"cached news"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_fetches_once_then_hits() {
        let fetcher = fetcher_over(MemoryBackend::new());
        let key = CacheKey::new("requests");
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in [FetchStatus::Miss, FetchStatus::Hit] {
            let calls_in = Arc::clone(&calls);
            let fetched = fetcher
                .fetch(&key, &policy(60, 1800), move || async move {
                    calls_in.fetch_add(1, Ordering::SeqCst);
                    Ok(Bytes::from_static(b"relief requests"))
                })
                .await
                .unwrap();
            assert_eq!(fetched.status, expected);
            assert_eq!(fetched.payload, Bytes::from_static(b"relief requests"));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_upstream_call() {
        let fetcher = Arc::new(fetcher_over(MemoryBackend::new()));
        let key = CacheKey::new("news");
        let calls = Arc::new(AtomicUsize::new(0));
        let pol = policy(60, 1800);

        let fetches = (0..4).map(|_| {
            let calls = Arc::clone(&calls);
            fetcher.fetch(&key, &pol, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(50)).await;
                Ok(Bytes::from_static(b"shared"))
            })
        });
        let outcomes = join_all(fetches).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for outcome in outcomes {
            let fetched = outcome.unwrap();
            assert_eq!(fetched.status, FetchStatus::Miss);
            assert_eq!(fetched.payload, Bytes::from_static(b"shared"));
        }
    }

    #[tokio::test]
    async fn stale_entry_refreshes_from_upstream() {
        let backend = MemoryBackend::new();
        let key = CacheKey::new("phones");
        seed(&backend, &key, b"old phones", Duration::from_secs(600)).await;
        let fetcher = fetcher_over(backend);

        let fetched = fetcher
            .fetch(&key, &policy(60, 1800), || async {
                Ok(Bytes::from_static(b"new phones"))
            })
            .await
            .unwrap();
        assert_eq!(fetched.status, FetchStatus::Miss);
        assert_eq!(fetched.payload, Bytes::from_static(b"new phones"));

        // The refresh was written back; the next request is a fresh hit.
        let fetched = fetcher
            .fetch(&key, &policy(60, 1800), || async {
                Err(UpstreamError::unavailable("down"))
            })
            .await
            .unwrap();
        assert_eq!(fetched.status, FetchStatus::Hit);
        assert_eq!(fetched.payload, Bytes::from_static(b"new phones"));
    }

    #[tokio::test]
    async fn upstream_failure_serves_bounded_stale() {
        let backend = MemoryBackend::new();
        let key = CacheKey::new("phones");
        seed(&backend, &key, b"old phones", Duration::from_secs(600)).await;
        let fetcher = fetcher_over(backend);

        let fetched = fetcher
            .fetch(&key, &policy(60, 1800), || async {
                Err(UpstreamError::unavailable("connection refused"))
            })
            .await
            .unwrap();

        assert_eq!(fetched.status, FetchStatus::Stale);
        assert_eq!(fetched.payload, Bytes::from_static(b"old phones"));
    }

    #[tokio::test]
    async fn stale_beyond_max_age_is_refused() {
        let backend = MemoryBackend::new();
        let key = CacheKey::new("phones");
        seed(&backend, &key, b"ancient phones", Duration::from_secs(40 * 60)).await;
        let fetcher = fetcher_over(backend);

        let outcome = fetcher
            .fetch(&key, &policy(60, 1800), || async {
                Err(UpstreamError::unavailable("connection refused"))
            })
            .await;

        assert!(matches!(outcome, Err(UpstreamError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn miss_without_stale_reports_upstream_error() {
        let fetcher = fetcher_over(MemoryBackend::new());

        let outcome = fetcher
            .fetch(&CacheKey::new("news"), &policy(60, 1800), || async {
                Err(UpstreamError::unavailable("connection refused"))
            })
            .await;

        assert!(matches!(outcome, Err(UpstreamError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let backend = MemoryBackend::new();
        let fetcher = Fetcher::new(
            Arc::new(backend),
            FetcherConfig {
                store_timeout: Duration::from_secs(1),
                upstream_timeout: Duration::from_millis(50),
            },
        );

        let outcome = fetcher
            .fetch(&CacheKey::new("news"), &policy(60, 1800), || async {
                sleep(Duration::from_millis(200)).await;
                Ok(Bytes::from_static(b"too late"))
            })
            .await;

        assert_eq!(outcome, Err(UpstreamError::Timeout));
    }

    #[tokio::test]
    async fn client_errors_propagate_without_stale_fallback() {
        let backend = MemoryBackend::new();
        let key = CacheKey::new("requests");
        seed(&backend, &key, b"old requests", Duration::from_secs(600)).await;
        let fetcher = fetcher_over(backend);

        let outcome = fetcher
            .fetch(&key, &policy(60, 1800), || async {
                Err(UpstreamError::Status { status: 404 })
            })
            .await;

        assert_eq!(outcome, Err(UpstreamError::Status { status: 404 }));
    }

    #[tokio::test]
    async fn unavailable_store_degrades_to_passthrough() {
        let fetcher = fetcher_over(DownBackend);
        let key = CacheKey::new("news");
        let calls = Arc::new(AtomicUsize::new(0));

        for round in 1..=2 {
            let calls_in = Arc::clone(&calls);
            let fetched = fetcher
                .fetch(&key, &policy(60, 1800), move || async move {
                    calls_in.fetch_add(1, Ordering::SeqCst);
                    Ok(Bytes::from_static(b"direct"))
                })
                .await
                .unwrap();
            assert_eq!(fetched.status, FetchStatus::Bypass);
            assert_eq!(fetched.payload, Bytes::from_static(b"direct"));
            // Without a working store every request goes upstream.
            assert_eq!(calls.load(Ordering::SeqCst), round);
        }
    }

    #[tokio::test]
    async fn stuck_store_degrades_to_passthrough() {
        let fetcher = Fetcher::new(
            Arc::new(StuckBackend),
            FetcherConfig {
                store_timeout: Duration::from_millis(50),
                upstream_timeout: Duration::from_secs(10),
            },
        );

        let fetched = fetcher
            .fetch(&CacheKey::new("news"), &policy(60, 1800), || async {
                Ok(Bytes::from_static(b"direct"))
            })
            .await
            .unwrap();

        assert_eq!(fetched.status, FetchStatus::Bypass);
    }

    #[tokio::test]
    async fn write_back_failure_still_serves_payload() {
        let fetcher = fetcher_over(ReadOnlyBackend(MemoryBackend::new()));

        let fetched = fetcher
            .fetch(&CacheKey::new("news"), &policy(60, 1800), || async {
                Ok(Bytes::from_static(b"fetched anyway"))
            })
            .await
            .unwrap();

        assert_eq!(fetched.status, FetchStatus::Miss);
        assert_eq!(fetched.payload, Bytes::from_static(b"fetched anyway"));
    }

    #[tokio::test]
    async fn keys_with_different_parameters_cache_separately() {
        use outpost_core::KeyPart;

        let fetcher = fetcher_over(MemoryBackend::new());
        let page1 = CacheKey::from_parts("news", vec![KeyPart::new("page", Some("1"))]);
        let page2 = CacheKey::from_parts("news", vec![KeyPart::new("page", Some("2"))]);

        let fetched = fetcher
            .fetch(&page1, &policy(60, 1800), || async {
                Ok(Bytes::from_static(b"page one"))
            })
            .await
            .unwrap();
        assert_eq!(fetched.status, FetchStatus::Miss);

        let fetched = fetcher
            .fetch(&page2, &policy(60, 1800), || async {
                Ok(Bytes::from_static(b"page two"))
            })
            .await
            .unwrap();
        assert_eq!(fetched.status, FetchStatus::Miss);
        assert_eq!(fetched.payload, Bytes::from_static(b"page two"));

        let fetched = fetcher
            .fetch(&page1, &policy(60, 1800), || async {
                Ok(Bytes::from_static(b"never called"))
            })
            .await
            .unwrap();
        assert_eq!(fetched.status, FetchStatus::Hit);
        assert_eq!(fetched.payload, Bytes::from_static(b"page one"));
    }
}
