#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Cache-aside fetching with stale fallback.
///
/// [`Fetcher`] drives the whole request path for one proxied resource:
/// cache read, fresh-hit short circuit, collapsed upstream refresh,
/// write-back, bounded stale fallback and store-down pass-through.
pub mod fetch;

/// Dogpile prevention for upstream calls.
///
/// [`FlightGroup`] collapses concurrent calls for the same cache key into
/// one in-flight upstream call and broadcasts its outcome, success or
/// error, to every caller that joined while it ran.
pub mod flight;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Fetch outcomes (hit, miss, stale, bypass)
/// - Fetch and upstream call latency
/// - Registration heartbeat attempts
pub mod metrics;

/// Freshness policies and fetch timeouts.
///
/// [`ResourcePolicy`] carries the per-resource TTL and maximum stale age;
/// [`FetcherConfig`] the store and upstream timeouts applied on every
/// fetch.
pub mod policy;

/// Dependency latency probing.
///
/// [`LatencyProbe`](probe::LatencyProbe) measures round trips to the cache
/// store and the Registry in parallel, each under its own timeout, backing
/// the node's speedtest endpoint.
pub mod probe;

/// Registry self-registration.
///
/// [`RegistrationAgent`](registration::RegistrationAgent) announces this
/// node to the Registry at startup and keeps the listing alive with a
/// heartbeat, backing off exponentially while the Registry is unreachable.
pub mod registration;

pub use fetch::{Fetched, Fetcher};
pub use flight::{FlightGroup, FlightResult};
pub use policy::{FetcherConfig, ResourcePolicy};
pub use probe::{LatencyProbe, LatencyReport, ProbeResult};
pub use registration::{
    HeartbeatConfig, RegistrationAgent, RegistrationHandle, RegistrationState, RegistryClient,
};

pub use outpost_core::{
    Backend, BackendError, BackendResult, COMMUNITY_TAG, CacheKey, CacheState, CacheValue,
    ContactInfo, DeleteStatus, FetchStatus, KeyPart, NodeIdentity, UpstreamError,
};
