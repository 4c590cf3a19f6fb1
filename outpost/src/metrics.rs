//! Metrics declaration and initialization.

use std::time::Duration;

use outpost_core::FetchStatus;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Fetch outcome metrics

    /// Track number of fresh cache hits served.
    pub static ref FETCH_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "outpost_fetch_hit_total",
            "Total number of requests served from a fresh cache entry."
        );
        "outpost_fetch_hit_total"
    };
    /// Track number of cache misses fetched from upstream.
    pub static ref FETCH_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "outpost_fetch_miss_total",
            "Total number of requests fetched from upstream on a miss or refresh."
        );
        "outpost_fetch_miss_total"
    };
    /// Track number of stale entries served as upstream fallback.
    pub static ref FETCH_STALE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "outpost_fetch_stale_total",
            "Total number of requests served from a stale cache entry."
        );
        "outpost_fetch_stale_total"
    };
    /// Track number of requests passed through with the cache store down.
    pub static ref FETCH_BYPASS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "outpost_fetch_bypass_total",
            "Total number of requests passed straight to upstream because the cache store was unavailable."
        );
        "outpost_fetch_bypass_total"
    };

    // Latency metrics

    /// Histogram of full fetch duration.
    pub static ref FETCH_DURATION: &'static str = {
        metrics::describe_histogram!(
            "outpost_fetch_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of cache fetches in seconds."
        );
        "outpost_fetch_duration_seconds"
    };
    /// Histogram of upstream call duration.
    pub static ref UPSTREAM_DURATION: &'static str = {
        metrics::describe_histogram!(
            "outpost_upstream_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of upstream calls in seconds."
        );
        "outpost_upstream_duration_seconds"
    };

    // Registration heartbeat metrics

    /// Track number of successful registration attempts.
    pub static ref REGISTRATION_SUCCESS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "outpost_registration_success_total",
            "Total number of successful registry registrations."
        );
        "outpost_registration_success_total"
    };
    /// Track number of failed registration attempts.
    pub static ref REGISTRATION_FAILURE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "outpost_registration_failure_total",
            "Total number of failed registry registrations."
        );
        "outpost_registration_failure_total"
    };
}

/// Record the outcome and duration of one cache fetch.
///
/// When the `metrics` feature is disabled, this function is a no-op
/// and will be eliminated by the compiler.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch(status: FetchStatus, duration: Duration) {
    metrics::histogram!(*FETCH_DURATION, "status" => status.as_str())
        .record(duration.as_secs_f64());

    let counter = match status {
        FetchStatus::Hit => *FETCH_HIT_COUNTER,
        FetchStatus::Miss => *FETCH_MISS_COUNTER,
        FetchStatus::Stale => *FETCH_STALE_COUNTER,
        FetchStatus::Bypass => *FETCH_BYPASS_COUNTER,
    };
    metrics::counter!(counter).increment(1);
}

/// No-op version when metrics feature is disabled.
/// The compiler will eliminate this empty function call.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch(_status: FetchStatus, _duration: Duration) {}

/// Record the duration of one upstream call.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_upstream(duration: Duration) {
    metrics::histogram!(*UPSTREAM_DURATION).record(duration.as_secs_f64());
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_upstream(_duration: Duration) {}

/// Record the outcome of one registration attempt.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_registration(success: bool) {
    let counter = if success {
        *REGISTRATION_SUCCESS_COUNTER
    } else {
        *REGISTRATION_FAILURE_COUNTER
    };
    metrics::counter!(counter).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_registration(_success: bool) {}
