use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use outpost_core::Backend;
use serde::Serialize;
use tokio::time::timeout;
use tracing::debug;

use crate::registration::RegistryClient;

/// Outcome of probing one dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    /// Whether the dependency answered within the probe timeout.
    pub ok: bool,
    /// Round-trip latency in milliseconds, rounded to two decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Failure description when the dependency did not answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn reachable(elapsed: Duration) -> Self {
        let millis = elapsed.as_secs_f64() * 1000.0;
        Self {
            ok: true,
            latency_ms: Some((millis * 100.0).round() / 100.0),
            error: None,
        }
    }

    fn unreachable(error: String) -> Self {
        Self {
            ok: false,
            latency_ms: None,
            error: Some(error),
        }
    }
}

/// Latency of both dependencies, measured in parallel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    /// Cache store round trip.
    pub cache: ProbeResult,
    /// Registry round trip.
    pub upstream: ProbeResult,
}

/// Measures round-trip latency to the cache store and the Registry.
///
/// The two probes run concurrently, each under its own timeout, and one
/// failing never hides the other's result.
pub struct LatencyProbe<C> {
    backend: Arc<dyn Backend>,
    client: Arc<C>,
    timeout: Duration,
}

impl<C: RegistryClient> LatencyProbe<C> {
    /// Creates a probe with the given per-dependency timeout.
    pub fn new(backend: Arc<dyn Backend>, client: Arc<C>, timeout: Duration) -> Self {
        Self {
            backend,
            client,
            timeout,
        }
    }

    /// Probes both dependencies and reports what answered.
    pub async fn measure(&self) -> LatencyReport {
        let (cache, upstream) = tokio::join!(
            Self::timed(self.timeout, "cache", async {
                self.backend.ping().await.map_err(|error| error.to_string())
            }),
            Self::timed(self.timeout, "upstream", async {
                self.client.probe().await.map_err(|error| error.to_string())
            }),
        );
        LatencyReport { cache, upstream }
    }

    async fn timed<F>(limit: Duration, dependency: &str, op: F) -> ProbeResult
    where
        F: Future<Output = Result<(), String>>,
    {
        let started = Instant::now();
        match timeout(limit, op).await {
            Ok(Ok(())) => ProbeResult::reachable(started.elapsed()),
            Ok(Err(error)) => {
                debug!(dependency, %error, "probe failed");
                ProbeResult::unreachable(error)
            }
            Err(_elapsed) => {
                debug!(dependency, timeout_ms = limit.as_millis() as u64, "probe timed out");
                ProbeResult::unreachable(format!("no answer within {}ms", limit.as_millis()))
            }
        }
    }
}
