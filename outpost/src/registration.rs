use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outpost_core::{NodeIdentity, UpstreamError};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::metrics;

/// Client side of the Registry's node API.
///
/// The server binary implements this over HTTP; tests substitute mocks.
#[async_trait]
pub trait RegistryClient: Send + Sync + 'static {
    /// Sends the idempotent registration payload for this node.
    async fn register(&self, identity: &NodeIdentity) -> Result<(), UpstreamError>;

    /// Cheap reachability check against the Registry.
    async fn probe(&self) -> Result<(), UpstreamError>;
}

/// Heartbeat cadence and failure backoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Interval between registrations while the Registry answers (e.g., "30s").
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Delay after the first failed attempt (e.g., "1s").
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Upper bound the backoff grows to (e.g., "5m").
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Backoff growth factor per consecutive failure.
    pub multiplier: f64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5 * 60),
            multiplier: 2.0,
        }
    }
}

impl HeartbeatConfig {
    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// Zero failures means the regular heartbeat interval. Each failure
    /// grows the delay by `multiplier` starting from `initial_backoff`,
    /// capped at `max_backoff`.
    pub fn next_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        // A multiplier below 1 would shrink delays under repeated failures.
        let multiplier = self.multiplier.max(1.0);
        let exponent = failures.saturating_sub(1).min(32) as i32;
        let backoff = self.initial_backoff.as_secs_f64() * multiplier.powi(exponent);
        Duration::from_secs_f64(backoff.min(self.max_backoff.as_secs_f64()))
    }
}

/// Registration bookkeeping, owned by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationState {
    /// When the Registry last acknowledged this node.
    pub last_success_at: Option<DateTime<Utc>>,
    /// When a registration was last attempted.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Failed attempts since the last success.
    pub consecutive_failures: u32,
}

impl RegistrationState {
    /// Whether the Registry has ever acknowledged this node.
    pub fn is_registered(&self) -> bool {
        self.last_success_at.is_some()
    }
}

/// Cloneable read handle on the agent's state.
#[derive(Debug, Clone)]
pub struct RegistrationHandle {
    state: Arc<RwLock<RegistrationState>>,
}

impl RegistrationHandle {
    /// Snapshot of the current registration state.
    pub async fn snapshot(&self) -> RegistrationState {
        self.state.read().await.clone()
    }
}

/// Keeps this node registered with the Registry.
///
/// Registration is best-effort: the agent retries forever with bounded
/// backoff and a down Registry never takes the node down with it. The
/// Registry upserts the record keyed by node URL, so re-sending the same
/// payload every interval is safe.
pub struct RegistrationAgent<C> {
    client: Arc<C>,
    identity: NodeIdentity,
    config: HeartbeatConfig,
    state: Arc<RwLock<RegistrationState>>,
}

impl<C: RegistryClient> RegistrationAgent<C> {
    /// Creates an agent; nothing runs until [`run`](Self::run) is spawned.
    pub fn new(client: Arc<C>, identity: NodeIdentity, config: HeartbeatConfig) -> Self {
        Self {
            client,
            identity,
            config,
            state: Arc::new(RwLock::new(RegistrationState::default())),
        }
    }

    /// Read handle on the agent's bookkeeping.
    pub fn handle(&self) -> RegistrationHandle {
        RegistrationHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Performs one registration attempt and records the outcome.
    pub async fn attempt(&self) -> bool {
        let attempted_at = Utc::now();
        let result = self.client.register(&self.identity).await;
        let success = result.is_ok();

        let mut state = self.state.write().await;
        state.last_attempt_at = Some(attempted_at);
        match result {
            Ok(()) => {
                if state.is_registered() && state.consecutive_failures == 0 {
                    debug!(node = %self.identity.url, "registry heartbeat acknowledged");
                } else {
                    info!(node = %self.identity.url, "registered with registry");
                }
                state.last_success_at = Some(Utc::now());
                state.consecutive_failures = 0;
            }
            Err(error) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                warn!(
                    node = %self.identity.url,
                    %error,
                    failures = state.consecutive_failures,
                    "registration attempt failed"
                );
            }
        }
        drop(state);

        metrics::record_registration(success);
        success
    }

    /// Registers immediately, then heartbeats forever.
    ///
    /// Never returns; the caller spawns this and aborts the task on
    /// shutdown.
    pub async fn run(self) {
        info!(
            node = %self.identity.url,
            interval_secs = self.config.interval.as_secs(),
            "starting registration heartbeat"
        );
        loop {
            self.attempt().await;
            let failures = self.state.read().await.consecutive_failures;
            let delay = self.config.next_delay(failures);
            if failures > 0 {
                debug!(
                    failures,
                    delay_secs = delay.as_secs(),
                    "backing off before next registration attempt"
                );
            }
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use outpost_core::ContactInfo;

    use super::*;

    struct MockRegistry {
        registrations: AtomicUsize,
        healthy: AtomicBool,
    }

    impl MockRegistry {
        fn up() -> Arc<Self> {
            Arc::new(Self {
                registrations: AtomicUsize::new(0),
                healthy: AtomicBool::new(true),
            })
        }

        fn down() -> Arc<Self> {
            let registry = Self::up();
            registry.healthy.store(false, Ordering::SeqCst);
            registry
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        fn registrations(&self) -> usize {
            self.registrations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RegistryClient for MockRegistry {
        async fn register(&self, _identity: &NodeIdentity) -> Result<(), UpstreamError> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(UpstreamError::unavailable("registry down"))
            }
        }

        async fn probe(&self) -> Result<(), UpstreamError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(UpstreamError::unavailable("registry down"))
            }
        }
    }

    fn identity() -> NodeIdentity {
        NodeIdentity::new("Test Node", "http://localhost:8003", ContactInfo::default())
    }

    fn config(interval: u64, initial: u64, max: u64) -> HeartbeatConfig {
        HeartbeatConfig {
            interval: Duration::from_secs(interval),
            initial_backoff: Duration::from_secs(initial),
            max_backoff: Duration::from_secs(max),
            multiplier: 2.0,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = config(30, 1, 8);
        assert_eq!(config.next_delay(0), Duration::from_secs(30));
        assert_eq!(config.next_delay(1), Duration::from_secs(1));
        assert_eq!(config.next_delay(2), Duration::from_secs(2));
        assert_eq!(config.next_delay(3), Duration::from_secs(4));
        assert_eq!(config.next_delay(4), Duration::from_secs(8));
        assert_eq!(config.next_delay(5), Duration::from_secs(8));
        assert_eq!(config.next_delay(100), Duration::from_secs(8));
    }

    #[test]
    fn backoff_never_decreases() {
        let config = HeartbeatConfig::default();
        let mut last = Duration::ZERO;
        for failures in 1..64 {
            let delay = config.next_delay(failures);
            assert!(delay >= last, "delay shrank at {failures} failures");
            last = delay;
        }
    }

    #[test]
    fn sub_one_multiplier_is_clamped() {
        let config = HeartbeatConfig {
            multiplier: 0.1,
            ..config(30, 1, 8)
        };
        assert_eq!(config.next_delay(5), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn attempt_tracks_failures_then_success() {
        let registry = MockRegistry::down();
        let agent = RegistrationAgent::new(Arc::clone(&registry), identity(), config(30, 1, 8));
        let handle = agent.handle();

        assert!(!agent.attempt().await);
        assert!(!agent.attempt().await);
        let state = handle.snapshot().await;
        assert_eq!(state.consecutive_failures, 2);
        assert!(state.last_attempt_at.is_some());
        assert!(!state.is_registered());

        registry.set_healthy(true);
        assert!(agent.attempt().await);
        let state = handle.snapshot().await;
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.is_registered());
        assert_eq!(registry.registrations(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_repeats_at_interval() {
        let registry = MockRegistry::up();
        let agent = RegistrationAgent::new(Arc::clone(&registry), identity(), config(30, 1, 8));
        let handle = agent.handle();
        let task = tokio::spawn(agent.run());

        // Attempts land at t=0s, 30s, 60s, 90s.
        sleep(Duration::from_secs(95)).await;
        assert_eq!(registry.registrations(), 4);
        assert!(handle.snapshot().await.is_registered());

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_then_recover() {
        let registry = MockRegistry::down();
        let agent = RegistrationAgent::new(Arc::clone(&registry), identity(), config(30, 1, 8));
        let handle = agent.handle();
        let task = tokio::spawn(agent.run());

        // Failed attempts land at t=0s, 1s, 3s, 7s, 15s; the delay is capped
        // at 8s from there on.
        sleep(Duration::from_millis(15_500)).await;
        assert_eq!(registry.registrations(), 5);
        let state = handle.snapshot().await;
        assert_eq!(state.consecutive_failures, 5);
        assert!(!state.is_registered());

        // Next attempt at t=23s succeeds and the cadence returns to the
        // regular interval.
        registry.set_healthy(true);
        sleep(Duration::from_secs(8)).await;
        assert_eq!(registry.registrations(), 6);
        let state = handle.snapshot().await;
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.is_registered());

        task.abort();
    }
}
