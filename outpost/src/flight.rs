use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use outpost_core::{CacheKey, UpstreamError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Outcome shared between every caller collapsed into one upstream call.
pub type FlightResult<T> = Result<T, UpstreamError>;

/// Collapses concurrent calls for the same [`CacheKey`] into a single
/// in-flight upstream call.
///
/// The first caller for a key becomes the leader: its work future is spawned
/// as a detached task and its outcome, success or error, is broadcast to
/// every caller that arrived while the call was still in flight. Callers for
/// other keys are unaffected. Once the outcome is published the key is free
/// again and the next caller starts a fresh call.
///
/// The work task is detached from the caller, so a client disconnecting
/// mid-request does not abort a call other clients are waiting on.
pub struct FlightGroup<T> {
    in_flight: Arc<DashMap<CacheKey, broadcast::Sender<FlightResult<T>>>>,
}

impl<T> Clone for FlightGroup<T> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<T> Default for FlightGroup<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FlightGroup<T>
where
    T: Clone + Send + 'static,
{
    /// Creates an empty group.
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Runs `work` for `key`, unless a call for the same key is already in
    /// flight, in which case the caller waits for that call's outcome
    /// instead.
    ///
    /// Exactly one invocation of `work` happens per flight. Every waiter
    /// receives a clone of the same outcome, including errors.
    pub async fn execute<F, Fut>(&self, key: &CacheKey, work: F) -> FlightResult<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FlightResult<T>> + Send + 'static,
    {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                // Subscribing while the entry is still present guarantees the
                // result is not missed: the leader task removes the entry
                // before publishing, and removal contends on the same shard
                // lock this entry holds.
                let rx = entry.get().subscribe();
                drop(entry);
                debug!(key = %key, "joining in-flight upstream call");
                self.join(key, rx, work).await
            }
            Entry::Vacant(entry) => {
                let (tx, mut rx) = broadcast::channel(1);
                // The guard returned by insert is dropped right away; no
                // shard lock is held across an await point.
                let _ = entry.insert(tx.clone());
                self.spawn_leader(key.clone(), tx, work());
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(_closed) => Err(UpstreamError::unavailable("in-flight call was aborted")),
                }
            }
        }
    }

    /// Number of keys with a call currently in flight.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns `true` when no call is in flight.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    fn spawn_leader<Fut>(&self, key: CacheKey, tx: broadcast::Sender<FlightResult<T>>, work: Fut)
    where
        Fut: Future<Output = FlightResult<T>> + Send + 'static,
    {
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_panic) => {
                    warn!(key = %key, "upstream call panicked");
                    Err(UpstreamError::unavailable("upstream call panicked"))
                }
            };
            // Remove before publishing so a caller arriving after the
            // outcome is out starts a fresh call instead of waiting on a
            // finished one.
            in_flight.remove(&key);
            let waiters = tx.send(outcome).unwrap_or(0);
            debug!(key = %key, waiters, "in-flight call finished");
        });
    }

    async fn join<F, Fut>(
        &self,
        key: &CacheKey,
        mut rx: broadcast::Receiver<FlightResult<T>>,
        work: F,
    ) -> FlightResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult<T>>,
    {
        match rx.recv().await {
            Ok(outcome) => outcome,
            // The leader task died without publishing, e.g. the runtime is
            // shutting down. The joined caller still holds its own work and
            // retries directly.
            Err(error) => {
                warn!(key = %key, %error, "in-flight call vanished, retrying directly");
                work().await
            }
        }
    }
}
