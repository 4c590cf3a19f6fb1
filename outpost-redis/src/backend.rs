//! Redis backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::DateTime;
use outpost_core::{Backend, BackendResult, CacheKey, CacheValue, DeleteStatus};
use redis::{Client, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::{trace, warn};

use crate::error::Error;

/// Namespace prefix for every key this node stores.
const KEY_PREFIX: &str = "outpost";

/// Redis cache backend based on the redis-rs crate.
///
/// Each cache entry is a Redis hash with three fields: `d` (payload bytes),
/// `t` (stored-at, epoch millis) and `s` (stale-at, epoch millis). The hard
/// eviction bound maps onto a native `EXPIRE`, so Redis prunes entries that
/// fell out of the stale-fallback window on its own.
///
/// Uses a [`ConnectionManager`] for asynchronous network interaction. The
/// connection is established lazily on first use — the node starts fine
/// while Redis is down and recovers once it comes back.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct RedisBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisBackend {
    /// Creates a backend pointed at a local Redis with default settings.
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    /// Creates a new [`RedisBackendBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> RedisBackendBuilder {
        RedisBackendBuilder::default()
    }

    /// Create lazy connection to redis via [`ConnectionManager`].
    pub async fn connection(&self) -> Result<&ConnectionManager, Error> {
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!("initialize new redis connection manager");
                self.client.get_connection_manager()
            })
            .await?;
        Ok(manager)
    }
}

fn storage_key(key: &CacheKey) -> String {
    format!("{KEY_PREFIX}:{key}")
}

/// Builder for [`RedisBackend`].
pub struct RedisBackendBuilder {
    connection_info: String,
}

impl Default for RedisBackendBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1/".to_owned(),
        }
    }
}

impl RedisBackendBuilder {
    /// Set connection info (host, port, database, etc.) for RedisBackend.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Create new instance of Redis backend with passed settings.
    pub fn build(self) -> Result<RedisBackend, Error> {
        Ok(RedisBackend {
            client: Client::open(self.connection_info).map_err(Error::from)?,
            connection: OnceCell::new(),
        })
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<CacheValue<Bytes>>> {
        let mut con = self.connection().await.map_err(Error::from)?.clone();
        let storage_key = storage_key(key);

        let (data, stored_ms, stale_ms): (Option<Vec<u8>>, Option<i64>, Option<i64>) =
            redis::cmd("HMGET")
                .arg(&storage_key)
                .arg("d")
                .arg("t")
                .arg("s")
                .query_async(&mut con)
                .await
                .map_err(Error::from)?;

        // If data is None, key doesn't exist
        let data = match data {
            Some(data) => Bytes::from(data),
            None => return Ok(None),
        };

        let timestamps = stored_ms
            .and_then(DateTime::from_timestamp_millis)
            .zip(stale_ms.and_then(DateTime::from_timestamp_millis));
        match timestamps {
            Some((stored_at, stale_at)) => {
                Ok(Some(CacheValue::from_parts(data, stored_at, stale_at)))
            }
            None => {
                // Entry without usable timestamps is unservable; drop it and
                // report a miss so the next fetch rebuilds it.
                warn!(key = %storage_key, "dropping cache entry with corrupt timestamps");
                let _: Result<i32, _> = redis::cmd("DEL")
                    .arg(&storage_key)
                    .query_async(&mut con)
                    .await;
                Ok(None)
            }
        }
    }

    async fn write(
        &self,
        key: &CacheKey,
        value: CacheValue<Bytes>,
        eviction: Duration,
    ) -> BackendResult<()> {
        let mut con = self.connection().await.map_err(Error::from)?.clone();
        let storage_key = storage_key(key);

        // Pipeline: HSET (data + timestamps) + EXPIRE on the hard bound
        redis::pipe()
            .cmd("HSET")
            .arg(&storage_key)
            .arg("d")
            .arg(value.data().as_ref())
            .arg("t")
            .arg(value.stored_at().timestamp_millis())
            .arg("s")
            .arg(value.stale_at().timestamp_millis())
            .ignore()
            .cmd("EXPIRE")
            .arg(&storage_key)
            .arg(eviction.as_secs().max(1))
            .ignore()
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> BackendResult<DeleteStatus> {
        let mut con = self.connection().await.map_err(Error::from)?.clone();

        let deleted: i32 = redis::cmd("DEL")
            .arg(storage_key(key))
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted as u32))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    async fn ping(&self) -> BackendResult<()> {
        let mut con = self.connection().await.map_err(Error::from)?.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
