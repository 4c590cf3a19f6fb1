//! Error types for Redis backend operations.

use outpost_core::BackendError;
use redis::RedisError;

/// Error type for Redis backend operations.
///
/// Wraps errors from the underlying [`redis`] crate. Converted to
/// [`BackendError`] before leaving this crate so the fetch pipeline handles
/// every backend uniformly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    ///
    /// Includes connection failures, protocol errors, authentication
    /// failures, and command execution errors.
    #[error("Redis backend error: {0}")]
    Redis(#[from] RedisError),
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        Self::Connection(Box::new(error))
    }
}
