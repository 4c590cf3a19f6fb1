//! Error types shared across the cache node.

use thiserror::Error;

/// Error type for cache backend operations.
///
/// Backend faults never reach clients: the fetch pipeline treats a failed
/// read as a miss and degrades to direct upstream forwarding, and skips
/// failed writes silently.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Internal backend error, state or computation error.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with remote backends (e.g. Redis).
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send>),

    /// A stored entry could not be decoded back into a cache value.
    #[error("value decoding error: {0}")]
    Decode(String),
}

/// Failure of an upstream (Registry) call.
///
/// `Clone` and `PartialEq` because the single-flight group broadcasts one
/// result to every waiter and tests assert on the variant received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Registry unreachable: connection failure, protocol error, or a 5xx
    /// answer. Eligible for stale fallback.
    #[error("upstream unavailable: {reason}")]
    Unavailable {
        /// Human-readable failure description for logs and error bodies.
        reason: String,
    },

    /// The bounded upstream timeout elapsed. Eligible for stale fallback.
    #[error("upstream request timed out")]
    Timeout,

    /// Upstream answered with a client-error status. Passed through to the
    /// caller verbatim; never cached, never replaced by stale data.
    #[error("upstream returned status {status}")]
    Status {
        /// The HTTP status code the upstream answered with.
        status: u16,
    },
}

impl UpstreamError {
    /// Shorthand for [`UpstreamError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        UpstreamError::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether a stale cache entry may stand in for this failure.
    ///
    /// Outages qualify; an explicit upstream answer does not.
    pub fn stale_eligible(&self) -> bool {
        !matches!(self, UpstreamError::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outages_allow_stale_fallback() {
        assert!(UpstreamError::unavailable("connection refused").stale_eligible());
        assert!(UpstreamError::Timeout.stale_eligible());
        assert!(!UpstreamError::Status { status: 404 }.stale_eligible());
    }

    #[test]
    fn display_carries_reason() {
        let err = UpstreamError::unavailable("connection refused");
        assert_eq!(err.to_string(), "upstream unavailable: connection refused");
    }
}
