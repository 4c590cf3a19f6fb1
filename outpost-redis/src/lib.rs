#![warn(missing_docs)]
//! Redis backend for the Outpost community cache node.
//!
//! Stores each cache entry as a hash (`d` payload, `t` stored-at millis,
//! `s` stale-at millis) with a native `EXPIRE` on the hard eviction bound.
//! Connections are established lazily so the node keeps serving — degraded
//! to passthrough — while Redis is unreachable.

pub mod backend;
pub mod error;

#[doc(inline)]
pub use crate::backend::{RedisBackend, RedisBackendBuilder};
pub use crate::error::Error;
