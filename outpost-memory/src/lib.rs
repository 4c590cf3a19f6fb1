#![warn(missing_docs)]
//! In-process memory backend for the Outpost community cache node.
//!
//! [`MemoryBackend`] keeps entries in a concurrent map with per-entry hard
//! eviction bounds. It is the default store when no Redis address is
//! configured, and the backend unit and integration tests run against.

pub mod backend;

#[doc(inline)]
pub use crate::backend::MemoryBackend;
