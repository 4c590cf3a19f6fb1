#![warn(missing_docs)]
//! # outpost-core
//!
//! Core types and traits for the Outpost community cache node.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//!
//! - **Keys** ([`CacheKey`], [`KeyPart`]) — deterministic composites of a
//!   resource name and sorted request parameters
//! - **Values** ([`CacheValue`], [`CacheState`]) — payload bytes with stored
//!   and stale-at timestamps; freshness is computed, not delegated to the
//!   store
//! - **Storage** ([`Backend`]) — the async store contract implemented by
//!   `outpost-memory` and `outpost-redis`
//! - **Outcomes** ([`FetchStatus`]) — how a fetch was satisfied, surfaced in
//!   the `x-cache-status` header
//! - **Identity** ([`NodeIdentity`], [`ContactInfo`]) — what this node
//!   registers with the Registry
//! - **Errors** ([`BackendError`], [`UpstreamError`]) — the cache-degrades /
//!   upstream-propagates split
//!
//! No I/O happens here; everything network-facing lives in the backend and
//! server crates.

pub mod backend;
pub mod error;
pub mod key;
pub mod node;
pub mod status;
pub mod value;

pub use backend::{Backend, BackendResult, DeleteStatus};
pub use error::{BackendError, UpstreamError};
pub use key::{CacheKey, KeyPart};
pub use node::{COMMUNITY_TAG, ContactInfo, NodeIdentity};
pub use status::FetchStatus;
pub use value::{CacheState, CacheValue};
