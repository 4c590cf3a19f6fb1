//! Cache key types and construction.
//!
//! A [`CacheKey`] identifies one cacheable upstream response: the resource
//! name plus the request parameters that select a particular page or filter
//! of it. Parts are sorted by name at construction so the same parameter set
//! always produces the same key regardless of the order a client sent it in.
//!
//! ## Format
//!
//! When rendered to a string (the form storage backends use), keys follow
//! `{resource}:key1=value1&key2=value2`; the colon and parts are omitted for
//! parameterless keys.
//!
//! ```
//! use outpost_core::{CacheKey, KeyPart};
//!
//! let key = CacheKey::from_parts(
//!     "news",
//!     vec![
//!         KeyPart::new("page", Some("2")),
//!         KeyPart::new("limit", Some("50")),
//!     ],
//! );
//! assert_eq!(key.to_string(), "news:limit=50&page=2");
//!
//! let key = CacheKey::new("requests");
//! assert_eq!(key.to_string(), "requests");
//! ```
//!
//! ## Performance
//!
//! [`CacheKey`] wraps its data in `Arc`, so cloning is a reference-count
//! bump. Keys are cloned on every flight-group insertion and background
//! write, which makes this worth having. [`KeyPart`] uses [`SmolStr`] so
//! typical parameter names and values stay inline without heap allocation.

use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Inner structure containing the actual cache key data.
/// Wrapped in Arc for cheap cloning.
#[derive(Debug, Eq, PartialEq, Hash)]
struct CacheKeyInner {
    resource: SmolStr,
    parts: Vec<KeyPart>,
}

/// A cache key identifying a cached upstream response.
///
/// Composed of a **resource** name (e.g. "news", "tiles") and a sorted list
/// of **parts** (key-value pairs derived from request parameters).
///
/// # Example
///
/// ```
/// use outpost_core::{CacheKey, KeyPart};
///
/// let key = CacheKey::from_parts(
///     "tiles",
///     vec![
///         KeyPart::new("z", Some("3")),
///         KeyPart::new("x", Some("5")),
///         KeyPart::new("y", Some("7")),
///     ],
/// );
/// assert_eq!(key.resource(), "tiles");
/// assert_eq!(key.to_string(), "tiles:x=5&y=7&z=3");
/// ```
#[derive(Clone, Debug)]
pub struct CacheKey {
    inner: Arc<CacheKeyInner>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.resource)?;
        for (i, part) in self.inner.parts.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { ':' } else { '&' }, part)?;
        }
        Ok(())
    }
}

impl CacheKey {
    /// Creates a parameterless key for a resource.
    pub fn new(resource: impl Into<SmolStr>) -> Self {
        Self::from_parts(resource, Vec::new())
    }

    /// Creates a key from a resource name and its parameter parts.
    ///
    /// Parts are sorted by name (then value) so parameter order never
    /// splits the key space.
    pub fn from_parts(resource: impl Into<SmolStr>, mut parts: Vec<KeyPart>) -> Self {
        parts.sort();
        CacheKey {
            inner: Arc::new(CacheKeyInner {
                resource: resource.into(),
                parts,
            }),
        }
    }

    /// Returns the resource name this key belongs to.
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    /// Returns an iterator over the key parts.
    pub fn parts(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.parts.iter()
    }
}

/// A single component of a cache key.
///
/// Each part represents one request parameter. The value is optional —
/// valueless query parameters (`?flag`) become key-only parts.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the parameter name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional parameter value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
