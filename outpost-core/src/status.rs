//! Fetch outcome classification.

/// How a fetch was satisfied.
///
/// Surfaced to clients via the `x-cache-status` response header and used as
/// a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Served from a fresh cache entry; the upstream was not contacted.
    Hit,
    /// Fetched from the upstream (cache miss or stale refresh) and cached.
    Miss,
    /// Upstream failed; served a stale cache entry within the allowed age.
    Stale,
    /// Cache store unavailable; forwarded directly upstream, nothing cached.
    Bypass,
}

impl FetchStatus {
    /// Lowercase label for logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Hit => "hit",
            FetchStatus::Miss => "miss",
            FetchStatus::Stale => "stale",
            FetchStatus::Bypass => "bypass",
        }
    }

    /// Uppercase value for the `x-cache-status` header.
    pub const fn header_value(&self) -> &'static str {
        match self {
            FetchStatus::Hit => "HIT",
            FetchStatus::Miss => "MISS",
            FetchStatus::Stale => "STALE",
            FetchStatus::Bypass => "BYPASS",
        }
    }
}
