use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::header::{self, HeaderName};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use outpost::{Fetched, LatencyReport};
use outpost_core::{CacheKey, KeyPart, NodeIdentity};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying how a response was satisfied (HIT/MISS/STALE/BYPASS).
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

/// Listing resources this node proxies.
///
/// The set is closed: a request for anything else is answered 404 locally
/// instead of being forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Relief requests.
    Requests,
    /// News feed.
    News,
    /// Emergency phone directory.
    Phones,
    /// Rescue points.
    RescuePoints,
}

impl Resource {
    /// Path segment under `/api/` for this resource.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Requests => "requests",
            Resource::News => "news",
            Resource::Phones => "phones",
            Resource::RescuePoints => "rescue_points",
        }
    }

    /// Parses a path segment back into a resource.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "requests" => Some(Resource::Requests),
            "news" => Some(Resource::News),
            "phones" => Some(Resource::Phones),
            "rescue_points" => Some(Resource::RescuePoints),
            _ => None,
        }
    }
}

/// Builds the node's public router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/api/speedtest", get(speedtest))
        .route("/api/map/tiles/{z}/{x}/{y}", get(tile))
        .route("/api/{resource}", get(resource))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Splits a raw query string into sorted cache key parts.
///
/// Segments are kept verbatim (still percent-encoded): decoding buys
/// nothing for keying and would re-encode on forward. Sorting happens in
/// `CacheKey::from_parts`, so `?a=1&b=2` and `?b=2&a=1` share an entry.
fn cache_key(resource: &str, raw_query: &str) -> CacheKey {
    let parts = raw_query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => KeyPart::new(name, Some(value)),
            None => KeyPart::new(segment, None::<&str>),
        })
        .collect();
    CacheKey::from_parts(resource, parts)
}

async fn resource(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let Some(resource) = Resource::from_path(&segment) else {
        return Err(ApiError::UnknownResource);
    };
    let query = query.unwrap_or_default();
    let key = cache_key(resource.as_str(), &query);
    let policy = state.policies.resource(resource);

    let path = if query.is_empty() {
        format!("/api/{}", resource.as_str())
    } else {
        format!("/api/{}?{query}", resource.as_str())
    };
    let registry = Arc::clone(&state.registry);
    let fetched = state
        .fetcher
        .fetch(&key, policy, move || async move {
            registry.forward(&path).await
        })
        .await?;

    Ok(payload_response(fetched, "application/json"))
}

async fn tile(
    State(state): State<AppState>,
    Path((z, x, y)): Path<(u32, u32, u32)>,
) -> Result<Response, ApiError> {
    let key = CacheKey::from_parts(
        "tiles",
        vec![
            KeyPart::new("z", Some(z.to_string())),
            KeyPart::new("x", Some(x.to_string())),
            KeyPart::new("y", Some(y.to_string())),
        ],
    );

    let path = format!("/api/map/tiles/{z}/{x}/{y}");
    let registry = Arc::clone(&state.registry);
    let fetched = state
        .fetcher
        .fetch(&key, &state.policies.tiles, move || async move {
            registry.forward(&path).await
        })
        .await?;

    Ok(payload_response(fetched, "image/png"))
}

async fn speedtest(State(state): State<AppState>) -> Json<LatencyReport> {
    Json(state.probe.measure().await)
}

/// Body of the status endpoint at `/`.
#[derive(Debug, Serialize)]
pub struct NodeStatus {
    /// Human-readable liveness line.
    pub message: String,
    /// Always `"running"` while the process answers.
    pub status: &'static str,
    /// Crate version of the running binary.
    pub version: &'static str,
    /// Name of the active cache backend.
    pub cache_backend: String,
    /// The identity this node registers with.
    pub node: NodeIdentity,
}

async fn status(State(state): State<AppState>) -> Json<NodeStatus> {
    Json(NodeStatus {
        message: format!("{} is running", state.identity.name),
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        cache_backend: state.backend_name.clone(),
        node: (*state.identity).clone(),
    })
}

fn payload_response(fetched: Fetched, content_type: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(fetched.status.header_value()),
            ),
        ],
        fetched.payload,
    )
        .into_response()
}
