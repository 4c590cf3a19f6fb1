use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use outpost_core::UpstreamError;
use serde_json::json;

/// Failure a handler surfaces to the client.
///
/// Everything the fetch pipeline could absorb (cache faults, eligible stale
/// fallbacks) never reaches this type; what remains is an answer the client
/// has to see.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    /// The requested path names no resource this node proxies.
    UnknownResource,
    /// The upstream call failed and no cached fallback was usable.
    Upstream(UpstreamError),
}

impl From<UpstreamError> for ApiError {
    fn from(error: UpstreamError) -> Self {
        ApiError::Upstream(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownResource => (StatusCode::NOT_FOUND, "unknown resource".to_owned()),
            ApiError::Upstream(error) => {
                let status = match &error {
                    UpstreamError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    UpstreamError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    // The upstream answered; relay its verdict verbatim.
                    UpstreamError::Status { status } => {
                        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                    }
                };
                (status, error.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
