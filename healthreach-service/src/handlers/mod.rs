//! HTTP request handlers.
//!
//! Handlers take raw query strings, let [`healthreach::compose`] validate
//! them, call the [`healthreach::AccessService`], and map failures through
//! [`error_response`].

pub mod analysis;
pub mod data;
pub mod map;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use healthreach::{AccessError, ErrorKind};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Underlying cause, for server-side failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Confirmation for facility writes.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
    /// Id of the affected facility.
    pub id: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Spatial engine in use.
    pub engine: String,
    /// Whether address lookups are available.
    pub geocoder: bool,
    /// Whether the map proxy is configured.
    pub map_proxy: bool,
}

/// Map a core error onto an HTTP response.
///
/// Validation failures are 400, empty results 404, map server transport
/// failures 502, and everything else 500 with `context` as the message and
/// the cause in `details`.
pub(crate) fn error_response(context: &str, e: AccessError) -> axum::response::Response {
    let (status, body) = match e.kind() {
        ErrorKind::Validation => (
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                error: e.to_string(),
                details: None,
            },
        ),
        ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            ErrorResponse {
                error: e.to_string(),
                details: None,
            },
        ),
        ErrorKind::Upstream => (
            StatusCode::BAD_GATEWAY,
            ErrorResponse {
                error: context.to_string(),
                details: Some(e.to_string()),
            },
        ),
        ErrorKind::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse {
                error: context.to_string(),
                details: Some(e.to_string()),
            },
        ),
    };

    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), error = %e, "{context}");
    } else {
        tracing::warn!(status = status.as_u16(), error = %e, "{context}");
    }

    (status, Json(body)).into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.access.engine().to_string(),
        geocoder: state.access.has_geocoder(),
        map_proxy: state.map_proxy.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_serialize() {
        let response = ErrorResponse {
            error: "No facilities found".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"error":"No facilities found"}"#);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (AccessError::MissingParameter { name: "id" }, StatusCode::BAD_REQUEST),
            (AccessError::not_found("nothing"), StatusCode::NOT_FOUND),
            (AccessError::Gateway("refused".into()), StatusCode::BAD_GATEWAY),
            (
                AccessError::Store("lock poisoned".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AccessError::VertexMapping {
                    vertex: 3,
                    candidates: 2,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error_response("Failed", error).status(), status);
        }
    }

    #[test]
    fn test_health_response_serialize() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            engine: "memory".to_string(),
            geocoder: false,
            map_proxy: true,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
        assert!(json.contains("memory"));
    }
}
