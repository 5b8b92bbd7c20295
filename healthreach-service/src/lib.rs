//! HealthReach Service Library
//!
//! HTTP handlers, router and shared state for the accessibility service.
//! This library is used by both the healthreach-service binary and
//! integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use healthreach::proxy::MapProxy;
use healthreach::AccessService;

/// Application state shared across handlers.
pub struct AppState {
    /// Accessibility queries and facility administration.
    pub access: AccessService,
    /// Map server proxy; `None` when `GEOSERVER_URL` is unset.
    pub map_proxy: Option<MapProxy>,
}

/// Build the application router.
///
/// Analysis routes live under `/api/analysis`, facility data under
/// `/api/data` and the map proxy under `/map`.
pub fn router(state: Arc<AppState>) -> Router {
    let analysis = Router::new()
        .route(
            "/nearest_facility",
            get(handlers::analysis::nearest_facility),
        )
        .route(
            "/nearest_facilities",
            get(handlers::analysis::nearest_facilities),
        )
        .route(
            "/nearest_facility_network",
            get(handlers::analysis::nearest_facility_network),
        )
        .route("/shortest_path", get(handlers::analysis::shortest_path))
        .route("/buffer", get(handlers::analysis::population_in_buffer))
        .route(
            "/population_in_buffer",
            get(handlers::analysis::population_in_buffer),
        )
        .route(
            "/population_stats_by_distance",
            get(handlers::analysis::population_stats_by_distance),
        );

    let data = Router::new()
        .route("/facilities", get(handlers::data::list_facilities))
        .route("/facilities/search", get(handlers::data::search_facilities))
        .route("/facilities/density", get(handlers::data::facility_density))
        .route(
            "/facilities/:facility_type",
            get(handlers::data::facilities_by_type),
        )
        .route("/facility", get(handlers::data::get_facility))
        .route("/facility/add", post(handlers::data::add_facility))
        .route("/facility/update", post(handlers::data::update_facility))
        // Ids contain a slash (`node/62357`), so capture the rest of the path.
        .route("/facility/delete/*id", delete(handlers::data::delete_facility));

    let map = Router::new()
        .route("/wms", get(handlers::map::wms))
        .route("/wms/", get(handlers::map::wms))
        .route("/wfs", get(handlers::map::wfs))
        .route("/wfs/", get(handlers::map::wfs));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/analysis", analysis)
        .nest("/api/data", data)
        .nest("/map", map)
        .with_state(state)
}

/// Port used when `HEALTHREACH_PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Parse the `HEALTHREACH_PORT` value; unset falls back to
/// [`DEFAULT_PORT`], anything else must be a valid port number.
pub fn parse_port(value: Option<&str>) -> Result<u16, String> {
    match value {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("Invalid HEALTHREACH_PORT '{}': expected a port number", raw)),
    }
}

// Re-export commonly used types for convenience
pub use handlers::{ErrorResponse, HealthResponse, MessageResponse};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(None), Ok(8080));
        assert_eq!(parse_port(Some("9000")), Ok(9000));
        assert_eq!(parse_port(Some(" 3000 ")), Ok(3000));
    }

    #[test]
    fn test_parse_port_rejects_garbage() {
        for raw in ["", "http", "-1", "70000", "80.5"] {
            let err = parse_port(Some(raw)).unwrap_err();
            assert!(err.contains("HEALTHREACH_PORT"), "{err}");
        }
    }
}
