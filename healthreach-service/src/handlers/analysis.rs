//! Analysis endpoints under `/api/analysis`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use healthreach::compose::{
    BufferQuery, DistanceBandQuery, NearbyFacilitiesQuery, NearestFacilityQuery,
    NetworkNearestQuery, RouteQuery,
};
use healthreach::shape::{
    BufferPopulation, DistanceBandStat, NearbyFacilities, NearestFacility, NetworkNearest,
    RouteToFacility,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{error_response, ErrorResponse};
use crate::AppState;

/// Query parameters for `nearest_facility`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearestParams {
    /// Latitude in decimal degrees.
    pub lat: Option<String>,
    /// Longitude in decimal degrees.
    pub lon: Option<String>,
    /// Category tag (e.g. `hospital`) or stored label; exact match.
    #[serde(rename = "type")]
    pub facility_type: Option<String>,
}

/// Query parameters for endpoints that accept an address instead of a point.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OriginParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    /// Free-text address, geocoded when `lat`/`lon` are absent.
    pub address: Option<String>,
    /// Category tag or label; case-insensitive substring match.
    #[serde(rename = "type")]
    pub facility_type: Option<String>,
}

/// Query parameters for `shortest_path`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RouteParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub address: Option<String>,
    /// Case-insensitive name substring; the first match is routed to.
    pub name: Option<String>,
    /// Exact facility id; takes precedence over `name`.
    pub id: Option<String>,
    /// Include the route geometry (default `true`).
    pub geometry: Option<String>,
}

/// Query parameters for buffer population.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BufferParams {
    /// Facility id.
    pub id: Option<String>,
    /// Radius in meters, positive integer (default 1000).
    pub radius_meters: Option<String>,
}

/// Query parameters for distance-band statistics.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsParams {
    /// Category tag or label; exact match.
    #[serde(rename = "type")]
    pub facility_type: Option<String>,
}

/// Nearest facility by geodesic distance.
///
/// # Returns
///
/// - `200 OK` with the facility and its distance in meters
/// - `400 Bad Request` if coordinates are missing or invalid
/// - `404 Not Found` if no facility matches the category
#[utoipa::path(
    get,
    path = "/api/analysis/nearest_facility",
    tag = "analysis",
    params(NearestParams),
    responses(
        (status = 200, body = NearestFacility),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn nearest_facility(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearestParams>,
) -> impl IntoResponse {
    const CONTEXT: &str = "Failed to find nearest facility";
    let query = match NearestFacilityQuery::parse(
        params.lat.as_deref(),
        params.lon.as_deref(),
        params.facility_type.as_deref(),
    ) {
        Ok(query) => query,
        Err(e) => return error_response(CONTEXT, e),
    };

    match state.access.nearest_facility(&query).await {
        Ok(nearest) => (StatusCode::OK, Json(nearest)).into_response(),
        Err(e) => error_response(CONTEXT, e),
    }
}

/// Up to five nearest facilities, each with its road-network node.
#[utoipa::path(
    get,
    path = "/api/analysis/nearest_facilities",
    tag = "analysis",
    params(OriginParams),
    responses(
        (status = 200, body = NearbyFacilities),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn nearest_facilities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OriginParams>,
) -> impl IntoResponse {
    const CONTEXT: &str = "Failed to find nearby facilities";
    let query = match NearbyFacilitiesQuery::parse(
        params.lat.as_deref(),
        params.lon.as_deref(),
        params.address.as_deref(),
        params.facility_type.as_deref(),
    ) {
        Ok(query) => query,
        Err(e) => return error_response(CONTEXT, e),
    };

    match state.access.nearby_facilities(&query).await {
        Ok(nearby) => (StatusCode::OK, Json(nearby)).into_response(),
        Err(e) => error_response(CONTEXT, e),
    }
}

/// Facility with the cheapest road route from an address or point.
#[utoipa::path(
    get,
    path = "/api/analysis/nearest_facility_network",
    tag = "analysis",
    params(OriginParams),
    responses(
        (status = 200, body = NetworkNearest),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse)
    )
)]
pub async fn nearest_facility_network(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OriginParams>,
) -> impl IntoResponse {
    const CONTEXT: &str = "Failed to find network-nearest facility";
    let query = match NetworkNearestQuery::parse(
        params.lat.as_deref(),
        params.lon.as_deref(),
        params.address.as_deref(),
        params.facility_type.as_deref(),
    ) {
        Ok(query) => query,
        Err(e) => return error_response(CONTEXT, e),
    };

    match state.access.nearest_facility_network(&query).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(CONTEXT, e),
    }
}

/// Shortest road route to a facility.
#[utoipa::path(
    get,
    path = "/api/analysis/shortest_path",
    tag = "analysis",
    params(RouteParams),
    responses(
        (status = 200, body = RouteToFacility),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn shortest_path(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RouteParams>,
) -> impl IntoResponse {
    const CONTEXT: &str = "Failed to compute shortest path";
    let query = match RouteQuery::parse(
        params.lat.as_deref(),
        params.lon.as_deref(),
        params.address.as_deref(),
        params.id.as_deref(),
        params.name.as_deref(),
        params.geometry.as_deref(),
    ) {
        Ok(query) => query,
        Err(e) => return error_response(CONTEXT, e),
    };

    match state.access.shortest_path(&query).await {
        Ok(route) => (StatusCode::OK, Json(route)).into_response(),
        Err(e) => error_response(CONTEXT, e),
    }
}

/// Population within a radius of a facility.
///
/// Served at both `/buffer` and `/population_in_buffer`.
#[utoipa::path(
    get,
    path = "/api/analysis/population_in_buffer",
    tag = "analysis",
    params(BufferParams),
    responses(
        (status = 200, body = BufferPopulation),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn population_in_buffer(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BufferParams>,
) -> impl IntoResponse {
    const CONTEXT: &str = "Failed to compute buffer population";
    let query = match BufferQuery::parse(params.id.as_deref(), params.radius_meters.as_deref()) {
        Ok(query) => query,
        Err(e) => return error_response(CONTEXT, e),
    };

    match state.access.population_in_buffer(&query).await {
        Ok(result) => {
            tracing::info!(
                facility = %result.facility_osm_id,
                radius_m = result.radius_meters,
                population = result.estimated_population,
                "Buffer population"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => error_response(CONTEXT, e),
    }
}

/// Population by distance to the nearest facility, in five fixed bins.
#[utoipa::path(
    get,
    path = "/api/analysis/population_stats_by_distance",
    tag = "analysis",
    params(StatsParams),
    responses(
        (status = 200, body = Vec<DistanceBandStat>),
        (status = 500, body = ErrorResponse)
    )
)]
pub async fn population_stats_by_distance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsParams>,
) -> impl IntoResponse {
    let query = DistanceBandQuery::parse(params.facility_type.as_deref());
    match state.access.population_by_distance(&query).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response("Failed to compute population statistics", e),
    }
}
