//! Facility data endpoints under `/api/data`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use healthreach::shape::{CategoryCount, FacilityList, FacilityView};
use healthreach::{FacilityPatch, NewFacility};
use serde::Deserialize;
use utoipa::IntoParams;

use super::{error_response, ErrorResponse, MessageResponse};
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Case-insensitive name substring.
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdParams {
    /// Facility id, e.g. `node/62357`.
    pub id: Option<String>,
}

fn invalid_body(rejection: JsonRejection) -> axum::response::Response {
    tracing::warn!(error = %rejection.body_text(), "Rejected facility body");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "Invalid JSON body".to_string(),
            details: Some(rejection.body_text()),
        }),
    )
        .into_response()
}

/// All facilities.
#[utoipa::path(
    get,
    path = "/api/data/facilities",
    tag = "data",
    responses(
        (status = 200, body = FacilityList),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn list_facilities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.access.list_facilities().await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => error_response("Failed to list facilities", e),
    }
}

/// Facilities of one category (tag or label).
#[utoipa::path(
    get,
    path = "/api/data/facilities/{facility_type}",
    tag = "data",
    params(("facility_type" = String, Path, description = "Category tag or label")),
    responses(
        (status = 200, body = FacilityList),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn facilities_by_type(
    State(state): State<Arc<AppState>>,
    Path(facility_type): Path<String>,
) -> impl IntoResponse {
    match state.access.facilities_by_type(&facility_type).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => error_response("Failed to list facilities by type", e),
    }
}

/// Facilities whose name contains a substring.
#[utoipa::path(
    get,
    path = "/api/data/facilities/search",
    tag = "data",
    params(SearchParams),
    responses(
        (status = 200, body = FacilityList),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn search_facilities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let name = params.name.unwrap_or_default();
    match state.access.search_facilities(&name).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => error_response("Failed to search facilities", e),
    }
}

/// One facility by id.
#[utoipa::path(
    get,
    path = "/api/data/facility",
    tag = "data",
    params(IdParams),
    responses(
        (status = 200, body = FacilityView),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn get_facility(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IdParams>,
) -> impl IntoResponse {
    let id = params.id.unwrap_or_default();
    match state.access.get_facility(&id).await {
        Ok(facility) => (StatusCode::OK, Json(facility)).into_response(),
        Err(e) => error_response("Failed to get facility", e),
    }
}

/// Facility counts per category, largest first.
#[utoipa::path(
    get,
    path = "/api/data/facilities/density",
    tag = "data",
    responses(
        (status = 200, body = Vec<CategoryCount>),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn facility_density(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.access.facility_density().await {
        Ok(counts) => (StatusCode::OK, Json(counts)).into_response(),
        Err(e) => error_response("Failed to compute facility density", e),
    }
}

/// Create a facility.
///
/// `name`, `type`, `lat` and `lon` are required; `speciality` defaults to
/// `chung` and `id` is generated when absent.
#[utoipa::path(
    post,
    path = "/api/data/facility/add",
    tag = "data",
    request_body = NewFacility,
    responses(
        (status = 201, body = MessageResponse),
        (status = 400, body = ErrorResponse)
    )
)]
pub async fn add_facility(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewFacility>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_body(rejection),
    };

    match state.access.create_facility(request).await {
        Ok(facility) => (
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "Facility added successfully".to_string(),
                id: facility.id,
            }),
        )
            .into_response(),
        Err(e) => error_response("Failed to add facility", e),
    }
}

/// Partially update a facility. Only supplied fields change.
#[utoipa::path(
    post,
    path = "/api/data/facility/update",
    tag = "data",
    request_body = FacilityPatch,
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn update_facility(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FacilityPatch>, JsonRejection>,
) -> impl IntoResponse {
    let Json(patch) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid_body(rejection),
    };

    match state.access.update_facility(patch).await {
        Ok(facility) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Facility updated successfully".to_string(),
                id: facility.id,
            }),
        )
            .into_response(),
        Err(e) => error_response("Failed to update facility", e),
    }
}

/// Delete a facility by id.
#[utoipa::path(
    delete,
    path = "/api/data/facility/delete/{id}",
    tag = "data",
    params(("id" = String, Path, description = "Facility id")),
    responses(
        (status = 200, body = MessageResponse),
        (status = 404, body = ErrorResponse)
    )
)]
pub async fn delete_facility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.access.delete_facility(&id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Facility deleted successfully".to_string(),
                id,
            }),
        )
            .into_response(),
        Err(e) => error_response("Failed to delete facility", e),
    }
}
