//! WMS/WFS proxy endpoints under `/map`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use healthreach::proxy::{ProxyResponse, WfsRequest, WmsRequest};
use healthreach::AccessError;
use serde::Deserialize;
use utoipa::IntoParams;

use super::{error_response, ErrorResponse};
use crate::AppState;

/// Query parameters for GetMap.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WmsParams {
    /// Bounding box in EPSG:3857.
    pub bbox: Option<String>,
    pub layer: Option<String>,
    /// Image format (default `image/png`).
    pub format: Option<String>,
    /// Tile width in pixels (default 256).
    pub width: Option<String>,
    /// Tile height in pixels (default 256).
    pub height: Option<String>,
}

/// Query parameters for GetFeature.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WfsParams {
    pub layer: Option<String>,
    /// Output format (default `application/json`).
    pub format: Option<String>,
}

fn relay(upstream: ProxyResponse) -> axum::response::Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    match upstream.content_type {
        Some(content_type) => {
            (status, [(header::CONTENT_TYPE, content_type)], upstream.body).into_response()
        }
        None => (status, upstream.body).into_response(),
    }
}

/// Forward a WMS GetMap request to the map server.
#[utoipa::path(
    get,
    path = "/map/wms/",
    tag = "map",
    params(WmsParams),
    responses(
        (status = 200, description = "Upstream response, relayed verbatim"),
        (status = 400, body = ErrorResponse),
        (status = 502, body = ErrorResponse)
    )
)]
pub async fn wms(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WmsParams>,
) -> impl IntoResponse {
    const CONTEXT: &str = "Failed to fetch map tile";
    let request = match WmsRequest::from_params(
        params.bbox.as_deref(),
        params.layer.as_deref(),
        params.format.as_deref(),
        params.width.as_deref(),
        params.height.as_deref(),
    ) {
        Ok(request) => request,
        Err(e) => return error_response(CONTEXT, e),
    };
    let Some(proxy) = state.map_proxy.as_ref() else {
        return error_response(CONTEXT, AccessError::NotConfigured("Map server"));
    };

    match proxy.get_map(&request).await {
        Ok(upstream) => relay(upstream),
        Err(e) => error_response(CONTEXT, e),
    }
}

/// Forward a WFS GetFeature request to the map server.
#[utoipa::path(
    get,
    path = "/map/wfs/",
    tag = "map",
    params(WfsParams),
    responses(
        (status = 200, description = "Upstream response, relayed verbatim"),
        (status = 400, body = ErrorResponse),
        (status = 502, body = ErrorResponse)
    )
)]
pub async fn wfs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WfsParams>,
) -> impl IntoResponse {
    const CONTEXT: &str = "Failed to fetch map features";
    let request = match WfsRequest::from_params(params.layer.as_deref(), params.format.as_deref())
    {
        Ok(request) => request,
        Err(e) => return error_response(CONTEXT, e),
    };
    let Some(proxy) = state.map_proxy.as_ref() else {
        return error_response(CONTEXT, AccessError::NotConfigured("Map server"));
    };

    match proxy.get_features(&request).await {
        Ok(upstream) => relay(upstream),
        Err(e) => error_response(CONTEXT, e),
    }
}
