//! HealthReach Service - HTTP API for healthcare accessibility queries.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HEALTHREACH_DATASET` | JSON dataset used instead of PostGIS | None |
//! | `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USERNAME`, `DB_PASSWORD` | PostGIS connection | Required without a dataset |
//! | `DB_MAX_CONNECTIONS` | Pool size | 10 |
//! | `API_MAP` | HERE geocoding API key | Address lookups disabled |
//! | `GEOSERVER_URL` | Map server base URL | Map proxy disabled |
//! | `HEALTHREACH_HTTP_TIMEOUT_SECS` | Outbound HTTP timeout | 30 |
//! | `HEALTHREACH_PORT` | HTTP server port | 8080 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /api/analysis/nearest_facility?lat=X&lon=Y&type=T`
//! - `GET /api/analysis/nearest_facilities?lat=X&lon=Y` or `?address=A`
//! - `GET /api/analysis/nearest_facility_network?address=A&type=T`
//! - `GET /api/analysis/shortest_path?lat=X&lon=Y&name=N`
//! - `GET /api/analysis/population_in_buffer?id=I&radius_meters=R`
//! - `GET /api/analysis/population_stats_by_distance?type=T`
//! - `/api/data/...` - facility listing and administration
//! - `GET /map/wms/`, `GET /map/wfs/` - map server proxy
//! - `GET /health` - Health check
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use healthreach::proxy::MapProxy;
use healthreach::shape;
use healthreach::{AccessServiceBuilder, Config};
use healthreach_service::{handlers, parse_port, router, AppState};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the HealthReach service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "HealthReach Accessibility Service",
        version = "0.1.0",
        description = "Nearest facilities, buffer population, distance-band statistics and routing to healthcare facilities.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::analysis::nearest_facility,
        handlers::analysis::nearest_facilities,
        handlers::analysis::nearest_facility_network,
        handlers::analysis::shortest_path,
        handlers::analysis::population_in_buffer,
        handlers::analysis::population_stats_by_distance,
        handlers::data::list_facilities,
        handlers::data::facilities_by_type,
        handlers::data::search_facilities,
        handlers::data::get_facility,
        handlers::data::facility_density,
        handlers::data::add_facility,
        handlers::data::update_facility,
        handlers::data::delete_facility,
        handlers::map::wms,
        handlers::map::wfs,
        handlers::health_check,
    ),
    components(
        schemas(
            shape::FacilityView,
            shape::NearestFacility,
            shape::NearbyFacility,
            shape::NearbyFacilities,
            shape::BufferPopulation,
            shape::DistanceBandStat,
            shape::RouteToFacility,
            shape::NetworkNearest,
            shape::CategoryCount,
            shape::FacilityList,
            healthreach::Coordinate,
            healthreach::DistanceBin,
            healthreach::NewFacility,
            healthreach::FacilityPatch,
            handlers::ErrorResponse,
            handlers::MessageResponse,
            handlers::HealthResponse,
        )
    ),
    tags(
        (name = "analysis", description = "Accessibility analysis endpoints"),
        (name = "data", description = "Facility data and administration"),
        (name = "map", description = "Map server proxy"),
        (name = "system", description = "System and health endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healthreach_service=info,healthreach=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load port from environment (service-specific config)
    let port = parse_port(std::env::var("HEALTHREACH_PORT").ok().as_deref())?;

    // Store, geocoder and map server come from the library config:
    // HEALTHREACH_DATASET or DB_*, API_MAP, GEOSERVER_URL
    let config = Config::from_env()?;
    let access = AccessServiceBuilder::from_config(&config)?.build()?;

    let map_proxy = match &config.geoserver_url {
        Some(url) => Some(MapProxy::new(url, config.http_timeout)?),
        None => {
            tracing::warn!("GEOSERVER_URL not set, map proxy disabled");
            None
        }
    };
    if !access.has_geocoder() {
        tracing::warn!("API_MAP not set, address lookups disabled");
    }

    tracing::info!(
        engine = access.engine(),
        geocoder = access.has_geocoder(),
        map_proxy = map_proxy.is_some(),
        port = port,
        "Starting HealthReach service"
    );

    let state = Arc::new(AppState { access, map_proxy });

    // Build router
    let app = router(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
