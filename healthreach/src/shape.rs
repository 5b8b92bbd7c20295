//! Response shapes.
//!
//! Engine results are converted into these named structures before they
//! leave the crate. Field names are part of the HTTP contract.

use serde::Serialize;

use crate::category::DEFAULT_SPECIALITY;
use crate::geodesic::round_m;
use crate::model::{Coordinate, DistanceBin, Facility, VertexId};
use crate::store::{BinTotal, RankedFacility};

/// A facility in the public output schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FacilityView {
    pub osm_id: String,
    #[serde(rename = "type")]
    pub category: String,
    pub name: String,
    pub healthcare_speciality: String,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub operator: Option<String>,
    pub operator_type: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub wheelchair: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl From<Facility> for FacilityView {
    fn from(facility: Facility) -> Self {
        Self {
            osm_id: facility.id,
            category: facility.category,
            name: facility.name,
            healthcare_speciality: speciality_or_default(facility.speciality),
            address: facility.address,
            opening_hours: facility.opening_hours,
            operator: facility.operator,
            operator_type: facility.operator_type,
            phone: facility.phone,
            website: facility.website,
            wheelchair: facility.wheelchair,
            lat: facility.location.lat,
            lon: facility.location.lon,
        }
    }
}

fn speciality_or_default(speciality: Option<String>) -> String {
    speciality
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SPECIALITY.to_string())
}

/// Result of `nearest_facility`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NearestFacility {
    pub osm_id: String,
    pub name: String,
    pub amenity: String,
    pub healthcare_speciality: String,
    /// Geodesic distance, rounded to centimeters.
    pub distance_meters: f64,
}

impl From<RankedFacility> for NearestFacility {
    fn from(ranked: RankedFacility) -> Self {
        let facility = ranked.facility;
        Self {
            osm_id: facility.id,
            name: facility.name,
            amenity: facility.category,
            healthcare_speciality: speciality_or_default(facility.speciality),
            distance_meters: round_m(ranked.distance_m),
        }
    }
}

/// One entry of `nearest_facilities`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NearbyFacility {
    #[serde(flatten)]
    pub facility: FacilityView,
    pub distance_meters: f64,
    /// Road vertex the facility snaps to.
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub node_id: VertexId,
}

impl NearbyFacility {
    pub fn new(ranked: RankedFacility, node_id: VertexId) -> Self {
        Self {
            facility: ranked.facility.into(),
            distance_meters: round_m(ranked.distance_m),
            node_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NearbyFacilities {
    /// Resolved query point.
    pub origin: Coordinate,
    /// Road vertex the origin snaps to.
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub origin_node: VertexId,
    pub facilities: Vec<NearbyFacility>,
}

/// Result of `population_in_buffer`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BufferPopulation {
    pub facility_osm_id: String,
    pub radius_meters: u32,
    pub estimated_population: i64,
}

/// One row of `population_stats_by_distance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DistanceBandStat {
    pub distance_bin: DistanceBin,
    pub total_population: i64,
}

/// Expand engine bin totals into all five bins, in fixed order.
///
/// Missing bins are zero. Labels the engine should never produce are
/// dropped with a warning.
pub fn distance_bands(rows: Vec<BinTotal>) -> Vec<DistanceBandStat> {
    let mut totals = [0i64; DistanceBin::ALL.len()];
    for row in rows {
        match DistanceBin::ALL
            .iter()
            .position(|bin| bin.label() == row.distance_bin)
        {
            Some(index) => totals[index] += row.total_population,
            None => tracing::warn!(label = %row.distance_bin, "ignoring unknown distance bin"),
        }
    }
    DistanceBin::ALL
        .into_iter()
        .zip(totals)
        .map(|(distance_bin, total_population)| DistanceBandStat {
            distance_bin,
            total_population,
        })
        .collect()
}

/// Result of `shortest_path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RouteToFacility {
    pub origin: Coordinate,
    pub facility: FacilityView,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub source_node: VertexId,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub target_node: VertexId,
    /// Sum of traversed edge costs.
    pub cost: f64,
    pub edges: Vec<i64>,
    /// How many facilities matched the requested name (1 for an id lookup).
    pub name_matches: usize,
    /// Traversed edges as a MultiLineString; absent when not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub geometry: Option<geojson::Geometry>,
}

/// Merge edge segments into one GeoJSON MultiLineString.
pub fn path_geometry(segments: Vec<Vec<[f64; 2]>>) -> geojson::Geometry {
    let lines = segments
        .into_iter()
        .map(|segment| segment.into_iter().map(|[x, y]| vec![x, y]).collect())
        .collect();
    geojson::Geometry::new(geojson::Value::MultiLineString(lines))
}

/// Result of `nearest_facility_network`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NetworkNearest {
    pub origin: Coordinate,
    pub facility: FacilityView,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub source_node: VertexId,
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub target_node: VertexId,
    /// Network cost to the winning facility.
    pub cost: f64,
    /// Number of facilities that were compared.
    pub candidates: usize,
}

/// Facilities per category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CategoryCount {
    #[serde(rename = "type")]
    pub category: String,
    pub count: i64,
}

/// Wrapper for facility listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FacilityList {
    pub data: Vec<FacilityView>,
}

impl FacilityList {
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self {
            data: facilities.into_iter().map(FacilityView::from).collect(),
        }
    }
}
