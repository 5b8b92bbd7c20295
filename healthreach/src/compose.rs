//! Request validation and query composition.
//!
//! Every analysis operation starts by turning raw request parameters into
//! one of the typed queries below. Parsing happens before any engine
//! session is opened, so an invalid request never reaches the store.

use crate::category::FacilityFilter;
use crate::error::{AccessError, Result};
use crate::model::Coordinate;

/// Buffer radius used when none is supplied.
pub const DEFAULT_RADIUS_M: u32 = 1_000;

/// How many facilities `nearest_facilities` returns.
pub const NEARBY_LIMIT: usize = 5;

/// Where a query starts: a coordinate or an address still to be geocoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Point(Coordinate),
    Address(String),
}

fn parse_f64(value: &str, name: &'static str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| AccessError::invalid(name, format!("'{value}' is not a number")))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse and bounds-check a `lat`/`lon` pair.
pub fn parse_coordinate(lat: Option<&str>, lon: Option<&str>) -> Result<Coordinate> {
    let lat = non_empty(lat).ok_or(AccessError::MissingParameter { name: "lat" })?;
    let lon = non_empty(lon).ok_or(AccessError::MissingParameter { name: "lon" })?;
    Coordinate::new(parse_f64(lat, "lat")?, parse_f64(lon, "lon")?)
}

/// Parse an origin. Coordinates win over an address when both are given.
pub fn parse_origin(
    lat: Option<&str>,
    lon: Option<&str>,
    address: Option<&str>,
) -> Result<Origin> {
    if non_empty(lat).is_some() || non_empty(lon).is_some() {
        return parse_coordinate(lat, lon).map(Origin::Point);
    }
    match non_empty(address) {
        Some(address) => Ok(Origin::Address(address.to_string())),
        None => Err(AccessError::MissingParameter { name: "lat" }),
    }
}

/// Parse a buffer radius in meters: a positive integer, default 1000.
pub fn parse_radius(value: Option<&str>) -> Result<u32> {
    let Some(value) = non_empty(value) else {
        return Ok(DEFAULT_RADIUS_M);
    };
    let radius: i64 = value.parse().map_err(|_| {
        AccessError::invalid("radius_meters", format!("'{value}' is not an integer"))
    })?;
    if radius <= 0 {
        return Err(AccessError::invalid("radius_meters", "must be positive"));
    }
    u32::try_from(radius).map_err(|_| AccessError::invalid("radius_meters", "is too large"))
}

fn parse_flag(value: Option<&str>, name: &'static str, default: bool) -> Result<bool> {
    match non_empty(value).map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(AccessError::invalid(
            name,
            format!("'{other}' is not a boolean"),
        )),
    }
}

/// Nearest facility to a point, optional exact category.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestFacilityQuery {
    pub origin: Coordinate,
    pub filter: Option<FacilityFilter>,
}

impl NearestFacilityQuery {
    pub fn parse(lat: Option<&str>, lon: Option<&str>, category: Option<&str>) -> Result<Self> {
        Ok(Self {
            origin: parse_coordinate(lat, lon)?,
            filter: non_empty(category).map(FacilityFilter::exact),
        })
    }
}

/// Up to [`NEARBY_LIMIT`] facilities near a point or address, optional
/// substring category.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyFacilitiesQuery {
    pub origin: Origin,
    pub filter: Option<FacilityFilter>,
    pub limit: usize,
}

impl NearbyFacilitiesQuery {
    pub fn parse(
        lat: Option<&str>,
        lon: Option<&str>,
        address: Option<&str>,
        category: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            origin: parse_origin(lat, lon, address)?,
            filter: non_empty(category).map(FacilityFilter::contains),
            limit: NEARBY_LIMIT,
        })
    }
}

/// Population within a radius of one facility.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferQuery {
    pub facility_id: String,
    pub radius_m: u32,
}

impl BufferQuery {
    pub fn parse(id: Option<&str>, radius: Option<&str>) -> Result<Self> {
        let facility_id = non_empty(id).ok_or(AccessError::MissingParameter { name: "id" })?;
        Ok(Self {
            facility_id: facility_id.to_string(),
            radius_m: parse_radius(radius)?,
        })
    }
}

/// Population histogram by distance to the nearest matching facility.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistanceBandQuery {
    pub filter: Option<FacilityFilter>,
}

impl DistanceBandQuery {
    pub fn parse(category: Option<&str>) -> Self {
        Self {
            filter: non_empty(category).map(FacilityFilter::exact),
        }
    }
}

/// Network-nearest facility: cheapest route among matching facilities.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNearestQuery {
    pub origin: Origin,
    pub filter: Option<FacilityFilter>,
}

impl NetworkNearestQuery {
    pub fn parse(
        lat: Option<&str>,
        lon: Option<&str>,
        address: Option<&str>,
        category: Option<&str>,
    ) -> Result<Self> {
        if non_empty(lat).is_none() && non_empty(lon).is_none() && non_empty(address).is_none() {
            return Err(AccessError::MissingParameter { name: "address" });
        }
        Ok(Self {
            origin: parse_origin(lat, lon, address)?,
            filter: non_empty(category).map(FacilityFilter::contains),
        })
    }
}

/// How the route target is identified.
#[derive(Debug, Clone, PartialEq)]
pub enum FacilityTarget {
    /// Exact facility id.
    Id(String),
    /// Case-insensitive name substring; the first match wins.
    Name(String),
}

/// Shortest path from an origin to one facility.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    pub origin: Origin,
    pub target: FacilityTarget,
    pub include_geometry: bool,
}

impl RouteQuery {
    pub fn parse(
        lat: Option<&str>,
        lon: Option<&str>,
        address: Option<&str>,
        id: Option<&str>,
        name: Option<&str>,
        geometry: Option<&str>,
    ) -> Result<Self> {
        let target = match (non_empty(id), non_empty(name)) {
            (Some(id), _) => FacilityTarget::Id(id.to_string()),
            (None, Some(name)) => FacilityTarget::Name(name.to_string()),
            (None, None) => return Err(AccessError::MissingParameter { name: "name" }),
        };
        Ok(Self {
            origin: parse_origin(lat, lon, address)?,
            target,
            include_geometry: parse_flag(geometry, "geometry", true)?,
        })
    }
}
