//! Reference data types: facilities, road edges, population points.

use geo::Point;
use serde::{Deserialize, Serialize};

use crate::category::DEFAULT_SPECIALITY;
use crate::error::{AccessError, Result};

/// Road-network vertex identifier.
pub type VertexId = i64;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Coordinate {
    /// Latitude (-90 to 90).
    pub lat: f64,
    /// Longitude (-180 to 180).
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(AccessError::OutOfBounds { lat, lon });
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(AccessError::OutOfBounds { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// `geo` point in (x = lon, y = lat) order.
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// A healthcare point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Unique identifier, usually an OSM reference such as `node/62357`.
    pub id: String,
    /// Amenity label (e.g. `bệnh viện`).
    pub category: String,
    #[serde(default)]
    pub speciality: Option<String>,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub operator_type: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// OSM wheelchair accessibility value (`yes`, `no`, `limited`).
    #[serde(default)]
    pub wheelchair: Option<String>,
    pub location: Coordinate,
}

/// Request body for creating a facility.
///
/// Everything is optional at the type level so that a missing field becomes
/// a descriptive validation error instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewFacility {
    /// Optional explicit id; generated when absent.
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speciality: Option<String>,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub operator: Option<String>,
    pub operator_type: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub wheelchair: Option<String>,
}

impl NewFacility {
    /// Validate the request and build the facility to store.
    ///
    /// The specialty defaults to [`DEFAULT_SPECIALITY`]; the id defaults to
    /// a fresh `facility/<uuid>`.
    pub fn into_facility(self) -> Result<Facility> {
        let name = required_text(self.name, "name")?;
        let category = required_text(self.category, "type")?;
        let (lat, lon) = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            (None, _) => return Err(AccessError::MissingParameter { name: "lat" }),
            (_, None) => return Err(AccessError::MissingParameter { name: "lon" }),
        };
        let location = Coordinate::new(lat, lon)?;

        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => format!("facility/{}", uuid::Uuid::new_v4()),
        };

        Ok(Facility {
            id,
            category,
            speciality: Some(
                self.speciality
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SPECIALITY.to_string()),
            ),
            name,
            address: self.address,
            opening_hours: self.opening_hours,
            operator: self.operator,
            operator_type: self.operator_type,
            phone: self.phone,
            website: self.website,
            wheelchair: self.wheelchair,
            location,
        })
    }
}

/// Request body for a partial facility update.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FacilityPatch {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speciality: Option<String>,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub operator: Option<String>,
    pub operator_type: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub wheelchair: Option<String>,
}

impl FacilityPatch {
    /// The id of the facility to update.
    pub fn target_id(&self) -> Result<&str> {
        match self.id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(AccessError::MissingParameter { name: "id" }),
        }
    }

    /// Overlay the supplied fields on `current`.
    ///
    /// The location only moves when both `lat` and `lon` are present.
    pub fn apply(self, current: Facility) -> Result<Facility> {
        let location = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon)?,
            _ => current.location,
        };
        let name = match self.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AccessError::invalid("name", "must not be empty"))
            }
            Some(name) => name,
            None => current.name,
        };
        let category = match self.category {
            Some(category) if category.trim().is_empty() => {
                return Err(AccessError::invalid("type", "must not be empty"))
            }
            Some(category) => category,
            None => current.category,
        };
        let speciality = self
            .speciality
            .filter(|s| !s.is_empty())
            .or(current.speciality.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_SPECIALITY.to_string());

        Ok(Facility {
            id: current.id,
            category,
            speciality: Some(speciality),
            name,
            address: self.address.or(current.address),
            opening_hours: self.opening_hours.or(current.opening_hours),
            operator: self.operator.or(current.operator),
            operator_type: self.operator_type.or(current.operator_type),
            phone: self.phone.or(current.phone),
            website: self.website.or(current.website),
            wheelchair: self.wheelchair.or(current.wheelchair),
            location,
        })
    }
}

fn required_text(value: Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AccessError::MissingParameter { name }),
    }
}

/// One edge of the road graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    pub id: i64,
    pub source: VertexId,
    pub target: VertexId,
    /// Traversal cost, non-negative.
    pub cost: f64,
    /// Line geometry as `[lon, lat]` pairs, source end first.
    pub geometry: Vec<[f64; 2]>,
}

/// A population sample with its location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationPoint {
    pub location: Coordinate,
    /// Estimated number of people, non-negative.
    pub population: f64,
}

/// Fixed distance bands used for population statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum DistanceBin {
    #[serde(rename = "0-1km")]
    UpTo1Km,
    #[serde(rename = "1-3km")]
    UpTo3Km,
    #[serde(rename = "3-5km")]
    UpTo5Km,
    #[serde(rename = "5-10km")]
    UpTo10Km,
    #[serde(rename = ">10km")]
    Beyond10Km,
}

impl DistanceBin {
    /// All bins in reporting order.
    pub const ALL: [DistanceBin; 5] = [
        DistanceBin::UpTo1Km,
        DistanceBin::UpTo3Km,
        DistanceBin::UpTo5Km,
        DistanceBin::UpTo10Km,
        DistanceBin::Beyond10Km,
    ];

    /// Inclusive upper bound in meters; `None` for the open last bin.
    pub fn upper_bound_m(self) -> Option<f64> {
        match self {
            DistanceBin::UpTo1Km => Some(1_000.0),
            DistanceBin::UpTo3Km => Some(3_000.0),
            DistanceBin::UpTo5Km => Some(5_000.0),
            DistanceBin::UpTo10Km => Some(10_000.0),
            DistanceBin::Beyond10Km => None,
        }
    }

    /// The first bin whose upper bound is at least `meters`.
    ///
    /// Boundaries belong to the lower bin: exactly 1000 m is `0-1km`.
    pub fn for_distance(meters: f64) -> Self {
        Self::ALL
            .into_iter()
            .find(|bin| bin.upper_bound_m().is_some_and(|upper| meters <= upper))
            .unwrap_or(DistanceBin::Beyond10Km)
    }

    /// Label used on the wire.
    pub fn label(self) -> &'static str {
        match self {
            DistanceBin::UpTo1Km => "0-1km",
            DistanceBin::UpTo3Km => "1-3km",
            DistanceBin::UpTo5Km => "3-5km",
            DistanceBin::UpTo10Km => "5-10km",
            DistanceBin::Beyond10Km => ">10km",
        }
    }

    /// Parse a wire label back into a bin.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bin| bin.label() == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_bounds() {
        assert!(Coordinate::new(21.02, 105.83).is_ok());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(AccessError::OutOfBounds { .. })
        ));
        assert!(Coordinate::new(0.0, 180.1).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_distance_bin_boundaries() {
        assert_eq!(DistanceBin::for_distance(0.0), DistanceBin::UpTo1Km);
        assert_eq!(DistanceBin::for_distance(1_000.0), DistanceBin::UpTo1Km);
        assert_eq!(DistanceBin::for_distance(1_000.01), DistanceBin::UpTo3Km);
        assert_eq!(DistanceBin::for_distance(3_000.0), DistanceBin::UpTo3Km);
        assert_eq!(DistanceBin::for_distance(5_000.0), DistanceBin::UpTo5Km);
        assert_eq!(DistanceBin::for_distance(10_000.0), DistanceBin::UpTo10Km);
        assert_eq!(DistanceBin::for_distance(10_000.5), DistanceBin::Beyond10Km);
    }

    #[test]
    fn test_distance_bin_labels_round_trip_through_serde() {
        for bin in DistanceBin::ALL {
            let json = serde_json::to_string(&bin).unwrap();
            assert_eq!(json, format!("\"{}\"", bin.label()));
            assert_eq!(DistanceBin::from_label(bin.label()), Some(bin));
        }
        assert_eq!(DistanceBin::from_label("2-4km"), None);
    }

    #[test]
    fn test_new_facility_defaults() {
        let request = NewFacility {
            name: Some("Bệnh viện Bạch Mai".into()),
            category: Some("bệnh viện".into()),
            lat: Some(21.0),
            lon: Some(105.84),
            ..Default::default()
        };
        let facility = request.into_facility().unwrap();
        assert!(facility.id.starts_with("facility/"));
        assert_eq!(facility.speciality.as_deref(), Some(DEFAULT_SPECIALITY));
        assert_eq!(facility.location, Coordinate { lat: 21.0, lon: 105.84 });
    }

    #[test]
    fn test_new_facility_requires_fields() {
        let missing_type = NewFacility {
            name: Some("A".into()),
            lat: Some(21.0),
            lon: Some(105.0),
            ..Default::default()
        };
        assert!(matches!(
            missing_type.into_facility(),
            Err(AccessError::MissingParameter { name: "type" })
        ));

        let missing_lon = NewFacility {
            name: Some("A".into()),
            category: Some("nha khoa".into()),
            lat: Some(21.0),
            ..Default::default()
        };
        assert!(matches!(
            missing_lon.into_facility(),
            Err(AccessError::MissingParameter { name: "lon" })
        ));
    }

    fn existing() -> Facility {
        Facility {
            id: "node/1".into(),
            category: "nhà thuốc".into(),
            speciality: None,
            name: "Nhà thuốc Long Châu".into(),
            address: Some("1 Phố Huế".into()),
            opening_hours: None,
            operator: None,
            operator_type: None,
            phone: Some("0241".into()),
            website: None,
            wheelchair: None,
            location: Coordinate {
                lat: 21.01,
                lon: 105.85,
            },
        }
    }

    #[test]
    fn test_patch_keeps_unsupplied_fields() {
        let patch = FacilityPatch {
            id: Some("node/1".into()),
            phone: Some("0242".into()),
            lat: Some(21.5),
            ..Default::default()
        };
        let updated = patch.apply(existing()).unwrap();
        assert_eq!(updated.name, "Nhà thuốc Long Châu");
        assert_eq!(updated.phone.as_deref(), Some("0242"));
        assert_eq!(updated.address.as_deref(), Some("1 Phố Huế"));
        // lat without lon leaves the geometry alone
        assert_eq!(updated.location.lat, 21.01);
        assert_eq!(updated.speciality.as_deref(), Some(DEFAULT_SPECIALITY));
    }

    #[test]
    fn test_patch_moves_location_with_both_coordinates() {
        let patch = FacilityPatch {
            id: Some("node/1".into()),
            lat: Some(21.5),
            lon: Some(105.5),
            ..Default::default()
        };
        let updated = patch.apply(existing()).unwrap();
        assert_eq!(updated.location, Coordinate { lat: 21.5, lon: 105.5 });
    }

    #[test]
    fn test_patch_requires_id() {
        assert!(FacilityPatch::default().target_id().is_err());
    }
}
