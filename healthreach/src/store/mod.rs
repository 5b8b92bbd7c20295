//! Spatial engine interface.
//!
//! The core never computes routes or scans tables itself; it asks a
//! [`SpatialStore`] for a [`StoreSession`] and composes the primitives the
//! session exposes. Two engines are provided:
//!
//! - [`memory::MemoryStore`]: an in-process engine over a JSON dataset
//!   snapshot, used by the CLI and the tests.
//! - `postgis::PostgisStore` (feature `postgis`): PostGIS + pgRouting.
//!
//! A session maps to exactly one engine connection. It is opened at the
//! start of an operation and released when dropped, on every exit path.

use async_trait::async_trait;

use crate::category::FacilityFilter;
use crate::error::Result;
use crate::model::{Coordinate, Facility, VertexId};

pub mod memory;
#[cfg(feature = "postgis")]
pub mod postgis;

/// A facility with its geodesic distance from a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFacility {
    pub facility: Facility,
    pub distance_m: f64,
}

/// Raw per-bin population total as returned by an engine.
///
/// Engines only report bins that have data; the response shaper fills in
/// the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct BinTotal {
    pub distance_bin: String,
    pub total_population: i64,
}

/// A least-cost path between two road vertices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathResult {
    /// Sum of traversed edge costs.
    pub total_cost: f64,
    /// Traversed edge ids in travel order.
    pub edges: Vec<i64>,
    /// Line geometry of each traversed edge, `[lon, lat]` pairs, oriented
    /// in travel direction. Empty when geometry was not requested.
    pub segments: Vec<Vec<[f64; 2]>>,
}

/// Factory for engine sessions.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Short engine name for logs.
    fn engine(&self) -> &'static str;

    /// Open a session holding one engine connection.
    async fn session(&self) -> Result<Box<dyn StoreSession>>;
}

/// Spatial primitives available for the lifetime of one connection.
#[async_trait]
pub trait StoreSession: Send {
    /// Facilities passing `filter`, nearest first by geodesic distance.
    async fn nearest_facilities(
        &mut self,
        origin: Coordinate,
        filter: Option<&FacilityFilter>,
        limit: usize,
    ) -> Result<Vec<RankedFacility>>;

    /// Population within `radius_m` of a facility.
    ///
    /// Returns `None` when the facility does not exist and `Some(0)` when
    /// nothing lies within the radius.
    async fn population_within(&mut self, facility_id: &str, radius_m: f64)
        -> Result<Option<i64>>;

    /// Positive population bucketed by distance to the nearest facility
    /// passing `filter`.
    async fn population_by_distance(
        &mut self,
        filter: Option<&FacilityFilter>,
    ) -> Result<Vec<BinTotal>>;

    /// The road vertex geodesically closest to `at`, if the network has any.
    async fn nearest_vertex(&mut self, at: Coordinate) -> Result<Option<VertexId>>;

    /// Nearest vertex for each point, in input order.
    async fn nearest_vertices(&mut self, points: &[Coordinate]) -> Result<Vec<Option<VertexId>>> {
        let mut vertices = Vec::with_capacity(points.len());
        for point in points {
            vertices.push(self.nearest_vertex(*point).await?);
        }
        Ok(vertices)
    }

    /// Undirected least-cost path. `None` when `target` is unreachable.
    async fn shortest_path(
        &mut self,
        source: VertexId,
        target: VertexId,
        with_geometry: bool,
    ) -> Result<Option<PathResult>>;

    /// Least cost from `source` to each target.
    ///
    /// Unreachable targets are omitted. Engines without one-to-many support
    /// keep this default, which issues one single-target query per target.
    async fn path_costs(
        &mut self,
        source: VertexId,
        targets: &[VertexId],
    ) -> Result<Vec<(VertexId, f64)>> {
        let mut costs = Vec::with_capacity(targets.len());
        for &target in targets {
            if let Some(path) = self.shortest_path(source, target, false).await? {
                costs.push((target, path.total_cost));
            }
        }
        Ok(costs)
    }

    /// All facilities passing `filter`, in store order.
    async fn facilities(&mut self, filter: Option<&FacilityFilter>) -> Result<Vec<Facility>>;

    /// Facilities whose name contains `name`, ignoring case, in store order.
    async fn search_facilities(&mut self, name: &str) -> Result<Vec<Facility>>;

    async fn facility(&mut self, id: &str) -> Result<Option<Facility>>;

    /// Insert a new facility. Fails with `DuplicateFacility` if the id exists.
    async fn insert_facility(&mut self, facility: &Facility) -> Result<()>;

    /// Replace a facility by id. Returns `false` if it does not exist.
    async fn update_facility(&mut self, facility: &Facility) -> Result<bool>;

    /// Delete a facility by id. Returns `false` if it does not exist.
    async fn delete_facility(&mut self, id: &str) -> Result<bool>;

    /// Number of facilities per category, largest first.
    async fn category_counts(&mut self) -> Result<Vec<(String, i64)>>;
}
