//! In-process spatial engine over a dataset snapshot.
//!
//! Distances use `geo`'s geodesic metric and routing uses `petgraph` over an
//! undirected graph weighted by edge cost. Road and population data are
//! read-only; the facility table accepts writes (last write wins).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use petgraph::algo::{astar, dijkstra};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::category::FacilityFilter;
use crate::error::{AccessError, Result};
use crate::geodesic::distance_m;
use crate::model::{Coordinate, DistanceBin, Facility, PopulationPoint, RoadEdge, VertexId};
use crate::store::{BinTotal, PathResult, RankedFacility, SpatialStore, StoreSession};

/// Serialized form of the reference data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub roads: Vec<RoadEdge>,
    #[serde(default)]
    pub population: Vec<PopulationPoint>,
}

impl Dataset {
    /// Read a dataset from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let dataset = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(dataset)
    }
}

impl Dataset {
    fn validate(&self) -> Result<()> {
        for facility in &self.facilities {
            checked_location(facility.location)
                .map_err(|e| invalid(format!("facility {}: {e}", facility.id)))?;
        }
        for (index, point) in self.population.iter().enumerate() {
            checked_location(point.location)
                .map_err(|e| invalid(format!("population point {index}: {e}")))?;
            if !point.population.is_finite() || point.population < 0.0 {
                return Err(invalid(format!(
                    "population point {index} has invalid count {}",
                    point.population
                )));
            }
        }
        Ok(())
    }
}

fn checked_location(location: Coordinate) -> Result<Coordinate> {
    Coordinate::new(location.lat, location.lon)
}

fn invalid(message: String) -> AccessError {
    AccessError::InvalidDataset(message)
}

#[derive(Debug, Clone, Copy)]
struct EdgeData {
    id: i64,
    source: VertexId,
    cost: f64,
}

/// Road graph with vertex positions, built once from the edge list.
struct RoadNetwork {
    graph: UnGraph<VertexId, EdgeData>,
    nodes: HashMap<VertexId, NodeIndex>,
    /// Vertex positions in first-seen order.
    positions: Vec<(VertexId, Coordinate)>,
    geometries: HashMap<i64, Vec<[f64; 2]>>,
}

impl RoadNetwork {
    fn build(edges: &[RoadEdge]) -> Result<Self> {
        let mut network = RoadNetwork {
            graph: UnGraph::default(),
            nodes: HashMap::new(),
            positions: Vec::new(),
            geometries: HashMap::new(),
        };

        for edge in edges {
            if !edge.cost.is_finite() || edge.cost < 0.0 {
                return Err(AccessError::InvalidDataset(format!(
                    "road {} has invalid cost {}",
                    edge.id, edge.cost
                )));
            }
            let (Some(first), Some(last)) = (edge.geometry.first(), edge.geometry.last()) else {
                return Err(AccessError::InvalidDataset(format!(
                    "road {} has no geometry",
                    edge.id
                )));
            };

            let a = network.vertex(edge.source, *first)?;
            let b = network.vertex(edge.target, *last)?;
            network.graph.add_edge(
                a,
                b,
                EdgeData {
                    id: edge.id,
                    source: edge.source,
                    cost: edge.cost,
                },
            );
            network.geometries.insert(edge.id, edge.geometry.clone());
        }

        Ok(network)
    }

    fn vertex(&mut self, id: VertexId, position: [f64; 2]) -> Result<NodeIndex> {
        if let Some(&index) = self.nodes.get(&id) {
            return Ok(index);
        }
        let coordinate = Coordinate::new(position[1], position[0])?;
        let index = self.graph.add_node(id);
        self.nodes.insert(id, index);
        self.positions.push((id, coordinate));
        Ok(index)
    }

    fn nearest_vertex(&self, at: Coordinate) -> Option<VertexId> {
        let mut best: Option<(VertexId, f64)> = None;
        for &(id, position) in &self.positions {
            let d = distance_m(at, position);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    fn shortest_path(
        &self,
        source: VertexId,
        target: VertexId,
        with_geometry: bool,
    ) -> Option<PathResult> {
        let start = *self.nodes.get(&source)?;
        let goal = *self.nodes.get(&target)?;

        let (total_cost, nodes) = astar(
            &self.graph,
            start,
            |n| n == goal,
            |e| e.weight().cost,
            |_| 0.0,
        )?;

        let mut path = PathResult {
            total_cost,
            ..Default::default()
        };
        for pair in nodes.windows(2) {
            // Parallel edges: the search used the cheapest one.
            let edge = self
                .graph
                .edges_connecting(pair[0], pair[1])
                .map(|e| *e.weight())
                .min_by(|x, y| x.cost.total_cmp(&y.cost))?;
            path.edges.push(edge.id);
            if with_geometry {
                let mut segment = self.geometries.get(&edge.id).cloned().unwrap_or_default();
                // Stored source-to-target; flip when walked the other way.
                if edge.source != self.graph[pair[0]] {
                    segment.reverse();
                }
                path.segments.push(segment);
            }
        }
        Some(path)
    }

    fn path_costs(&self, source: VertexId, targets: &[VertexId]) -> Vec<(VertexId, f64)> {
        let Some(&start) = self.nodes.get(&source) else {
            return Vec::new();
        };
        let reached = dijkstra(&self.graph, start, None, |e| e.weight().cost);
        targets
            .iter()
            .filter_map(|target| {
                let index = self.nodes.get(target)?;
                reached.get(index).map(|cost| (*target, *cost))
            })
            .collect()
    }
}

/// In-memory [`SpatialStore`].
///
/// Cloning is cheap; clones share the same facility table.
#[derive(Clone)]
pub struct MemoryStore {
    facilities: Arc<RwLock<Vec<Facility>>>,
    population: Arc<Vec<PopulationPoint>>,
    network: Arc<RoadNetwork>,
}

impl MemoryStore {
    /// Build the engine, validating every location, population count and
    /// road cost in the snapshot.
    pub fn new(dataset: Dataset) -> Result<Self> {
        dataset.validate()?;
        let network = RoadNetwork::build(&dataset.roads)?;
        tracing::debug!(
            facilities = dataset.facilities.len(),
            roads = dataset.roads.len(),
            vertices = network.positions.len(),
            population_points = dataset.population.len(),
            "Built in-memory spatial engine"
        );
        Ok(Self {
            facilities: Arc::new(RwLock::new(dataset.facilities)),
            population: Arc::new(dataset.population),
            network: Arc::new(network),
        })
    }

    /// Load a JSON dataset and build the engine.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(Dataset::from_json_file(path)?)
    }
}

#[async_trait]
impl SpatialStore for MemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn session(&self) -> Result<Box<dyn StoreSession>> {
        Ok(Box::new(MemorySession {
            store: self.clone(),
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
}

impl MemorySession {
    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Facility>>> {
        self.store
            .facilities
            .read()
            .map_err(|_| AccessError::Store("facility table lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Facility>>> {
        self.store
            .facilities
            .write()
            .map_err(|_| AccessError::Store("facility table lock poisoned".into()))
    }
}

fn passes(filter: Option<&FacilityFilter>, facility: &Facility) -> bool {
    filter.map_or(true, |f| f.matches(&facility.category))
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn nearest_facilities(
        &mut self,
        origin: Coordinate,
        filter: Option<&FacilityFilter>,
        limit: usize,
    ) -> Result<Vec<RankedFacility>> {
        let facilities = self.read()?;
        let mut ranked: Vec<RankedFacility> = facilities
            .iter()
            .filter(|f| passes(filter, f))
            .map(|f| RankedFacility {
                facility: f.clone(),
                distance_m: distance_m(origin, f.location),
            })
            .collect();
        // Stable sort: equal distances keep store order.
        ranked.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn population_within(
        &mut self,
        facility_id: &str,
        radius_m: f64,
    ) -> Result<Option<i64>> {
        let location = match self.read()?.iter().find(|f| f.id == facility_id) {
            Some(f) => f.location,
            None => return Ok(None),
        };
        let total: f64 = self
            .store
            .population
            .iter()
            .filter(|p| distance_m(p.location, location) <= radius_m)
            .map(|p| p.population)
            .sum();
        Ok(Some(total.round() as i64))
    }

    async fn population_by_distance(
        &mut self,
        filter: Option<&FacilityFilter>,
    ) -> Result<Vec<BinTotal>> {
        let facilities = self.read()?;
        let candidates: Vec<Coordinate> = facilities
            .iter()
            .filter(|f| passes(filter, f))
            .map(|f| f.location)
            .collect();

        let mut totals: HashMap<DistanceBin, f64> = HashMap::new();
        for point in self.store.population.iter().filter(|p| p.population > 0.0) {
            let nearest = candidates
                .iter()
                .map(|c| distance_m(point.location, *c))
                .min_by(f64::total_cmp);
            if let Some(meters) = nearest {
                *totals.entry(DistanceBin::for_distance(meters)).or_default() += point.population;
            }
        }

        Ok(DistanceBin::ALL
            .into_iter()
            .filter_map(|bin| {
                totals.get(&bin).map(|total| BinTotal {
                    distance_bin: bin.label().to_string(),
                    total_population: total.round() as i64,
                })
            })
            .collect())
    }

    async fn nearest_vertex(&mut self, at: Coordinate) -> Result<Option<VertexId>> {
        Ok(self.store.network.nearest_vertex(at))
    }

    async fn shortest_path(
        &mut self,
        source: VertexId,
        target: VertexId,
        with_geometry: bool,
    ) -> Result<Option<PathResult>> {
        Ok(self
            .store
            .network
            .shortest_path(source, target, with_geometry))
    }

    async fn path_costs(
        &mut self,
        source: VertexId,
        targets: &[VertexId],
    ) -> Result<Vec<(VertexId, f64)>> {
        Ok(self.store.network.path_costs(source, targets))
    }

    async fn facilities(&mut self, filter: Option<&FacilityFilter>) -> Result<Vec<Facility>> {
        Ok(self
            .read()?
            .iter()
            .filter(|f| passes(filter, f))
            .cloned()
            .collect())
    }

    async fn search_facilities(&mut self, name: &str) -> Result<Vec<Facility>> {
        let needle = name.to_lowercase();
        Ok(self
            .read()?
            .iter()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn facility(&mut self, id: &str) -> Result<Option<Facility>> {
        Ok(self.read()?.iter().find(|f| f.id == id).cloned())
    }

    async fn insert_facility(&mut self, facility: &Facility) -> Result<()> {
        let mut facilities = self.write()?;
        if facilities.iter().any(|f| f.id == facility.id) {
            return Err(AccessError::DuplicateFacility {
                id: facility.id.clone(),
            });
        }
        facilities.push(facility.clone());
        Ok(())
    }

    async fn update_facility(&mut self, facility: &Facility) -> Result<bool> {
        let mut facilities = self.write()?;
        match facilities.iter_mut().find(|f| f.id == facility.id) {
            Some(existing) => {
                *existing = facility.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_facility(&mut self, id: &str) -> Result<bool> {
        let mut facilities = self.write()?;
        let before = facilities.len();
        facilities.retain(|f| f.id != id);
        Ok(facilities.len() != before)
    }

    async fn category_counts(&mut self) -> Result<Vec<(String, i64)>> {
        let mut counts: Vec<(String, i64)> = Vec::new();
        for facility in self.read()?.iter() {
            match counts.iter_mut().find(|(c, _)| *c == facility.category) {
                Some((_, n)) => *n += 1,
                None => counts.push((facility.category.clone(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }
}
