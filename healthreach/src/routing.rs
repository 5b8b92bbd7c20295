//! Road-network routing on top of a [`StoreSession`].
//!
//! Coordinates are snapped to their geodesically nearest road vertex, and
//! paths and costs between vertices come from the engine. Nothing here is
//! cached; every call goes to the session.

use crate::error::{AccessError, Result};
use crate::model::{Coordinate, VertexId};
use crate::store::{PathResult, StoreSession};

/// Resolves coordinates to vertices and vertices to paths.
pub struct RoutingResolver<'a> {
    session: &'a mut dyn StoreSession,
}

impl<'a> RoutingResolver<'a> {
    pub fn new(session: &'a mut dyn StoreSession) -> Self {
        Self { session }
    }

    /// The road vertex closest to `at`.
    ///
    /// # Errors
    ///
    /// [`AccessError::NoRouteNetwork`] when the network has no vertices.
    pub async fn nearest_vertex(&mut self, at: Coordinate) -> Result<VertexId> {
        self.session
            .nearest_vertex(at)
            .await?
            .ok_or(AccessError::NoRouteNetwork {
                lat: at.lat,
                lon: at.lon,
            })
    }

    /// Nearest vertex for each point, in input order.
    pub async fn nearest_vertices(&mut self, points: &[Coordinate]) -> Result<Vec<VertexId>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let vertices = self.session.nearest_vertices(points).await?;
        points
            .iter()
            .zip(vertices)
            .map(|(point, vertex)| {
                vertex.ok_or(AccessError::NoRouteNetwork {
                    lat: point.lat,
                    lon: point.lon,
                })
            })
            .collect()
    }

    /// Least-cost undirected path from `source` to `target`.
    ///
    /// A path from a vertex to itself is empty and costs nothing.
    ///
    /// # Errors
    ///
    /// [`AccessError::Unreachable`] when no path exists.
    pub async fn route(
        &mut self,
        source: VertexId,
        target: VertexId,
        with_geometry: bool,
    ) -> Result<PathResult> {
        if source == target {
            return Ok(PathResult::default());
        }
        self.session
            .shortest_path(source, target, with_geometry)
            .await?
            .ok_or(AccessError::Unreachable {
                source_vertex: source,
                target_vertex: target,
            })
    }

    /// The cheapest of `targets` to reach from `source`.
    ///
    /// Returns the index into `targets` of the winner and its cost, or
    /// `None` when no target is reachable. Ties go to the earliest target.
    pub async fn cheapest(
        &mut self,
        source: VertexId,
        targets: &[VertexId],
    ) -> Result<Option<(usize, f64)>> {
        let mut distinct: Vec<VertexId> = Vec::with_capacity(targets.len());
        for &target in targets {
            if target != source && !distinct.contains(&target) {
                distinct.push(target);
            }
        }

        let mut costs = if distinct.is_empty() {
            Vec::new()
        } else {
            self.session.path_costs(source, &distinct).await?
        };
        if targets.contains(&source) {
            costs.push((source, 0.0));
        }

        tracing::debug!(
            source,
            targets = targets.len(),
            reachable = costs.len(),
            "computed path costs"
        );
        Ok(select_cheapest(targets, &costs))
    }
}

/// Pick the target with the lowest cost.
///
/// Targets are scanned in order and only a strictly lower cost replaces the
/// current best, so the first of several equal-cost targets wins. Targets
/// missing from `costs` are unreachable and skipped.
pub fn select_cheapest(targets: &[VertexId], costs: &[(VertexId, f64)]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, target) in targets.iter().enumerate() {
        let Some(&(_, cost)) = costs.iter().find(|(vertex, _)| vertex == target) else {
            continue;
        };
        match best {
            Some((_, best_cost)) if cost >= best_cost => {}
            _ => best = Some((index, cost)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::FacilityFilter;
    use crate::model::{Facility, RoadEdge};
    use crate::store::memory::{Dataset, MemoryStore};
    use crate::store::{BinTotal, RankedFacility, SpatialStore};
    use async_trait::async_trait;

    fn edge(id: i64, source: i64, target: i64, cost: f64, from: [f64; 2], to: [f64; 2]) -> RoadEdge {
        RoadEdge {
            id,
            source,
            target,
            cost,
            geometry: vec![from, to],
        }
    }

    /// A-B-C line plus an isolated D-E edge.
    fn store() -> MemoryStore {
        let a = [105.80, 21.00];
        let b = [105.81, 21.00];
        let c = [105.82, 21.00];
        let d = [106.50, 21.50];
        let e = [106.51, 21.50];
        MemoryStore::new(Dataset {
            facilities: Vec::new(),
            roads: vec![
                edge(1, 1, 2, 2.0, a, b),
                edge(2, 2, 3, 2.0, b, c),
                edge(3, 4, 5, 1.0, d, e),
            ],
            population: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_select_cheapest_prefers_first_on_tie() {
        let targets = [7, 8, 9];
        let costs = [(9, 1.0), (8, 1.0), (7, 3.0)];
        assert_eq!(select_cheapest(&targets, &costs), Some((1, 1.0)));
    }

    #[test]
    fn test_select_cheapest_skips_unreachable() {
        assert_eq!(select_cheapest(&[1, 2], &[(2, 4.5)]), Some((1, 4.5)));
        assert_eq!(select_cheapest(&[1, 2], &[]), None);
    }

    #[test]
    fn test_select_cheapest_repeated_vertex_keeps_first_index() {
        assert_eq!(select_cheapest(&[5, 5], &[(5, 2.0)]), Some((0, 2.0)));
    }

    #[tokio::test]
    async fn test_route_to_self_is_free() {
        let store = store();
        let mut session = store.session().await.unwrap();
        let mut resolver = RoutingResolver::new(session.as_mut());
        let path = resolver.route(2, 2, true).await.unwrap();
        assert_eq!(path.total_cost, 0.0);
        assert!(path.edges.is_empty());
    }

    #[tokio::test]
    async fn test_route_across_components_is_unreachable() {
        let store = store();
        let mut session = store.session().await.unwrap();
        let mut resolver = RoutingResolver::new(session.as_mut());
        let err = resolver.route(1, 5, false).await.unwrap_err();
        assert!(matches!(
            err,
            AccessError::Unreachable {
                source_vertex: 1,
                target_vertex: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_cheapest_includes_source_and_skips_other_component() {
        let store = store();
        let mut session = store.session().await.unwrap();
        let mut resolver = RoutingResolver::new(session.as_mut());

        assert_eq!(resolver.cheapest(1, &[4, 3, 2]).await.unwrap(), Some((2, 2.0)));
        assert_eq!(resolver.cheapest(1, &[3, 1]).await.unwrap(), Some((1, 0.0)));
        assert_eq!(resolver.cheapest(1, &[4, 5]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nearest_vertex_on_empty_network() {
        let store = MemoryStore::new(Dataset::default()).unwrap();
        let mut session = store.session().await.unwrap();
        let mut resolver = RoutingResolver::new(session.as_mut());
        let at = Coordinate::new(21.0, 105.8).unwrap();
        assert!(matches!(
            resolver.nearest_vertex(at).await,
            Err(AccessError::NoRouteNetwork { .. })
        ));
        assert!(resolver.nearest_vertices(&[at]).await.is_err());
    }

    #[tokio::test]
    async fn test_nearest_vertices_in_input_order() {
        let store = store();
        let mut session = store.session().await.unwrap();
        let mut resolver = RoutingResolver::new(session.as_mut());
        let points = [
            Coordinate::new(21.0, 105.8201).unwrap(),
            Coordinate::new(21.5001, 106.5).unwrap(),
        ];
        assert_eq!(resolver.nearest_vertices(&points).await.unwrap(), vec![3, 4]);
    }

    /// Delegates to an inner session but keeps the default `path_costs`,
    /// so costs come from one single-target query per target.
    struct SingleTargetSession {
        inner: Box<dyn StoreSession>,
        path_queries: usize,
    }

    #[async_trait]
    impl StoreSession for SingleTargetSession {
        async fn nearest_facilities(
            &mut self,
            origin: Coordinate,
            filter: Option<&FacilityFilter>,
            limit: usize,
        ) -> Result<Vec<RankedFacility>> {
            self.inner.nearest_facilities(origin, filter, limit).await
        }

        async fn population_within(
            &mut self,
            facility_id: &str,
            radius_m: f64,
        ) -> Result<Option<i64>> {
            self.inner.population_within(facility_id, radius_m).await
        }

        async fn population_by_distance(
            &mut self,
            filter: Option<&FacilityFilter>,
        ) -> Result<Vec<BinTotal>> {
            self.inner.population_by_distance(filter).await
        }

        async fn nearest_vertex(&mut self, at: Coordinate) -> Result<Option<VertexId>> {
            self.inner.nearest_vertex(at).await
        }

        async fn shortest_path(
            &mut self,
            source: VertexId,
            target: VertexId,
            with_geometry: bool,
        ) -> Result<Option<PathResult>> {
            self.path_queries += 1;
            self.inner.shortest_path(source, target, with_geometry).await
        }

        async fn facilities(&mut self, filter: Option<&FacilityFilter>) -> Result<Vec<Facility>> {
            self.inner.facilities(filter).await
        }

        async fn search_facilities(&mut self, name: &str) -> Result<Vec<Facility>> {
            self.inner.search_facilities(name).await
        }

        async fn facility(&mut self, id: &str) -> Result<Option<Facility>> {
            self.inner.facility(id).await
        }

        async fn insert_facility(&mut self, facility: &Facility) -> Result<()> {
            self.inner.insert_facility(facility).await
        }

        async fn update_facility(&mut self, facility: &Facility) -> Result<bool> {
            self.inner.update_facility(facility).await
        }

        async fn delete_facility(&mut self, id: &str) -> Result<bool> {
            self.inner.delete_facility(id).await
        }

        async fn category_counts(&mut self) -> Result<Vec<(String, i64)>> {
            self.inner.category_counts().await
        }
    }

    /// A-B-C line, a spur A-F with the same cost as A-B, and the isolated
    /// D-E edge.
    fn store_with_tie() -> MemoryStore {
        let a = [105.80, 21.00];
        let b = [105.81, 21.00];
        let c = [105.82, 21.00];
        let d = [106.50, 21.50];
        let e = [106.51, 21.50];
        let f = [105.80, 20.99];
        MemoryStore::new(Dataset {
            facilities: Vec::new(),
            roads: vec![
                edge(1, 1, 2, 2.0, a, b),
                edge(2, 2, 3, 2.0, b, c),
                edge(3, 4, 5, 1.0, d, e),
                edge(4, 1, 6, 2.0, a, f),
            ],
            population: Vec::new(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_single_target_costs_pick_same_winner() {
        let store = store_with_tie();
        let cases: [(&[VertexId], Option<(usize, f64)>); 5] = [
            // tie between 6 and 2: the earlier target wins
            (&[6, 2, 3], Some((0, 2.0))),
            (&[2, 6], Some((0, 2.0))),
            // unreachable 5 is skipped
            (&[5, 3, 2], Some((2, 2.0))),
            // the source itself costs nothing
            (&[5, 3, 2, 1], Some((3, 0.0))),
            (&[5, 4], None),
        ];

        for (targets, expected) in cases {
            let mut one_pass = store.session().await.unwrap();
            let batched = RoutingResolver::new(one_pass.as_mut())
                .cheapest(1, targets)
                .await
                .unwrap();

            let mut single = SingleTargetSession {
                inner: store.session().await.unwrap(),
                path_queries: 0,
            };
            let fallback = RoutingResolver::new(&mut single)
                .cheapest(1, targets)
                .await
                .unwrap();

            assert_eq!(batched, expected, "one-pass costs for {targets:?}");
            assert_eq!(fallback, expected, "single-target costs for {targets:?}");
            let distinct_others = targets.iter().filter(|&&t| t != 1).count();
            assert_eq!(single.path_queries, distinct_others);
        }
    }
}
