//! Accessibility service facade.
//!
//! [`AccessService`] is what the HTTP handlers and the CLI talk to. Each
//! operation validates nothing itself (the typed queries from
//! [`crate::compose`] are already valid), resolves the origin, opens one
//! store session, composes the engine primitives, and shapes the result.
//!
//! ```ignore
//! use healthreach::{AccessServiceBuilder, Config};
//! use healthreach::compose::NearestFacilityQuery;
//!
//! let service = AccessServiceBuilder::from_config(&Config::from_env()?)?.build()?;
//! let query = NearestFacilityQuery::parse(Some("21.02"), Some("105.83"), Some("hospital"))?;
//! let nearest = service.nearest_facility(&query).await?;
//! println!("{} is {} m away", nearest.name, nearest.distance_meters);
//! ```

use std::sync::Arc;

use crate::category::FacilityFilter;
use crate::compose::{
    BufferQuery, DistanceBandQuery, FacilityTarget, NearbyFacilitiesQuery, NearestFacilityQuery,
    NetworkNearestQuery, Origin, RouteQuery,
};
use crate::config::Config;
use crate::error::{AccessError, Result};
use crate::geocode::Geocoder;
use crate::model::{Coordinate, Facility, FacilityPatch, NewFacility};
use crate::routing::RoutingResolver;
use crate::shape::{
    distance_bands, path_geometry, BufferPopulation, CategoryCount, DistanceBandStat, FacilityList,
    FacilityView, NearbyFacilities, NearbyFacility, NearestFacility, NetworkNearest,
    RouteToFacility,
};
use crate::store::memory::MemoryStore;
use crate::store::{SpatialStore, StoreSession};

const NO_FACILITIES: &str = "No facilities found";

/// Healthcare accessibility operations over one spatial store.
#[derive(Clone)]
pub struct AccessService {
    store: Arc<dyn SpatialStore>,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl AccessService {
    /// Create a service over `store` without geocoding.
    pub fn new(store: Arc<dyn SpatialStore>) -> Self {
        Self {
            store,
            geocoder: None,
        }
    }

    /// Create a builder.
    pub fn builder() -> AccessServiceBuilder {
        AccessServiceBuilder::new()
    }

    /// Engine name, for logs and the health endpoint.
    pub fn engine(&self) -> &'static str {
        self.store.engine()
    }

    /// Whether addresses can be used as origins.
    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    async fn session(&self) -> Result<Box<dyn StoreSession>> {
        self.store.session().await
    }

    /// Turn an origin into a coordinate, geocoding addresses.
    ///
    /// Runs before any store session is opened.
    pub async fn resolve_origin(&self, origin: &Origin) -> Result<Coordinate> {
        match origin {
            Origin::Point(coordinate) => Ok(*coordinate),
            Origin::Address(address) => {
                let geocoder = self
                    .geocoder
                    .as_ref()
                    .ok_or(AccessError::NotConfigured("Geocoder"))?;
                geocoder
                    .geocode(address)
                    .await?
                    .ok_or_else(|| AccessError::AddressNotResolved {
                        address: address.clone(),
                    })
            }
        }
    }

    /// The geodesically closest facility, optionally of one exact category.
    pub async fn nearest_facility(&self, query: &NearestFacilityQuery) -> Result<NearestFacility> {
        let mut session = self.session().await?;
        let nearest = session
            .nearest_facilities(query.origin, query.filter.as_ref(), 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found_near(query.origin, query.filter.as_ref()))?;

        tracing::info!(
            lat = query.origin.lat,
            lon = query.origin.lon,
            facility = %nearest.facility.id,
            distance_m = nearest.distance_m,
            "nearest facility"
        );
        Ok(nearest.into())
    }

    /// Up to five nearest facilities, each with its road vertex.
    pub async fn nearby_facilities(&self, query: &NearbyFacilitiesQuery) -> Result<NearbyFacilities> {
        let origin = self.resolve_origin(&query.origin).await?;
        let mut session = self.session().await?;

        let ranked = session
            .nearest_facilities(origin, query.filter.as_ref(), query.limit)
            .await?;
        if ranked.is_empty() {
            return Err(not_found_near(origin, query.filter.as_ref()));
        }

        let mut resolver = RoutingResolver::new(session.as_mut());
        let origin_node = resolver.nearest_vertex(origin).await?;
        let locations: Vec<Coordinate> = ranked.iter().map(|r| r.facility.location).collect();
        let nodes = resolver.nearest_vertices(&locations).await?;

        Ok(NearbyFacilities {
            origin,
            origin_node,
            facilities: ranked
                .into_iter()
                .zip(nodes)
                .map(|(ranked, node)| NearbyFacility::new(ranked, node))
                .collect(),
        })
    }

    /// The facility with the cheapest road route from the origin.
    pub async fn nearest_facility_network(
        &self,
        query: &NetworkNearestQuery,
    ) -> Result<NetworkNearest> {
        let origin = self.resolve_origin(&query.origin).await?;
        let mut session = self.session().await?;

        let candidates = session.facilities(query.filter.as_ref()).await?;
        if candidates.is_empty() {
            return Err(not_found_near(origin, query.filter.as_ref()));
        }

        let mut resolver = RoutingResolver::new(session.as_mut());
        let source = resolver.nearest_vertex(origin).await?;
        let locations: Vec<Coordinate> = candidates.iter().map(|f| f.location).collect();
        let targets = resolver.nearest_vertices(&locations).await?;

        let (index, cost) = resolver
            .cheapest(source, &targets)
            .await?
            .ok_or_else(|| {
                AccessError::not_found(format!(
                    "No facility reachable by road from ({}, {})",
                    origin.lat, origin.lon
                ))
            })?;
        let winner = targets[index];

        let owners: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, &vertex)| vertex == winner)
            .map(|(i, _)| i)
            .collect();
        if owners.len() != 1 {
            return Err(AccessError::VertexMapping {
                vertex: winner,
                candidates: owners.len(),
            });
        }

        let candidate_count = candidates.len();
        let facility = candidates
            .into_iter()
            .nth(owners[0])
            .ok_or(AccessError::VertexMapping {
                vertex: winner,
                candidates: 0,
            })?;

        tracing::info!(
            source_node = source,
            target_node = winner,
            cost,
            facility = %facility.id,
            candidates = candidate_count,
            "network-nearest facility"
        );
        Ok(NetworkNearest {
            origin,
            facility: facility.into(),
            source_node: source,
            target_node: winner,
            cost,
            candidates: candidate_count,
        })
    }

    /// Least-cost road route from the origin to one facility.
    pub async fn shortest_path(&self, query: &RouteQuery) -> Result<RouteToFacility> {
        let origin = self.resolve_origin(&query.origin).await?;
        let mut session = self.session().await?;

        let (facility, name_matches) = match &query.target {
            FacilityTarget::Id(id) => {
                let facility = session
                    .facility(id)
                    .await?
                    .ok_or_else(|| AccessError::not_found(format!("Facility '{id}' not found")))?;
                (facility, 1)
            }
            FacilityTarget::Name(name) => {
                let matches = session.search_facilities(name).await?;
                let count = matches.len();
                let first = matches.into_iter().next().ok_or_else(|| {
                    AccessError::not_found(format!("No facility matching name '{name}'"))
                })?;
                if count > 1 {
                    tracing::warn!(
                        name = %name,
                        matches = count,
                        chosen = %first.id,
                        "facility name is ambiguous, using first match"
                    );
                }
                (first, count)
            }
        };

        let mut resolver = RoutingResolver::new(session.as_mut());
        let source = resolver.nearest_vertex(origin).await?;
        let target = resolver.nearest_vertex(facility.location).await?;
        let path = resolver
            .route(source, target, query.include_geometry)
            .await?;

        tracing::info!(
            source_node = source,
            target_node = target,
            cost = path.total_cost,
            edges = path.edges.len(),
            facility = %facility.id,
            "shortest path"
        );
        Ok(RouteToFacility {
            origin,
            facility: facility.into(),
            source_node: source,
            target_node: target,
            cost: path.total_cost,
            edges: path.edges,
            name_matches,
            geometry: query
                .include_geometry
                .then(|| path_geometry(path.segments)),
        })
    }

    /// Population within a radius of one facility.
    pub async fn population_in_buffer(&self, query: &BufferQuery) -> Result<BufferPopulation> {
        let mut session = self.session().await?;
        let total = session
            .population_within(&query.facility_id, f64::from(query.radius_m))
            .await?
            .ok_or_else(|| {
                AccessError::not_found(format!("Facility '{}' not found", query.facility_id))
            })?;

        Ok(BufferPopulation {
            facility_osm_id: query.facility_id.clone(),
            radius_meters: query.radius_m,
            estimated_population: total,
        })
    }

    /// Population by distance to the nearest matching facility, all bins.
    pub async fn population_by_distance(
        &self,
        query: &DistanceBandQuery,
    ) -> Result<Vec<DistanceBandStat>> {
        let mut session = self.session().await?;
        let rows = session.population_by_distance(query.filter.as_ref()).await?;
        Ok(distance_bands(rows))
    }

    pub async fn list_facilities(&self) -> Result<FacilityList> {
        let mut session = self.session().await?;
        non_empty_list(session.facilities(None).await?)
    }

    /// Facilities of one category. English tags are mapped to labels.
    pub async fn facilities_by_type(&self, category: &str) -> Result<FacilityList> {
        let filter = FacilityFilter::exact(category);
        let mut session = self.session().await?;
        non_empty_list(session.facilities(Some(&filter)).await?)
    }

    /// Facilities whose name contains `name`, ignoring case.
    pub async fn search_facilities(&self, name: &str) -> Result<FacilityList> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AccessError::MissingParameter { name: "name" });
        }
        let mut session = self.session().await?;
        non_empty_list(session.search_facilities(name).await?)
    }

    pub async fn get_facility(&self, id: &str) -> Result<FacilityView> {
        let id = required_id(id)?;
        let mut session = self.session().await?;
        session
            .facility(id)
            .await?
            .map(FacilityView::from)
            .ok_or_else(|| AccessError::not_found(format!("Facility '{id}' not found")))
    }

    /// Facility counts per category, largest first.
    pub async fn facility_density(&self) -> Result<Vec<CategoryCount>> {
        let mut session = self.session().await?;
        let counts = session.category_counts().await?;
        if counts.is_empty() {
            return Err(AccessError::not_found(NO_FACILITIES));
        }
        Ok(counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    /// Validate and insert a new facility. Returns the stored facility.
    pub async fn create_facility(&self, request: NewFacility) -> Result<Facility> {
        let facility = request.into_facility()?;
        let mut session = self.session().await?;
        session.insert_facility(&facility).await?;
        tracing::info!(id = %facility.id, category = %facility.category, "facility created");
        Ok(facility)
    }

    /// Apply a partial update. Only supplied fields change.
    pub async fn update_facility(&self, patch: FacilityPatch) -> Result<Facility> {
        let id = patch.target_id()?.to_string();
        let mut session = self.session().await?;
        let current = session
            .facility(&id)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("Facility '{id}' not found")))?;

        let updated = patch.apply(current)?;
        if !session.update_facility(&updated).await? {
            // Deleted between the read and the write.
            return Err(AccessError::not_found(format!("Facility '{id}' not found")));
        }
        tracing::info!(id = %id, "facility updated");
        Ok(updated)
    }

    pub async fn delete_facility(&self, id: &str) -> Result<()> {
        let id = required_id(id)?;
        let mut session = self.session().await?;
        if !session.delete_facility(id).await? {
            return Err(AccessError::not_found(format!("Facility '{id}' not found")));
        }
        tracing::info!(id = %id, "facility deleted");
        Ok(())
    }
}

fn required_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AccessError::MissingParameter { name: "id" });
    }
    Ok(id)
}

fn non_empty_list(facilities: Vec<Facility>) -> Result<FacilityList> {
    if facilities.is_empty() {
        return Err(AccessError::not_found(NO_FACILITIES));
    }
    Ok(FacilityList::new(facilities))
}

fn not_found_near(origin: Coordinate, filter: Option<&FacilityFilter>) -> AccessError {
    match filter {
        Some(filter) => AccessError::not_found(format!(
            "No facility of type '{}' found near ({}, {})",
            filter.label(),
            origin.lat,
            origin.lon
        )),
        None => AccessError::not_found(format!(
            "No healthcare facility found near ({}, {})",
            origin.lat, origin.lon
        )),
    }
}

/// Builder for [`AccessService`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use healthreach::AccessServiceBuilder;
/// use healthreach::store::memory::MemoryStore;
///
/// let service = AccessServiceBuilder::new()
///     .store(Arc::new(MemoryStore::from_json_file("hanoi.json")?))
///     .build()?;
/// ```
#[derive(Default)]
pub struct AccessServiceBuilder {
    store: Option<Arc<dyn SpatialStore>>,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl AccessServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder wired from configuration.
    ///
    /// A dataset file takes precedence over the database. The geocoder is
    /// enabled when an API key is configured and the `remote` feature is on.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::new();

        if let Some(path) = &config.dataset {
            tracing::info!(path = %path.display(), "Using in-memory dataset");
            builder = builder.store(Arc::new(MemoryStore::from_json_file(path)?));
        } else {
            #[cfg(feature = "postgis")]
            if let Some(database) = &config.database {
                tracing::info!(
                    host = %database.host,
                    port = database.port,
                    database = %database.name,
                    "Using PostGIS"
                );
                builder = builder.store(Arc::new(
                    crate::store::postgis::PostgisStore::connect_lazy(database),
                ));
            }
        }

        #[cfg(feature = "remote")]
        if let Some(api_key) = &config.geocoder_api_key {
            builder = builder.geocoder(Arc::new(crate::geocode::HereGeocoder::with_endpoint(
                config.geocoder_url.clone(),
                api_key.clone(),
                config.http_timeout,
            )?));
        }

        Ok(builder)
    }

    pub fn store(mut self, store: Arc<dyn SpatialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Build the service.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotConfigured`] if no store was set.
    pub fn build(self) -> Result<AccessService> {
        let store = self.store.ok_or(AccessError::NotConfigured("Spatial store"))?;
        Ok(AccessService {
            store,
            geocoder: self.geocoder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{PopulationPoint, RoadEdge};
    use crate::store::memory::Dataset;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One degree of latitude near 21°N, in meters.
    const M_PER_DEG_LAT: f64 = 110_717.0;

    fn facility(id: &str, category: &str, name: &str, lat: f64, lon: f64) -> Facility {
        Facility {
            id: id.into(),
            category: category.into(),
            speciality: None,
            name: name.into(),
            address: None,
            opening_hours: None,
            operator: None,
            operator_type: None,
            phone: None,
            website: None,
            wheelchair: None,
            location: Coordinate { lat, lon },
        }
    }

    fn road(id: i64, source: i64, target: i64, cost: f64, from: (f64, f64), to: (f64, f64)) -> RoadEdge {
        RoadEdge {
            id,
            source,
            target,
            cost,
            geometry: vec![[from.1, from.0], [to.1, to.0]],
        }
    }

    fn people(lat: f64, lon: f64, population: f64) -> PopulationPoint {
        PopulationPoint {
            location: Coordinate { lat, lon },
            population,
        }
    }

    /// Hospital 500 m north of (21.02, 105.83), pharmacy about 1 km east,
    /// clinic further north-east. The direct road to the hospital costs
    /// more than the one to the pharmacy.
    fn dataset() -> Dataset {
        let origin = (21.02, 105.83);
        let hospital = (21.02 + 500.0 / M_PER_DEG_LAT, 105.83);
        let pharmacy = (21.02, 105.84);
        let clinic = (21.03, 105.85);
        Dataset {
            facilities: vec![
                facility("node/1", "bệnh viện", "Bệnh viện Bạch Mai", hospital.0, hospital.1),
                facility("node/2", "nhà thuốc", "Nhà thuốc Bạch Mai", pharmacy.0, pharmacy.1),
                facility("node/3", "phòng khám tư nhân", "Phòng khám Hoàn Kiếm", clinic.0, clinic.1),
            ],
            roads: vec![
                road(10, 1, 2, 4.5, origin, hospital),
                road(11, 1, 3, 2.0, origin, pharmacy),
                road(12, 3, 4, 2.0, pharmacy, clinic),
                road(13, 2, 4, 1.0, hospital, clinic),
            ],
            population: vec![
                people(21.02, 105.83, 100.0),
                people(21.0, 105.83, 40.0),
                people(21.2, 105.83, 30.0),
                people(21.01, 105.83, 0.0),
            ],
        }
    }

    struct FixedGeocoder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<Coordinate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((address == "Giải Phóng, Hà Nội").then_some(Coordinate {
                lat: 21.02,
                lon: 105.83,
            }))
        }
    }

    /// Memory store that counts opened sessions.
    struct CountingStore {
        inner: MemoryStore,
        sessions: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SpatialStore for CountingStore {
        fn engine(&self) -> &'static str {
            self.inner.engine()
        }

        async fn session(&self) -> Result<Box<dyn StoreSession>> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            self.inner.session().await
        }
    }

    /// Service plus its session and geocoder call counters.
    fn counted_service() -> (AccessService, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let sessions = Arc::new(AtomicUsize::new(0));
        let geocodes = Arc::new(AtomicUsize::new(0));
        let service = AccessServiceBuilder::new()
            .store(Arc::new(CountingStore {
                inner: MemoryStore::new(dataset()).unwrap(),
                sessions: Arc::clone(&sessions),
            }))
            .geocoder(Arc::new(FixedGeocoder {
                calls: Arc::clone(&geocodes),
            }))
            .build()
            .unwrap();
        (service, sessions, geocodes)
    }

    fn service() -> AccessService {
        counted_service().0
    }

    #[test]
    fn test_builder_requires_store() {
        assert!(matches!(
            AccessServiceBuilder::new().build(),
            Err(AccessError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_nearest_facility_distance() {
        let query = NearestFacilityQuery::parse(Some("21.02"), Some("105.83"), None).unwrap();
        let nearest = service().nearest_facility(&query).await.unwrap();
        assert_eq!(nearest.osm_id, "node/1");
        assert!((nearest.distance_meters - 500.0).abs() < 1.0);
        assert_eq!(nearest.healthcare_speciality, "chung");
    }

    #[tokio::test]
    async fn test_nearest_facility_exact_filter() {
        let service = service();
        let query = NearestFacilityQuery::parse(Some("21.02"), Some("105.83"), Some("pharmacy")).unwrap();
        assert_eq!(service.nearest_facility(&query).await.unwrap().osm_id, "node/2");

        // Substrings do not match the exact filter.
        let query = NearestFacilityQuery::parse(Some("21.02"), Some("105.83"), Some("phòng")).unwrap();
        let err = service.nearest_facility(&query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("phòng"));
    }

    #[tokio::test]
    async fn test_nearby_facilities_by_address() {
        let query =
            NearbyFacilitiesQuery::parse(None, None, Some("Giải Phóng, Hà Nội"), None).unwrap();
        let nearby = service().nearby_facilities(&query).await.unwrap();
        assert_eq!(nearby.origin_node, 1);
        let ids: Vec<_> = nearby.facilities.iter().map(|f| f.facility.osm_id.as_str()).collect();
        assert_eq!(ids, ["node/1", "node/2", "node/3"]);
        let nodes: Vec<_> = nearby.facilities.iter().map(|f| f.node_id).collect();
        assert_eq!(nodes, [2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unresolved_address_is_validation_error() {
        let (service, sessions, geocodes) = counted_service();

        let query = NearbyFacilitiesQuery::parse(None, None, Some("Atlantis"), None).unwrap();
        let err = service.nearby_facilities(&query).await.unwrap_err();
        assert!(matches!(err, AccessError::AddressNotResolved { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let query = RouteQuery::parse(None, None, Some("Atlantis"), None, Some("Bạch Mai"), None)
            .unwrap();
        assert!(service.shortest_path(&query).await.is_err());
        let query = NetworkNearestQuery::parse(None, None, Some("Atlantis"), None).unwrap();
        assert!(service.nearest_facility_network(&query).await.is_err());

        // The geocoder ran for each request; the store was never touched.
        assert_eq!(geocodes.load(Ordering::SeqCst), 3);
        assert_eq!(sessions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_coordinate_origin_skips_geocoder() {
        let (service, sessions, geocodes) = counted_service();
        let query =
            NearbyFacilitiesQuery::parse(Some("21.02"), Some("105.83"), Some("Atlantis"), None)
                .unwrap();
        service.nearby_facilities(&query).await.unwrap();
        assert_eq!(geocodes.load(Ordering::SeqCst), 0);
        assert_eq!(sessions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_address_without_geocoder() {
        let service = AccessService::new(Arc::new(MemoryStore::new(dataset()).unwrap()));
        let query = NearbyFacilitiesQuery::parse(None, None, Some("Hà Nội"), None).unwrap();
        assert!(matches!(
            service.nearby_facilities(&query).await,
            Err(AccessError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_network_nearest_uses_road_cost() {
        // Hospital is closest by distance but the pharmacy is cheapest by road.
        let query = NetworkNearestQuery::parse(Some("21.02"), Some("105.83"), None, None).unwrap();
        let result = service().nearest_facility_network(&query).await.unwrap();
        assert_eq!(result.facility.osm_id, "node/2");
        assert_eq!(result.cost, 2.0);
        assert_eq!(result.candidates, 3);

        let query =
            NetworkNearestQuery::parse(Some("21.02"), Some("105.83"), None, Some("bệnh")).unwrap();
        let result = service().nearest_facility_network(&query).await.unwrap();
        assert_eq!(result.facility.osm_id, "node/1");
        assert_eq!(result.cost, 4.5);
    }

    #[tokio::test]
    async fn test_network_nearest_shared_vertex_is_mapping_error() {
        let mut data = dataset();
        let pharmacy = data.facilities[1].location;
        data.facilities
            .push(facility("node/9", "nhà thuốc", "Nhà thuốc An Khang", pharmacy.lat, pharmacy.lon));
        let service = AccessService::new(Arc::new(MemoryStore::new(data).unwrap()));

        let query =
            NetworkNearestQuery::parse(Some("21.02"), Some("105.83"), None, Some("nhà thuốc")).unwrap();
        let err = service.nearest_facility_network(&query).await.unwrap_err();
        assert!(matches!(
            err,
            AccessError::VertexMapping {
                vertex: 3,
                candidates: 2
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_shortest_path_first_name_match_wins() {
        let query = RouteQuery::parse(
            Some("21.02"),
            Some("105.83"),
            None,
            None,
            Some("bạch mai"),
            None,
        )
        .unwrap();
        let route = service().shortest_path(&query).await.unwrap();
        assert_eq!(route.facility.osm_id, "node/1");
        assert_eq!(route.name_matches, 2);
        assert_eq!(route.cost, 4.5);
        assert_eq!(route.edges, vec![10]);
        let geometry = serde_json::to_value(route.geometry.unwrap()).unwrap();
        assert_eq!(geometry["type"], "MultiLineString");
    }

    #[tokio::test]
    async fn test_shortest_path_by_id_without_geometry() {
        let query = RouteQuery::parse(
            Some("21.02"),
            Some("105.83"),
            None,
            Some("node/3"),
            None,
            Some("false"),
        )
        .unwrap();
        let route = service().shortest_path(&query).await.unwrap();
        assert_eq!(route.name_matches, 1);
        assert_eq!(route.cost, 4.0);
        assert_eq!(route.edges, vec![11, 12]);
        assert!(route.geometry.is_none());
    }

    #[tokio::test]
    async fn test_shortest_path_unknown_target() {
        let query =
            RouteQuery::parse(Some("21.02"), Some("105.83"), None, None, Some("Việt Đức"), None).unwrap();
        let err = service().shortest_path(&query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_buffer_population_grows_with_radius() {
        let service = service();
        let mut previous = -1;
        for radius in ["100", "600", "3000", "30000"] {
            let query = BufferQuery::parse(Some("node/1"), Some(radius)).unwrap();
            let total = service
                .population_in_buffer(&query)
                .await
                .unwrap()
                .estimated_population;
            assert!(total >= previous, "radius {radius}: {total} < {previous}");
            previous = total;
        }
        assert_eq!(previous, 170);

        let query = BufferQuery::parse(Some("node/1"), Some("600")).unwrap();
        let result = service.population_in_buffer(&query).await.unwrap();
        assert_eq!(result.estimated_population, 100);
        assert_eq!(result.radius_meters, 600);
    }

    #[tokio::test]
    async fn test_buffer_unknown_facility() {
        let query = BufferQuery::parse(Some("node/404"), None).unwrap();
        let err = service().population_in_buffer(&query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_population_by_distance() {
        let stats = service()
            .population_by_distance(&DistanceBandQuery::parse(Some("hospital")))
            .await
            .unwrap();
        let totals: Vec<_> = stats.iter().map(|s| s.total_population).collect();
        assert_eq!(totals, [100, 40, 0, 0, 30]);

        // No matching facility: every point is excluded, bins still appear.
        let stats = service()
            .population_by_distance(&DistanceBandQuery::parse(Some("dentist")))
            .await
            .unwrap();
        assert_eq!(stats.len(), 5);
        assert!(stats.iter().all(|s| s.total_population == 0));
    }

    #[tokio::test]
    async fn test_facility_listing() {
        let service = service();
        assert_eq!(service.list_facilities().await.unwrap().data.len(), 3);
        let hospitals = service.facilities_by_type("hospital").await.unwrap();
        assert_eq!(hospitals.data[0].osm_id, "node/1");
        assert!(service.facilities_by_type("dentist").await.is_err());
        assert_eq!(service.search_facilities("BẠCH").await.unwrap().data.len(), 2);
        assert!(matches!(
            service.search_facilities(" ").await,
            Err(AccessError::MissingParameter { name: "name" })
        ));
        assert_eq!(service.get_facility("node/2").await.unwrap().name, "Nhà thuốc Bạch Mai");
    }

    #[tokio::test]
    async fn test_facility_density() {
        let density = service().facility_density().await.unwrap();
        assert_eq!(density.len(), 3);
        assert!(density.iter().all(|c| c.count == 1));
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let service = service();
        let created = service
            .create_facility(NewFacility {
                id: Some("node/77".into()),
                name: Some("Nha khoa Paris".into()),
                category: Some("nha khoa".into()),
                lat: Some(21.01),
                lon: Some(105.82),
                phone: Some("024 3333".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.id, "node/77");

        let view = service.get_facility("node/77").await.unwrap();
        assert_eq!(view.category, "nha khoa");
        assert_eq!(view.phone.as_deref(), Some("024 3333"));
        assert_eq!(view.healthcare_speciality, "chung");
        assert_eq!((view.lat, view.lon), (21.01, 105.82));

        let duplicate = service
            .create_facility(NewFacility {
                id: Some("node/77".into()),
                name: Some("Other".into()),
                category: Some("nha khoa".into()),
                lat: Some(21.0),
                lon: Some(105.8),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(duplicate.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = service();
        let updated = service
            .update_facility(FacilityPatch {
                id: Some("node/2".into()),
                phone: Some("0911".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("0911"));
        assert_eq!(updated.name, "Nhà thuốc Bạch Mai");

        let missing = service
            .update_facility(FacilityPatch {
                id: Some("node/404".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        service.delete_facility("node/2").await.unwrap();
        assert_eq!(
            service.delete_facility("node/2").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
