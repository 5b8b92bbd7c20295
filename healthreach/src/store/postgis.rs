//! PostGIS + pgRouting engine.
//!
//! Every statement is a fixed SQL string; request values, including the
//! optional category filters, are always bound as parameters. Optional
//! filters use the `($n::text IS NULL OR ...)` form so that one statement
//! covers both the filtered and unfiltered case.
//!
//! Expected schema:
//!
//! - `public.access_health` (`id`, `amenity`, `speciality`, `name`,
//!   `full_address`, `opening_hours`, `operator`, `operator_type`, `phone`,
//!   `website`, `wheelchair`, `geometry` Point/4326)
//! - `public.population_points` (`population_count`, `geometry` Point/4326)
//! - `public.roads` (`id`, `source`, `target`, `cost`, `geom` LineString/4326)
//! - `public.roads_vertices_pgr` (`id`, `the_geom` Point/4326)

use async_trait::async_trait;
use geojson::Value as GeoJsonValue;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};

use crate::category::FacilityFilter;
use crate::config::DatabaseConfig;
use crate::error::{AccessError, Result};
use crate::model::{Coordinate, Facility, VertexId};
use crate::store::{BinTotal, PathResult, RankedFacility, SpatialStore, StoreSession};

macro_rules! facility_select {
    () => {
        "SELECT f.id, f.amenity, f.speciality, f.name, f.full_address, f.opening_hours, \
         f.operator, f.operator_type, f.phone, f.website, f.wheelchair, \
         ST_Y(f.geometry) AS lat, ST_X(f.geometry) AS lon"
    };
}

macro_rules! category_predicate {
    ($exact:literal, $contains:literal) => {
        concat!(
            "($",
            $exact,
            "::text IS NULL OR f.amenity = $",
            $exact,
            ") AND ($",
            $contains,
            "::text IS NULL OR strpos(lower(f.amenity), lower($",
            $contains,
            ")) > 0)"
        )
    };
}

const ROAD_EDGES_SQL: &str = "SELECT id, source, target, cost FROM public.roads";

const NEAREST_FACILITIES: &str = concat!(
    facility_select!(),
    ", ST_Distance(ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, \
     f.geometry::geography) AS distance_meters \
     FROM public.access_health f WHERE ",
    category_predicate!("3", "4"),
    " ORDER BY distance_meters, f.id LIMIT $5"
);

const POPULATION_WITHIN: &str = "\
    SELECT COALESCE(SUM(pp.population_count), 0)::bigint AS total_population \
    FROM public.access_health f \
    LEFT JOIN public.population_points pp \
      ON ST_DWithin(pp.geometry::geography, f.geometry::geography, $2) \
    WHERE f.id = $1 \
    GROUP BY f.id";

const POPULATION_BY_DISTANCE: &str = concat!(
    "WITH point_distances AS ( \
       SELECT pp.population_count, \
         (SELECT MIN(ST_Distance(pp.geometry::geography, f.geometry::geography)) \
          FROM public.access_health f WHERE ",
    category_predicate!("1", "2"),
    ") AS min_distance_meters \
       FROM public.population_points pp \
       WHERE pp.population_count > 0 AND pp.geometry IS NOT NULL \
     ) \
     SELECT CASE \
         WHEN min_distance_meters <= 1000 THEN '0-1km' \
         WHEN min_distance_meters <= 3000 THEN '1-3km' \
         WHEN min_distance_meters <= 5000 THEN '3-5km' \
         WHEN min_distance_meters <= 10000 THEN '5-10km' \
         ELSE '>10km' \
       END AS distance_bin, \
       SUM(population_count)::bigint AS total_population \
     FROM point_distances \
     WHERE min_distance_meters IS NOT NULL \
     GROUP BY 1"
);

const NEAREST_VERTEX: &str = "\
    SELECT v.id FROM public.roads_vertices_pgr v \
    ORDER BY ST_Distance(v.the_geom::geography, \
                         ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography), v.id \
    LIMIT 1";

const NEAREST_VERTICES: &str = "\
    SELECT p.ord AS ord, nv.id AS vertex \
    FROM unnest($1::float8[], $2::float8[]) WITH ORDINALITY AS p(lon, lat, ord) \
    LEFT JOIN LATERAL ( \
      SELECT v.id FROM public.roads_vertices_pgr v \
      ORDER BY ST_Distance(v.the_geom::geography, \
                           ST_SetSRID(ST_MakePoint(p.lon, p.lat), 4326)::geography), v.id \
      LIMIT 1 \
    ) nv ON true \
    ORDER BY p.ord";

const SHORTEST_PATH: &str = "\
    SELECT r.seq, r.node, r.edge, r.cost, e.source, ST_AsGeoJSON(e.geom) AS geometry \
    FROM pgr_dijkstra($1, $2::bigint, $3::bigint, directed => false) r \
    JOIN public.roads e ON e.id = r.edge \
    ORDER BY r.seq";

const PATH_COSTS: &str = "\
    SELECT end_vid, agg_cost \
    FROM pgr_dijkstraCost($1, $2::bigint, $3::bigint[], directed => false)";

const FACILITIES: &str = concat!(
    facility_select!(),
    " FROM public.access_health f WHERE ",
    category_predicate!("1", "2"),
    " ORDER BY f.id"
);

const SEARCH_FACILITIES: &str = concat!(
    facility_select!(),
    " FROM public.access_health f \
     WHERE strpos(lower(f.name), lower($1)) > 0 ORDER BY f.id"
);

const FACILITY_BY_ID: &str = concat!(
    facility_select!(),
    " FROM public.access_health f WHERE f.id = $1"
);

const FACILITY_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM public.access_health WHERE id = $1)";

const INSERT_FACILITY: &str = "\
    INSERT INTO public.access_health ( \
      id, name, amenity, speciality, full_address, opening_hours, \
      operator, operator_type, phone, website, wheelchair, geometry) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, \
            ST_SetSRID(ST_MakePoint($12, $13), 4326))";

const UPDATE_FACILITY: &str = "\
    UPDATE public.access_health \
    SET name = $2, amenity = $3, speciality = $4, full_address = $5, \
        opening_hours = $6, operator = $7, operator_type = $8, phone = $9, \
        website = $10, wheelchair = $11, \
        geometry = ST_SetSRID(ST_MakePoint($12, $13), 4326) \
    WHERE id = $1";

const DELETE_FACILITY: &str = "DELETE FROM public.access_health WHERE id = $1";

const CATEGORY_COUNTS: &str = "\
    SELECT COALESCE(f.amenity, '') AS category, COUNT(*) AS facilities \
    FROM public.access_health f \
    GROUP BY 1 \
    ORDER BY facilities DESC, category";

/// `access_health` row, bound by column name.
#[derive(Debug, sqlx::FromRow)]
struct FacilityRow {
    id: String,
    amenity: Option<String>,
    speciality: Option<String>,
    name: Option<String>,
    full_address: Option<String>,
    opening_hours: Option<String>,
    operator: Option<String>,
    operator_type: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    wheelchair: Option<String>,
    lat: f64,
    lon: f64,
}

impl From<FacilityRow> for Facility {
    fn from(row: FacilityRow) -> Self {
        Facility {
            id: row.id,
            category: row.amenity.unwrap_or_default(),
            speciality: row.speciality,
            name: row.name.unwrap_or_default(),
            address: row.full_address,
            opening_hours: row.opening_hours,
            operator: row.operator,
            operator_type: row.operator_type,
            phone: row.phone,
            website: row.website,
            wheelchair: row.wheelchair,
            location: Coordinate {
                lat: row.lat,
                lon: row.lon,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RankedFacilityRow {
    #[sqlx(flatten)]
    facility: FacilityRow,
    distance_meters: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct BinRow {
    distance_bin: String,
    total_population: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct PathRow {
    #[allow(dead_code)]
    seq: i32,
    /// Vertex the edge is entered from.
    node: i64,
    edge: i64,
    cost: f64,
    source: i64,
    geometry: Option<String>,
}

/// PostGIS-backed [`SpatialStore`] over a lazily connected pool.
#[derive(Clone)]
pub struct PostgisStore {
    pool: PgPool,
}

impl PostgisStore {
    /// Create the pool. Connections are opened on first use.
    ///
    /// The pool is configured from discrete options, so no connection URL
    /// (and no password) ever appears in error messages.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.username)
            .password(&config.password);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(options);
        Self { pool }
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SpatialStore for PostgisStore {
    fn engine(&self) -> &'static str {
        "postgis"
    }

    async fn session(&self) -> Result<Box<dyn StoreSession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PostgisSession { conn }))
    }
}

struct PostgisSession {
    conn: PoolConnection<Postgres>,
}

fn filter_params(filter: Option<&FacilityFilter>) -> (Option<&str>, Option<&str>) {
    match filter {
        Some(f) => (f.exact_label(), f.contains_label()),
        None => (None, None),
    }
}

/// Line coordinates of a GeoJSON edge geometry.
fn edge_segments(geojson: &str) -> Result<Vec<Vec<[f64; 2]>>> {
    let geometry: geojson::Geometry = serde_json::from_str(geojson)?;
    let to_pairs = |line: Vec<Vec<f64>>| -> Vec<[f64; 2]> {
        line.into_iter()
            .filter(|p| p.len() >= 2)
            .map(|p| [p[0], p[1]])
            .collect()
    };
    match geometry.value {
        GeoJsonValue::LineString(line) => Ok(vec![to_pairs(line)]),
        GeoJsonValue::MultiLineString(lines) => Ok(lines.into_iter().map(to_pairs).collect()),
        _ => Err(AccessError::InvalidDataset(
            "road geometry is not a line".into(),
        )),
    }
}

/// Edge geometry in travel order. Roads are stored source-to-target, so
/// an edge entered from its target vertex is flipped.
fn oriented_segments(geojson: &str, entered_at_source: bool) -> Result<Vec<Vec<[f64; 2]>>> {
    let mut segments = edge_segments(geojson)?;
    if !entered_at_source {
        segments.reverse();
        for segment in &mut segments {
            segment.reverse();
        }
    }
    Ok(segments)
}

#[async_trait]
impl StoreSession for PostgisSession {
    async fn nearest_facilities(
        &mut self,
        origin: Coordinate,
        filter: Option<&FacilityFilter>,
        limit: usize,
    ) -> Result<Vec<RankedFacility>> {
        let (exact, contains) = filter_params(filter);
        let rows: Vec<RankedFacilityRow> = sqlx::query_as(NEAREST_FACILITIES)
            .bind(origin.lon)
            .bind(origin.lat)
            .bind(exact)
            .bind(contains)
            .bind(limit as i64)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| RankedFacility {
                facility: row.facility.into(),
                distance_m: row.distance_meters,
            })
            .collect())
    }

    async fn population_within(
        &mut self,
        facility_id: &str,
        radius_m: f64,
    ) -> Result<Option<i64>> {
        let total: Option<i64> = sqlx::query_scalar(POPULATION_WITHIN)
            .bind(facility_id)
            .bind(radius_m)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(total)
    }

    async fn population_by_distance(
        &mut self,
        filter: Option<&FacilityFilter>,
    ) -> Result<Vec<BinTotal>> {
        let (exact, contains) = filter_params(filter);
        let rows: Vec<BinRow> = sqlx::query_as(POPULATION_BY_DISTANCE)
            .bind(exact)
            .bind(contains)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| BinTotal {
                distance_bin: row.distance_bin,
                total_population: row.total_population,
            })
            .collect())
    }

    async fn nearest_vertex(&mut self, at: Coordinate) -> Result<Option<VertexId>> {
        let vertex: Option<i64> = sqlx::query_scalar(NEAREST_VERTEX)
            .bind(at.lon)
            .bind(at.lat)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(vertex)
    }

    async fn nearest_vertices(&mut self, points: &[Coordinate]) -> Result<Vec<Option<VertexId>>> {
        let lons: Vec<f64> = points.iter().map(|p| p.lon).collect();
        let lats: Vec<f64> = points.iter().map(|p| p.lat).collect();
        let rows: Vec<(i64, Option<i64>)> = sqlx::query_as(NEAREST_VERTICES)
            .bind(lons)
            .bind(lats)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(|(_, vertex)| vertex).collect())
    }

    async fn shortest_path(
        &mut self,
        source: VertexId,
        target: VertexId,
        with_geometry: bool,
    ) -> Result<Option<PathResult>> {
        let rows: Vec<PathRow> = sqlx::query_as(SHORTEST_PATH)
            .bind(ROAD_EDGES_SQL)
            .bind(source)
            .bind(target)
            .fetch_all(&mut *self.conn)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut path = PathResult::default();
        for row in rows {
            path.total_cost += row.cost;
            path.edges.push(row.edge);
            if with_geometry {
                if let Some(geometry) = row.geometry.as_deref() {
                    path.segments
                        .extend(oriented_segments(geometry, row.node == row.source)?);
                }
            }
        }
        Ok(Some(path))
    }

    async fn path_costs(
        &mut self,
        source: VertexId,
        targets: &[VertexId],
    ) -> Result<Vec<(VertexId, f64)>> {
        let rows: Vec<(i64, f64)> = sqlx::query_as(PATH_COSTS)
            .bind(ROAD_EDGES_SQL)
            .bind(source)
            .bind(targets.to_vec())
            .fetch_all(&mut *self.conn)
            .await?;
        // Report in caller order, not engine order.
        Ok(targets
            .iter()
            .filter_map(|t| rows.iter().find(|(v, _)| v == t).copied())
            .collect())
    }

    async fn facilities(&mut self, filter: Option<&FacilityFilter>) -> Result<Vec<Facility>> {
        let (exact, contains) = filter_params(filter);
        let rows: Vec<FacilityRow> = sqlx::query_as(FACILITIES)
            .bind(exact)
            .bind(contains)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(Facility::from).collect())
    }

    async fn search_facilities(&mut self, name: &str) -> Result<Vec<Facility>> {
        let rows: Vec<FacilityRow> = sqlx::query_as(SEARCH_FACILITIES)
            .bind(name)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(Facility::from).collect())
    }

    async fn facility(&mut self, id: &str) -> Result<Option<Facility>> {
        let row: Option<FacilityRow> = sqlx::query_as(FACILITY_BY_ID)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row.map(Facility::from))
    }

    async fn insert_facility(&mut self, facility: &Facility) -> Result<()> {
        let exists: bool = sqlx::query_scalar(FACILITY_EXISTS)
            .bind(&facility.id)
            .fetch_one(&mut *self.conn)
            .await?;
        if exists {
            return Err(AccessError::DuplicateFacility {
                id: facility.id.clone(),
            });
        }

        let result = sqlx::query(INSERT_FACILITY)
            .bind(&facility.id)
            .bind(&facility.name)
            .bind(&facility.category)
            .bind(&facility.speciality)
            .bind(&facility.address)
            .bind(&facility.opening_hours)
            .bind(&facility.operator)
            .bind(&facility.operator_type)
            .bind(&facility.phone)
            .bind(&facility.website)
            .bind(&facility.wheelchair)
            .bind(facility.location.lon)
            .bind(facility.location.lat)
            .execute(&mut *self.conn)
            .await;

        match result {
            Ok(_) => Ok(()),
            // Lost a race with a concurrent insert of the same id.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AccessError::DuplicateFacility {
                    id: facility.id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_facility(&mut self, facility: &Facility) -> Result<bool> {
        let result = sqlx::query(UPDATE_FACILITY)
            .bind(&facility.id)
            .bind(&facility.name)
            .bind(&facility.category)
            .bind(&facility.speciality)
            .bind(&facility.address)
            .bind(&facility.opening_hours)
            .bind(&facility.operator)
            .bind(&facility.operator_type)
            .bind(&facility.phone)
            .bind(&facility.website)
            .bind(&facility.wheelchair)
            .bind(facility.location.lon)
            .bind(facility.location.lat)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_facility(&mut self, id: &str) -> Result<bool> {
        let result = sqlx::query(DELETE_FACILITY)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn category_counts(&mut self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(CATEGORY_COUNTS)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows)
    }
}
