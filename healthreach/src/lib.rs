//! # HealthReach - healthcare accessibility queries
//!
//! Answers accessibility questions over a dataset of healthcare facilities,
//! a weighted road network and population samples:
//!
//! - **Nearest facility** to a point, by geodesic distance
//! - **Population in a buffer** around a facility
//! - **Population by distance band** to the nearest facility of a category
//! - **Routing** from a point or address to a facility over the road network
//!
//! The spatial work itself is delegated to a [`store::SpatialStore`]: either
//! PostGIS + pgRouting (feature `postgis`) or the in-process
//! [`store::memory::MemoryStore`] built from a JSON snapshot.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use healthreach::{AccessService, store::memory::MemoryStore};
//! use healthreach::compose::NearestFacilityQuery;
//!
//! let store = MemoryStore::from_json_file("data/hanoi-sample.json")?;
//! let service = AccessService::new(Arc::new(store));
//!
//! let query = NearestFacilityQuery::parse(Some("21.02"), Some("105.83"), Some("hospital"))?;
//! let nearest = service.nearest_facility(&query).await?;
//! println!("{}: {} m", nearest.name, nearest.distance_meters);
//! ```
//!
//! ## Features
//!
//! - `postgis` - PostGIS engine via `sqlx`
//! - `remote` - HERE geocoder and WMS/WFS map proxy via `reqwest`
//! - `openapi` - `utoipa` schemas for the response types

pub mod category;
pub mod compose;
pub mod config;
pub mod error;
pub mod geocode;
pub mod geodesic;
pub mod model;
#[cfg(feature = "remote")]
pub mod proxy;
pub mod routing;
pub mod service;
pub mod shape;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::{Config, DatabaseConfig};
pub use error::{AccessError, ErrorKind, Result};
pub use model::{Coordinate, DistanceBin, Facility, FacilityPatch, NewFacility};
pub use service::{AccessService, AccessServiceBuilder};
