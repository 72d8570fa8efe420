//! Spatial index over open complaints.
//!
//! Geohash-bucketed: complaints land in geohash-6 cells (~1.2km x 0.6km) and
//! a radius query scans the center cell plus its 8 neighbors, filtering by
//! haversine distance. The neighbor ring fully covers any radius up to one
//! cell dimension (~600m); `EngineConfig::validate` enforces that ceiling.

mod index;

pub use index::{area_key, cell_key, GeoIndex};
