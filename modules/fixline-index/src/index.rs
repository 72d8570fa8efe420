use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use fixline_common::{haversine_m, FixlineError, GeoPoint};

/// Geohash precision for dedup cells. Cell ~1.2km x 0.6km; the 3x3 neighbor
/// ring guarantees coverage for query radii up to ~600m.
const CELL_PRECISION: usize = 6;

/// Geohash precision for trend areas (~5km cells, matches the granularity a
/// historical-trend provider aggregates at).
const AREA_PRECISION: usize = 5;

/// Geohash-6 cell key for a point. Doubles as the creation-path lock key.
pub fn cell_key(point: GeoPoint) -> Result<String, FixlineError> {
    encode(point, CELL_PRECISION)
}

/// Geohash-5 area key for a point, used for (category, area) trend lookups.
pub fn area_key(point: GeoPoint) -> Result<String, FixlineError> {
    encode(point, AREA_PRECISION)
}

fn encode(point: GeoPoint, precision: usize) -> Result<String, FixlineError> {
    geohash::encode(
        geohash::Coord { x: point.lng, y: point.lat },
        precision,
    )
    .map_err(|e| FixlineError::InvalidInput(format!("ungeohashable location: {e}")))
}

#[derive(Default)]
struct Buckets {
    /// cell key -> complaints currently in that cell.
    cells: HashMap<String, HashMap<Uuid, GeoPoint>>,
    /// Reverse map so re-inserting an id moves it instead of duplicating it.
    entries: HashMap<Uuid, String>,
}

/// Spatial index over open complaints. Entries exist only for complaints
/// with status != Resolved; the pipeline removes an entry when a complaint
/// resolves.
///
/// A query takes one read guard for its whole scan, so it observes a
/// consistent snapshot of the index as of when it started while writers
/// proceed between queries.
pub struct GeoIndex {
    buckets: RwLock<Buckets>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(Buckets::default()),
        }
    }

    /// Insert or move a complaint. Re-inserting an existing id relocates it.
    pub fn insert(&self, id: Uuid, location: GeoPoint) -> Result<(), FixlineError> {
        let key = cell_key(location)?;
        let mut buckets = self.buckets.write().expect("geo index lock poisoned");
        if let Some(old_key) = buckets.entries.insert(id, key.clone()) {
            if let Some(cell) = buckets.cells.get_mut(&old_key) {
                cell.remove(&id);
                if cell.is_empty() {
                    buckets.cells.remove(&old_key);
                }
            }
        }
        buckets.cells.entry(key).or_default().insert(id, location);
        Ok(())
    }

    /// Remove a complaint. Removing an unknown id is a no-op.
    pub fn remove(&self, id: Uuid) {
        let mut buckets = self.buckets.write().expect("geo index lock poisoned");
        if let Some(key) = buckets.entries.remove(&id) {
            if let Some(cell) = buckets.cells.get_mut(&key) {
                cell.remove(&id);
                if cell.is_empty() {
                    buckets.cells.remove(&key);
                }
            }
        }
    }

    /// All complaints within `radius_m` of `center`, with their distances in
    /// meters. Order is unspecified. An empty result means "no nearby
    /// complaints", not an error.
    pub fn query_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<(Uuid, f64)>, FixlineError> {
        let center_key = cell_key(center)?;
        let ring = geohash::neighbors(&center_key)
            .map_err(|e| FixlineError::InvalidInput(format!("bad geohash cell: {e}")))?;
        let keys = [
            center_key.as_str(),
            ring.n.as_str(),
            ring.ne.as_str(),
            ring.e.as_str(),
            ring.se.as_str(),
            ring.s.as_str(),
            ring.sw.as_str(),
            ring.w.as_str(),
            ring.nw.as_str(),
        ];

        let buckets = self.buckets.read().expect("geo index lock poisoned");
        let mut hits = Vec::new();
        for key in keys {
            if let Some(cell) = buckets.cells.get(key) {
                for (id, location) in cell {
                    let distance = haversine_m(center, *location);
                    if distance <= radius_m {
                        hits.push((*id, distance));
                    }
                }
            }
        }
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.buckets
            .read()
            .expect("geo index lock poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GeoIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN_ST: GeoPoint = GeoPoint { lat: 12.9000, lng: 77.6000 };
    /// ~60m from MAIN_ST.
    const MAIN_ST_NEARBY: GeoPoint = GeoPoint { lat: 12.9005, lng: 77.6002 };
    /// ~1.5km from MAIN_ST.
    const MARKET_SQ: GeoPoint = GeoPoint { lat: 12.9100, lng: 77.6100 };

    #[test]
    fn query_finds_nearby_complaint() {
        let index = GeoIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, MAIN_ST).unwrap();

        let hits = index.query_radius(MAIN_ST_NEARBY, 150.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, id);
        assert!(hits[0].1 < 150.0);
    }

    #[test]
    fn query_excludes_out_of_radius() {
        let index = GeoIndex::new();
        index.insert(Uuid::new_v4(), MARKET_SQ).unwrap();

        let hits = index.query_radius(MAIN_ST, 150.0).unwrap();
        assert!(hits.is_empty(), "1.5km away should not match a 150m query");
    }

    #[test]
    fn empty_query_is_valid() {
        let index = GeoIndex::new();
        let hits = index.query_radius(MAIN_ST, 150.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn finds_match_across_cell_boundary() {
        // Two points ~50m apart that straddle a geohash-6 cell edge. Pick a
        // longitude right at a cell boundary by probing keys.
        let index = GeoIndex::new();
        let mut west = GeoPoint { lat: 12.9000, lng: 77.6000 };
        let mut east = GeoPoint { lat: 12.9000, lng: 77.6004 };
        // Walk east until the two points land in different cells.
        for _ in 0..2000 {
            if cell_key(west).unwrap() != cell_key(east).unwrap() {
                break;
            }
            west.lng += 0.0004;
            east.lng += 0.0004;
        }
        assert_ne!(cell_key(west).unwrap(), cell_key(east).unwrap());

        let id = Uuid::new_v4();
        index.insert(id, west).unwrap();
        let hits = index.query_radius(east, 150.0).unwrap();
        assert_eq!(hits.len(), 1, "neighbor-cell entries must be visible");
        assert_eq!(hits[0].0, id);
    }

    #[test]
    fn remove_drops_entry() {
        let index = GeoIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, MAIN_ST).unwrap();
        assert_eq!(index.len(), 1);

        index.remove(id);
        assert!(index.is_empty());
        assert!(index.query_radius(MAIN_ST, 150.0).unwrap().is_empty());
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let index = GeoIndex::new();
        index.insert(Uuid::new_v4(), MAIN_ST).unwrap();
        index.remove(Uuid::new_v4());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn reinsert_moves_instead_of_duplicating() {
        let index = GeoIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, MAIN_ST).unwrap();
        index.insert(id, MARKET_SQ).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.query_radius(MAIN_ST, 150.0).unwrap().is_empty());
        let hits = index.query_radius(MARKET_SQ, 150.0).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn distances_are_in_meters() {
        let index = GeoIndex::new();
        let id = Uuid::new_v4();
        index.insert(id, MAIN_ST).unwrap();

        let hits = index.query_radius(MAIN_ST_NEARBY, 150.0).unwrap();
        let (_, d) = hits[0];
        assert!((50.0..80.0).contains(&d), "expected ~60m, got {d}");
    }

    #[test]
    fn cell_and_area_keys_nest() {
        let cell = cell_key(MAIN_ST).unwrap();
        let area = area_key(MAIN_ST).unwrap();
        assert_eq!(cell.len(), 6);
        assert_eq!(area.len(), 5);
        assert!(cell.starts_with(&area));
    }

    #[test]
    fn invalid_location_is_rejected() {
        assert!(cell_key(GeoPoint { lat: 91.0, lng: 0.0 }).is_err());
    }
}
