use serde::{Deserialize, Serialize};

/// A `{lat, lon}` record, as returned by Overpass `out geom` way members.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Converts lat/lon records into `[lon, lat]` positions, preserving order.
#[must_use]
pub fn shell_from_geometry(records: &[LatLon]) -> Vec<[f64; 2]> {
    records.iter().map(|r| [r.lon, r.lat]).collect()
}
