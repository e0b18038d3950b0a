//! Nearest-neighbour search over `[lat, lon]` coordinate pairs.
//!
//! Haversine queries index points on the unit sphere so the R-tree's
//! Euclidean ordering matches great-circle ordering. The planar metrics work
//! on raw coordinates in whatever unit the caller supplies.

use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::UtilsError;

/// Mean Earth radius used to scale haversine distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance metric for [`nn_search`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DistanceMetric {
    /// Great-circle distance in kilometres.
    #[default]
    Haversine,
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl DistanceMetric {
    /// Parses a metric name, mapping failures to [`UtilsError::UnknownMetric`].
    ///
    /// # Errors
    ///
    /// Returns [`UtilsError::UnknownMetric`] if `name` is not one of
    /// `haversine`, `euclidean`, `manhattan` or `chebyshev`.
    pub fn parse(name: &str) -> Result<Self, UtilsError> {
        name.parse().map_err(|_| UtilsError::UnknownMetric {
            name: name.to_string(),
        })
    }
}

/// Closest reference point for one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Distance in the metric's unit (km for haversine).
    pub distance: f64,
    /// Position of the neighbour in the reference slice.
    pub index: usize,
}

type Entry<const D: usize> = GeomWithData<[f64; D], usize>;

/// Finds, for every query pair, the nearest pair in `reference`.
///
/// Both slices hold `[lat, lon]` pairs in degrees. Results are returned in
/// query order.
///
/// # Errors
///
/// * [`UtilsError::EmptyReference`] if `reference` is empty
/// * [`UtilsError::InvalidCoordinate`] if any pair holds NaN or infinity
pub fn nn_search(
    reference: &[[f64; 2]],
    query: &[[f64; 2]],
    metric: DistanceMetric,
) -> Result<Vec<Neighbor>, UtilsError> {
    if reference.is_empty() {
        return Err(UtilsError::EmptyReference);
    }
    check_finite(reference)?;
    check_finite(query)?;

    log::debug!(
        "Nearest-neighbour search: {} queries against {} reference points ({metric})",
        query.len(),
        reference.len()
    );

    let neighbors = match metric {
        DistanceMetric::Haversine => haversine_search(reference, query),
        DistanceMetric::Euclidean => {
            let tree = planar_tree(reference);
            query
                .iter()
                .filter_map(|q| {
                    tree.nearest_neighbor(q).map(|entry| Neighbor {
                        distance: euclidean(entry.geom(), q),
                        index: entry.data,
                    })
                })
                .collect()
        }
        DistanceMetric::Manhattan => bounded_search(reference, query, manhattan, 1.0),
        DistanceMetric::Chebyshev => {
            bounded_search(reference, query, chebyshev, std::f64::consts::FRAC_1_SQRT_2)
        }
    };

    Ok(neighbors)
}

fn check_finite(points: &[[f64; 2]]) -> Result<(), UtilsError> {
    points
        .iter()
        .position(|p| !p[0].is_finite() || !p[1].is_finite())
        .map_or(Ok(()), |index| Err(UtilsError::InvalidCoordinate { index }))
}

fn haversine_search(reference: &[[f64; 2]], query: &[[f64; 2]]) -> Vec<Neighbor> {
    let entries: Vec<Entry<3>> = reference
        .iter()
        .enumerate()
        .map(|(i, p)| GeomWithData::new(to_unit_sphere(*p), i))
        .collect();
    let tree = RTree::bulk_load(entries);

    query
        .iter()
        .filter_map(|q| {
            let q = to_unit_sphere(*q);
            tree.nearest_neighbor(&q).map(|entry| {
                let chord = euclidean(entry.geom(), &q);
                Neighbor {
                    distance: chord_to_angle(chord) * EARTH_RADIUS_KM,
                    index: entry.data,
                }
            })
        })
        .collect()
}

/// Maps a `[lat, lon]` pair in degrees onto the unit sphere.
fn to_unit_sphere([lat, lon]: [f64; 2]) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Central angle subtended by a chord of the unit sphere.
fn chord_to_angle(chord: f64) -> f64 {
    2.0 * (chord / 2.0).clamp(0.0, 1.0).asin()
}

fn planar_tree(reference: &[[f64; 2]]) -> RTree<Entry<2>> {
    RTree::bulk_load(
        reference
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(*p, i))
            .collect(),
    )
}

/// Walks candidates in Euclidean order until `euclidean * bound_factor`
/// exceeds the best `metric` distance found so far.
///
/// `bound_factor` must satisfy `metric(a, b) >= euclidean(a, b) * bound_factor`
/// for every pair.
fn bounded_search(
    reference: &[[f64; 2]],
    query: &[[f64; 2]],
    metric: fn(&[f64; 2], &[f64; 2]) -> f64,
    bound_factor: f64,
) -> Vec<Neighbor> {
    let tree = planar_tree(reference);

    query
        .iter()
        .filter_map(|q| {
            let mut best: Option<Neighbor> = None;
            for entry in tree.nearest_neighbor_iter(q) {
                let lower_bound = euclidean(entry.geom(), q) * bound_factor;
                if best.is_some_and(|b| lower_bound > b.distance) {
                    break;
                }
                let distance = metric(entry.geom(), q);
                let better = best.is_none_or(|b| {
                    distance
                        .total_cmp(&b.distance)
                        .then(entry.data.cmp(&b.index))
                        .is_lt()
                });
                if better {
                    best = Some(Neighbor {
                        distance,
                        index: entry.data,
                    });
                }
            }
            best
        })
        .collect()
}

fn euclidean<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn manhattan(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).abs() + (a[1] - b[1]).abs()
}

fn chebyshev(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).abs().max((a[1] - b[1]).abs())
}
