//! In-memory R-tree over hexagon cells for point lookups.
//!
//! Built once per join from a [`HexLayer`]; candidate cells are found by
//! envelope and then confirmed with the exact predicate.

use geo::{BoundingRect, Contains, Intersects, Point, Polygon};
use rstar::{AABB, RTree, RTreeObject};
use urbankit_geometry_models::{HexLayer, SpatialPredicate};

/// A hexagon stored in the R-tree with its position in the layer.
struct CellEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-hexagon index over a borrowed [`HexLayer`].
pub struct HexIndex<'a> {
    layer: &'a HexLayer,
    tree: RTree<CellEntry>,
}

impl<'a> HexIndex<'a> {
    /// Bulk-loads the envelopes of every cell in `layer`.
    #[must_use]
    pub fn build(layer: &'a HexLayer) -> Self {
        let entries = layer
            .cells
            .iter()
            .enumerate()
            .map(|(position, cell)| CellEntry {
                position,
                envelope: compute_envelope(&cell.geometry),
            })
            .collect();

        Self {
            layer,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Layer positions of every cell related to `point` under `predicate`,
    /// in ascending order.
    #[must_use]
    pub fn lookup(&self, point: &Point<f64>, predicate: SpatialPredicate) -> Vec<usize> {
        let query_env = AABB::from_point([point.x(), point.y()]);
        let mut matches: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| {
                matches_predicate(&self.layer.cells[entry.position].geometry, point, predicate)
            })
            .map(|entry| entry.position)
            .collect();
        matches.sort_unstable();
        matches
    }
}

/// Exact predicate test between a hexagon and a point.
fn matches_predicate(cell: &Polygon<f64>, point: &Point<f64>, predicate: SpatialPredicate) -> bool {
    match predicate {
        SpatialPredicate::Intersects => point.intersects(cell),
        SpatialPredicate::Contains | SpatialPredicate::Within => cell.contains(point),
    }
}

/// Compute the bounding box envelope for a hexagon.
fn compute_envelope(polygon: &Polygon<f64>) -> AABB<[f64; 2]> {
    polygon.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
