//! Combines several boundary downloads into a single study area.

use geo::{MultiPolygon, Polygon};
use urbankit_geometry_models::PolygonCollection;

/// Concatenates every geometry of `collections` and unions them into one
/// multipolygon (e.g. Lima + Callao into a single metropolitan boundary).
///
/// The result always holds exactly one geometry; it is an empty
/// multipolygon when there was nothing to merge.
#[must_use]
pub fn merge_geom_downloads(collections: &[PolygonCollection]) -> PolygonCollection {
    let polygons: Vec<Polygon<f64>> = collections
        .iter()
        .flat_map(PolygonCollection::explode)
        .collect();

    let merged = if polygons.is_empty() {
        MultiPolygon(Vec::new())
    } else {
        geo::unary_union(polygons.iter())
    };

    log::debug!(
        "Merged {} polygons from {} collections into {} parts",
        polygons.len(),
        collections.len(),
        merged.0.len()
    );

    PolygonCollection::new(vec![merged])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, polygon};

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    #[test]
    fn overlapping_boundaries_become_one_part() {
        let a = PolygonCollection::new(vec![square(0.0, 0.0, 2.0)]);
        let b = PolygonCollection::new(vec![square(1.0, 0.0, 2.0)]);
        let merged = merge_geom_downloads(&[a, b]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.geometries[0].0.len(), 1);
        assert!((merged.geometries[0].unsigned_area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_boundaries_keep_separate_parts() {
        let a = PolygonCollection::new(vec![square(0.0, 0.0, 1.0)]);
        let b = PolygonCollection::new(vec![square(5.0, 5.0, 1.0)]);
        let merged = merge_geom_downloads(&[a, b]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.geometries[0].0.len(), 2);
    }

    #[test]
    fn nothing_to_merge_gives_empty_geometry() {
        let merged = merge_geom_downloads(&[]);
        assert_eq!(merged.len(), 1);
        assert!(merged.geometries[0].0.is_empty());
    }
}
