//! Bounding-box narrowing of point datasets.
//!
//! Population grids cover whole countries; these helpers cut them down
//! to the study area before any spatial join runs.

use geo::Point;
use urbankit_geometry_models::{Bounds, Crs, PointDataset, PointFeature, PointLayer, PolygonCollection};

/// Where the filtering box comes from.
#[derive(Debug, Clone, Copy)]
pub enum BoundsSource<'a> {
    /// Total bounds of a reference polygon collection.
    Polygons(&'a PolygonCollection),
    /// An explicit box.
    Explicit(Bounds),
}

impl BoundsSource<'_> {
    fn resolve(self) -> Option<Bounds> {
        match self {
            Self::Polygons(collection) => collection.total_bounds(),
            Self::Explicit(bounds) => Some(bounds),
        }
    }
}

/// Keeps the rows of `points` whose coordinates fall inside the box of
/// `source` (inclusive on every edge) and attaches a `(lon, lat)` point
/// geometry to each.
///
/// Row order is preserved. An empty reference collection has no bounds
/// and yields an empty layer.
#[must_use]
pub fn filter_population(points: &PointDataset, source: BoundsSource<'_>) -> PointLayer {
    let Some(bounds) = source.resolve() else {
        log::warn!("Reference polygons have no bounds; no points kept");
        return PointLayer {
            columns: points.columns.clone(),
            features: Vec::new(),
            crs: Crs::wgs84(),
        };
    };

    let features: Vec<PointFeature> = points
        .rows
        .iter()
        .filter(|row| bounds.contains(row.longitude, row.latitude))
        .map(|row| PointFeature {
            record: row.clone(),
            geometry: Point::new(row.longitude, row.latitude),
        })
        .collect();

    log::info!(
        "Kept {} of {} points inside [{}, {}, {}, {}]",
        features.len(),
        points.len(),
        bounds.min_x,
        bounds.min_y,
        bounds.max_x,
        bounds.max_y
    );

    PointLayer {
        columns: points.columns.clone(),
        features,
        crs: Crs::wgs84(),
    }
}

/// Drops the features lying inside `bounds` (inclusive), e.g. an island
/// the boundary download included by mistake.
#[must_use]
pub fn remove_features(mut layer: PointLayer, bounds: Bounds) -> PointLayer {
    let before = layer.len();
    layer
        .features
        .retain(|f| !bounds.contains(f.record.longitude, f.record.latitude));
    log::debug!("Removed {} features", before - layer.len());
    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};

    fn dataset(coords: &[(f64, f64)]) -> PointDataset {
        let mut ds = PointDataset::new(vec!["population".into()]);
        for (i, &(lat, lon)) in coords.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            ds.push(lat, lon, vec![Some(i as f64)]);
        }
        ds
    }

    fn lima_box() -> PolygonCollection {
        PolygonCollection::new(vec![MultiPolygon(vec![polygon![
            (x: -77.2, y: -12.5),
            (x: -76.6, y: -12.5),
            (x: -76.6, y: -11.6),
            (x: -77.2, y: -11.6),
            (x: -77.2, y: -12.5),
        ]])])
    }

    #[test]
    fn keeps_only_points_inside_polygon_bounds() {
        let ds = dataset(&[
            (-12.0, -77.0),
            (-13.0, -77.0),
            (-12.5, -76.6),
            (-12.0, -78.0),
            (-11.7, -76.7),
        ]);
        let layer = filter_population(&ds, BoundsSource::Polygons(&lima_box()));
        let kept: Vec<usize> = layer.features.iter().map(|f| f.record.index).collect();
        assert_eq!(kept, vec![0, 2, 4]);

        let bounds = lima_box().total_bounds().unwrap();
        for row in &ds.rows {
            let inside = bounds.contains(row.longitude, row.latitude);
            assert_eq!(inside, kept.contains(&row.index));
        }
    }

    #[test]
    fn attaches_lon_lat_geometry_in_wgs84() {
        let ds = dataset(&[(-12.0, -77.0)]);
        let layer = filter_population(&ds, BoundsSource::Polygons(&lima_box()));
        assert_eq!(layer.features[0].geometry, Point::new(-77.0, -12.0));
        assert_eq!(layer.crs, Crs::wgs84());
    }

    #[test]
    fn explicit_box_uses_lat_lon_order() {
        let ds = dataset(&[(-12.1, -77.18), (-12.1, -77.0)]);
        let layer = filter_population(
            &ds,
            BoundsSource::Explicit(Bounds::from_lat_lon(-12.2, -12.0, -77.2, -77.17)),
        );
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.features[0].record.index, 0);
    }

    #[test]
    fn empty_result_is_valid() {
        let ds = dataset(&[(50.0, 10.0)]);
        let layer = filter_population(&ds, BoundsSource::Polygons(&lima_box()));
        assert!(layer.is_empty());
        assert_eq!(layer.columns, vec!["population".to_string()]);

        let none = filter_population(&ds, BoundsSource::Polygons(&PolygonCollection::default()));
        assert!(none.is_empty());
    }

    #[test]
    fn removes_features_inside_box() {
        let ds = dataset(&[(-12.1, -77.18), (-12.0, -77.0), (-12.05, -77.19)]);
        let layer = filter_population(&ds, BoundsSource::Polygons(&lima_box()));
        let removed = remove_features(layer, Bounds::from_lat_lon(-12.2, -12.0, -77.2, -77.17));
        let kept: Vec<usize> = removed.features.iter().map(|f| f.record.index).collect();
        assert_eq!(kept, vec![1]);
    }
}
