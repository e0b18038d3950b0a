//! Conversion of boundary polygons into H3 hexagon layers.

use std::collections::{BTreeMap, BTreeSet};

use geo::{Coord, LineString, Point, Polygon};
use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, LatLng, Resolution};
use urbankit_geometry_models::{CentroidLayer, Crs, HexCell, HexCentroid, HexLayer, PolygonCollection};

use crate::GeometryError;

/// Tiles every polygon of `city` with H3 cells at `resolution` and returns
/// the cell boundaries and centroids.
///
/// Multipolygons are exploded first and each part is polyfilled
/// independently (a cell belongs to a part when its centroid lies inside
/// it). Cells covered by several overlapping parts appear once. The two
/// returned layers are row aligned and share identifiers.
///
/// A part smaller than a cell at `resolution` contributes no cells.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidResolution`] if `resolution` is outside
/// `0..=15`, or [`GeometryError::Tiling`] if `h3o` rejects a polygon
/// (e.g. non-finite coordinates).
pub fn gen_hexagons(
    resolution: u8,
    city: &PolygonCollection,
) -> Result<(HexLayer, CentroidLayer), GeometryError> {
    let res = Resolution::try_from(resolution)
        .map_err(|source| GeometryError::InvalidResolution { resolution, source })?;

    let parts = city.explode();
    let mut seen = BTreeSet::new();
    let mut cells = Vec::new();
    let mut centroids = Vec::new();

    for (index, polygon) in parts.into_iter().enumerate() {
        let covering = polyfill(polygon, res).map_err(|source| GeometryError::Tiling { index, source })?;
        log::debug!("Polygon {index}: {} cells at resolution {resolution}", covering.len());

        for cell in covering {
            if !seen.insert(cell) {
                continue;
            }
            centroids.push(HexCentroid {
                id: cell,
                geometry: cell_centroid(cell),
            });
            cells.push(HexCell {
                id: cell,
                geometry: cell_polygon(cell),
                attributes: BTreeMap::new(),
            });
        }
    }

    log::info!(
        "Generated {} hexagons at resolution {resolution} from {} polygons",
        cells.len(),
        city.geometries.len()
    );

    Ok((
        HexLayer {
            cells,
            crs: Crs::wgs84(),
        },
        CentroidLayer {
            centroids,
            crs: Crs::wgs84(),
        },
    ))
}

/// Cells whose centroid falls inside `polygon`.
fn polyfill(
    polygon: Polygon<f64>,
    resolution: Resolution,
) -> Result<Vec<CellIndex>, h3o::error::InvalidGeometry> {
    let mut tiler = TilerBuilder::new(resolution)
        .containment_mode(ContainmentMode::ContainsCentroid)
        .build();
    tiler.add(polygon)?;
    Ok(tiler.into_coverage().collect())
}

/// Cell centroid as a `(lon, lat)` point.
fn cell_centroid(cell: CellIndex) -> Point<f64> {
    let center = LatLng::from(cell);
    Point::new(center.lng(), center.lat())
}

/// Cell boundary with `h3o`'s lat/lng vertices reordered to `(lon, lat)`.
fn cell_polygon(cell: CellIndex) -> Polygon<f64> {
    let ring: Vec<Coord<f64>> = cell
        .boundary()
        .iter()
        .map(|vertex| Coord {
            x: vertex.lng(),
            y: vertex.lat(),
        })
        .collect();
    Polygon::new(LineString::new(ring), Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, MultiPolygon, polygon};

    fn lima_square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: -77.05, y: -12.10),
            (x: -77.00, y: -12.10),
            (x: -77.00, y: -12.05),
            (x: -77.05, y: -12.05),
            (x: -77.05, y: -12.10),
        ]])
    }

    fn shifted_square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: -77.03, y: -12.10),
            (x: -76.98, y: -12.10),
            (x: -76.98, y: -12.05),
            (x: -77.03, y: -12.05),
            (x: -77.03, y: -12.10),
        ]])
    }

    #[test]
    fn cells_and_centroids_share_identifiers() {
        let city = PolygonCollection::new(vec![lima_square()]);
        let (hexes, centroids) = gen_hexagons(8, &city).unwrap();

        assert!(!hexes.is_empty());
        assert_eq!(hexes.len(), centroids.len());
        let cell_ids: Vec<CellIndex> = hexes.ids().collect();
        let centroid_ids: Vec<CellIndex> = centroids.ids().collect();
        assert_eq!(cell_ids, centroid_ids);
        assert_eq!(hexes.crs, Crs::wgs84());
        assert_eq!(centroids.crs, Crs::wgs84());
    }

    #[test]
    fn overlapping_polygons_do_not_duplicate_cells() {
        let city = PolygonCollection::new(vec![lima_square(), shifted_square()]);
        let (hexes, centroids) = gen_hexagons(8, &city).unwrap();

        let unique: BTreeSet<CellIndex> = hexes.ids().collect();
        assert_eq!(unique.len(), hexes.len());
        assert_eq!(centroids.len(), hexes.len());

        let (left, _) = gen_hexagons(8, &PolygonCollection::new(vec![lima_square()])).unwrap();
        assert!(hexes.len() > left.len());
    }

    #[test]
    fn tiling_is_repeatable() {
        let city = PolygonCollection::new(vec![lima_square(), shifted_square()]);
        let (a, _) = gen_hexagons(9, &city).unwrap();
        let (b, _) = gen_hexagons(9, &city).unwrap();
        let a_ids: BTreeSet<CellIndex> = a.ids().collect();
        let b_ids: BTreeSet<CellIndex> = b.ids().collect();
        assert_eq!(a_ids, b_ids);
    }

    #[test]
    fn geometry_is_lon_lat_and_centroid_inside_source() {
        let square = lima_square();
        let city = PolygonCollection::new(vec![square.clone()]);
        let (hexes, centroids) = gen_hexagons(8, &city).unwrap();

        for (cell, centroid) in hexes.cells.iter().zip(&centroids.centroids) {
            assert!(cell.geometry.exterior().0.len() >= 6);
            assert!(cell.geometry.contains(&centroid.geometry));
            assert!(square.contains(&centroid.geometry));
            assert!(centroid.geometry.x() < -76.9 && centroid.geometry.y() > -12.2);
            assert!(cell.attributes.is_empty());
        }
    }

    #[test]
    fn polygon_smaller_than_a_cell_yields_no_cells() {
        let tiny = MultiPolygon(vec![polygon![
            (x: -77.030_000, y: -12.070_000),
            (x: -77.029_999, y: -12.070_000),
            (x: -77.029_999, y: -12.069_999),
            (x: -77.030_000, y: -12.069_999),
            (x: -77.030_000, y: -12.070_000),
        ]]);
        let (hexes, centroids) = gen_hexagons(5, &PolygonCollection::new(vec![tiny])).unwrap();
        assert!(hexes.is_empty());
        assert!(centroids.is_empty());
    }

    #[test]
    fn rejects_out_of_range_resolution() {
        let city = PolygonCollection::new(vec![lima_square()]);
        assert!(matches!(
            gen_hexagons(16, &city),
            Err(GeometryError::InvalidResolution { resolution: 16, .. })
        ));
    }
}
