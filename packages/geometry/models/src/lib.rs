#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Layer types shared by the urbankit geometry pipeline.
//!
//! Defines the polygon collections produced by boundary downloads, the
//! point datasets filtered from population grids, and the hexagon layers
//! produced by tiling. Everything here is plain data; the operations live
//! in `urbankit_geometry`.

use std::collections::BTreeMap;

use geo::{BoundingRect, MultiPolygon, Point, Polygon, Rect};
use h3o::CellIndex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Identifier of the fixed geographic coordinate reference (WGS 84).
pub const WGS84: &str = "EPSG:4326";

/// Coordinate reference identifier attached to every layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs(String);

impl Crs {
    /// Creates a CRS tag from an authority string (e.g. `"EPSG:32718"`).
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    /// The geographic lon/lat reference used by all generated layers.
    #[must_use]
    pub fn wgs84() -> Self {
        Self(WGS84.to_string())
    }

    /// Returns the authority string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Axis-aligned bounding box in lon/lat degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum longitude.
    pub min_x: f64,
    /// Minimum latitude.
    pub min_y: f64,
    /// Maximum longitude.
    pub max_x: f64,
    /// Maximum latitude.
    pub max_y: f64,
}

impl Bounds {
    /// Creates bounds from `x`/`y` extents.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates bounds from a `(min_lat, max_lat, min_lon, max_lon)` box,
    /// the order used for removal boxes.
    #[must_use]
    pub const fn from_lat_lon(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self::new(min_lon, min_lat, max_lon, max_lat)
    }

    /// Converts a `geo` rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Inclusive containment test on both axes.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_x..=self.max_x).contains(&lon) && (self.min_y..=self.max_y).contains(&lat)
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }
}

/// An ordered set of (multi)polygon boundaries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonCollection {
    /// Boundary geometries; single polygons are stored as one-member
    /// multipolygons.
    pub geometries: Vec<MultiPolygon<f64>>,
    /// Coordinate reference of the geometries.
    pub crs: Crs,
}

impl PolygonCollection {
    /// Creates a WGS 84 collection.
    #[must_use]
    pub fn new(geometries: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            geometries,
            crs: Crs::wgs84(),
        }
    }

    /// Number of geometries (not constituent polygons).
    #[must_use]
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    /// Whether the collection holds no geometries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Minimum enclosing box over every geometry, `None` when there is
    /// nothing to bound.
    #[must_use]
    pub fn total_bounds(&self) -> Option<Bounds> {
        self.geometries
            .iter()
            .filter_map(|geometry| geometry.bounding_rect())
            .map(Bounds::from_rect)
            .reduce(|acc, b| acc.union(&b))
    }

    /// Every constituent single polygon, in collection order.
    #[must_use]
    pub fn explode(&self) -> Vec<Polygon<f64>> {
        self.geometries
            .iter()
            .flat_map(|mp| mp.0.iter().cloned())
            .collect()
    }
}

/// One sampled point and its attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// Row index in the source dataset, kept through filtering.
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Values aligned with the owning dataset's `columns`.
    pub values: Vec<Option<f64>>,
}

/// Tabular point data (e.g. an HDX population grid).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointDataset {
    /// Attribute column names, excluding latitude and longitude.
    pub columns: Vec<String>,
    pub rows: Vec<PointRecord>,
}

impl PointDataset {
    /// Creates an empty dataset with the given attribute columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, assigning the next source index.
    pub fn push(&mut self, latitude: f64, longitude: f64, values: Vec<Option<f64>>) {
        let index = self.rows.len();
        self.rows.push(PointRecord {
            index,
            latitude,
            longitude,
            values,
        });
    }

    /// Position of a column in each row's `values`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A point record with its derived geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub record: PointRecord,
    /// `(longitude, latitude)` point.
    pub geometry: Point<f64>,
}

/// Point dataset with one geometry per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointLayer {
    pub columns: Vec<String>,
    pub features: Vec<PointFeature>,
    pub crs: Crs,
}

impl PointLayer {
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// An H3 hexagon with its boundary and attached attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    pub id: CellIndex,
    /// Closed `(lon, lat)` boundary ring.
    pub geometry: Polygon<f64>,
    /// Attribute values; an absent key means no data for this cell.
    pub attributes: BTreeMap<String, f64>,
}

/// Centroid of an H3 hexagon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexCentroid {
    pub id: CellIndex,
    /// `(lon, lat)` centroid.
    pub geometry: Point<f64>,
}

/// Hexagon cells with unique identifiers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HexLayer {
    pub cells: Vec<HexCell>,
    pub crs: Crs,
}

impl HexLayer {
    /// Looks up a cell by identifier.
    #[must_use]
    pub fn get(&self, id: CellIndex) -> Option<&HexCell> {
        self.cells.iter().find(|c| c.id == id)
    }

    /// Cell identifiers in layer order.
    pub fn ids(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.cells.iter().map(|c| c.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Hexagon centroids, row-aligned with a [`HexLayer`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CentroidLayer {
    pub centroids: Vec<HexCentroid>,
    pub crs: Crs,
}

impl CentroidLayer {
    /// Centroid identifiers in layer order.
    pub fn ids(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.centroids.iter().map(|c| c.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}

/// Which unmatched rows a spatial join keeps, as in a relational join.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum JoinMode {
    /// Only matched pairs.
    #[default]
    Inner,
    /// Every point row, matched or not.
    Left,
    /// Every cell row, matched or not.
    Right,
}

/// Geometric relation deciding whether a point joins a cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SpatialPredicate {
    /// Point touches the cell, boundary included.
    #[default]
    Intersects,
    /// Cell contains the point in its interior.
    Contains,
    /// Point lies within the cell interior.
    Within,
}

/// Reduction applied to joined point values per cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Reducer {
    Sum,
    Min,
    Max,
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

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
    fn total_bounds_spans_all_geometries() {
        let collection = PolygonCollection::new(vec![square(0.0, 0.0, 1.0), square(5.0, -3.0, 2.0)]);
        let bounds = collection.total_bounds().unwrap();
        assert_eq!(bounds, Bounds::new(0.0, -3.0, 7.0, 1.0));
    }

    #[test]
    fn total_bounds_of_empty_collection_is_none() {
        assert!(PolygonCollection::default().total_bounds().is_none());
    }

    #[test]
    fn explode_flattens_multipolygons() {
        let mut mp = square(0.0, 0.0, 1.0);
        mp.0.extend(square(2.0, 2.0, 1.0).0);
        let collection = PolygonCollection::new(vec![mp, square(9.0, 9.0, 1.0)]);
        assert_eq!(collection.explode().len(), 3);
    }

    #[test]
    fn lat_lon_box_maps_to_axes() {
        let bounds = Bounds::from_lat_lon(-12.2, -12.0, -77.2, -77.17);
        assert!(bounds.contains(-77.18, -12.1));
        assert!(bounds.contains(-77.2, -12.2));
        assert!(!bounds.contains(-12.1, -77.18));
    }

    #[test]
    fn push_assigns_sequential_indices() {
        let mut ds = PointDataset::new(vec!["population".into()]);
        ds.push(1.0, 2.0, vec![Some(3.0)]);
        ds.push(4.0, 5.0, vec![None]);
        assert_eq!(ds.rows[1].index, 1);
        assert_eq!(ds.column_index("population"), Some(0));
        assert_eq!(ds.column_index("missing"), None);
    }

    #[test]
    fn enums_parse_snake_case_names() {
        assert_eq!("inner".parse::<JoinMode>().unwrap(), JoinMode::Inner);
        assert_eq!("Within".parse::<SpatialPredicate>().unwrap(), SpatialPredicate::Within);
        assert_eq!("max".parse::<Reducer>().unwrap(), Reducer::Max);
        assert!("mean".parse::<Reducer>().is_err());
        assert_eq!(Reducer::Sum.to_string(), "sum");
    }
}
