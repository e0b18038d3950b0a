//! File readers and writers for boundary, population, and hexagon layers.
//!
//! Boundaries are read from `GeoJSON` (as produced by Nominatim polygon
//! exports), population grids from HDX-style CSV files with `latitude` and
//! `longitude` columns, and hexagon layers are written back as `GeoJSON`
//! feature collections keyed by `hex_id`.

use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use urbankit_geometry_models::{CentroidLayer, HexLayer, PointDataset, PolygonCollection};

use crate::GeometryError;

/// Property name carrying the H3 cell key in written layers.
pub const HEX_ID_PROPERTY: &str = "hex_id";

/// Reads every Polygon and `MultiPolygon` geometry from a `GeoJSON` file.
///
/// Features with other geometry types (or none) are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid `GeoJSON`.
pub fn read_boundaries(path: &Path) -> Result<PolygonCollection, GeometryError> {
    let text = std::fs::read_to_string(path)?;
    let collection = parse_boundaries(&text)?;
    log::info!(
        "Loaded {} boundary geometries from {}",
        collection.len(),
        path.display()
    );
    Ok(collection)
}

/// Parses boundary geometries from a `GeoJSON` document.
///
/// # Errors
///
/// Returns [`GeometryError::GeoJson`] if `text` is not valid `GeoJSON`.
pub fn parse_boundaries(text: &str) -> Result<PolygonCollection, GeometryError> {
    let geometries = parse_areas(text, None)?
        .into_iter()
        .map(|area| area.geometry)
        .collect();
    Ok(PolygonCollection::new(geometries))
}

/// One boundary feature kept as its own area of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// Value of the requested id property, when the feature has one.
    pub id: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

/// Reads every Polygon and `MultiPolygon` feature of a `GeoJSON` file as a
/// separate [`Area`], in file order.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid `GeoJSON`.
pub fn read_areas(path: &Path, id_property: Option<&str>) -> Result<Vec<Area>, GeometryError> {
    let text = std::fs::read_to_string(path)?;
    let areas = parse_areas(&text, id_property)?;
    log::info!("Loaded {} areas from {}", areas.len(), path.display());
    Ok(areas)
}

/// Parses polygon features into areas. Non-polygon geometries are skipped
/// with a warning.
///
/// String and numeric values of `id_property` become the area id; other
/// values and missing properties leave it unset.
///
/// # Errors
///
/// Returns [`GeometryError::GeoJson`] if `text` is not valid `GeoJSON`.
pub fn parse_areas(text: &str, id_property: Option<&str>) -> Result<Vec<Area>, GeometryError> {
    let geojson: GeoJson = text.parse()?;
    let features: Vec<(Option<JsonObject>, geojson::Geometry)> = match geojson {
        GeoJson::FeatureCollection(fc) => fc
            .features
            .into_iter()
            .filter_map(|f| f.geometry.map(|g| (f.properties, g)))
            .collect(),
        GeoJson::Feature(feature) => feature
            .geometry
            .map(|g| (feature.properties, g))
            .into_iter()
            .collect(),
        GeoJson::Geometry(geometry) => vec![(None, geometry)],
    };

    let mut areas = Vec::with_capacity(features.len());
    for (i, (properties, geometry)) in features.into_iter().enumerate() {
        let Some(geometry) = to_multipolygon(geometry) else {
            log::warn!("Skipping non-polygon geometry at position {i}");
            continue;
        };
        let id = id_property
            .zip(properties.as_ref())
            .and_then(|(key, props)| match props.get(key)? {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            });
        areas.push(Area { id, geometry });
    }

    Ok(areas)
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Reads a population CSV into a [`PointDataset`].
///
/// `latitude` and `longitude` columns are required; every other column
/// becomes a numeric attribute column, with empty or non-numeric cells
/// stored as missing values. Rows with unparseable coordinates are skipped.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid CSV, or lacks
/// a coordinate column.
pub fn read_population_csv(path: &Path) -> Result<PointDataset, GeometryError> {
    let reader = csv::Reader::from_path(path)?;
    let dataset = parse_population(reader)?;
    log::info!("Loaded {} population points from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Parses population rows from any CSV reader.
///
/// # Errors
///
/// Returns an error if the CSV is malformed or lacks a coordinate column.
pub fn parse_population<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> Result<PointDataset, GeometryError> {
    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| GeometryError::Conversion {
                message: format!("population CSV has no '{name}' column"),
            })
    };
    let lat_col = find("latitude")?;
    let lon_col = find("longitude")?;

    let value_cols: Vec<usize> = (0..headers.len())
        .filter(|&i| i != lat_col && i != lon_col)
        .collect();
    let columns = value_cols
        .iter()
        .map(|&i| headers[i].trim().to_string())
        .collect();

    let mut dataset = PointDataset::new(columns);
    let mut skipped = 0_usize;

    for record in reader.records() {
        let record = record?;
        let coord = |i: usize| record.get(i).and_then(|s| s.trim().parse::<f64>().ok());
        let (Some(lat), Some(lon)) = (coord(lat_col), coord(lon_col)) else {
            skipped += 1;
            continue;
        };
        let values = value_cols.iter().map(|&i| coord(i)).collect();
        dataset.push(lat, lon, values);
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} population rows with invalid coordinates");
    }

    Ok(dataset)
}

/// Builds a feature collection of hexagon polygons with `hex_id` and
/// attribute properties.
#[must_use]
pub fn hexagons_to_geojson(layer: &HexLayer) -> FeatureCollection {
    let features = layer
        .cells
        .iter()
        .map(|cell| {
            let mut properties = JsonObject::new();
            properties.insert(HEX_ID_PROPERTY.into(), JsonValue::from(cell.id.to_string()));
            for (key, value) in &cell.attributes {
                properties.insert(key.clone(), JsonValue::from(*value));
            }
            feature(geojson::Value::from(&cell.geometry), properties)
        })
        .collect();

    collection(features)
}

/// Builds a feature collection of hexagon centroids keyed by `hex_id`.
#[must_use]
pub fn centroids_to_geojson(layer: &CentroidLayer) -> FeatureCollection {
    let features = layer
        .centroids
        .iter()
        .map(|centroid| {
            let mut properties = JsonObject::new();
            properties.insert(HEX_ID_PROPERTY.into(), JsonValue::from(centroid.id.to_string()));
            feature(geojson::Value::from(&centroid.geometry), properties)
        })
        .collect();

    collection(features)
}

/// Builds a feature collection of boundary geometries without properties.
#[must_use]
pub fn boundaries_to_geojson(boundaries: &PolygonCollection) -> FeatureCollection {
    let features = boundaries
        .geometries
        .iter()
        .map(|mp| feature(geojson::Value::from(mp), JsonObject::new()))
        .collect();

    collection(features)
}

/// Writes a feature collection to `path`.
///
/// # Errors
///
/// Returns [`GeometryError::Io`] if the file cannot be written.
pub fn write_geojson(path: &Path, features: &FeatureCollection) -> Result<(), GeometryError> {
    std::fs::write(path, features.to_string())?;
    log::info!("Wrote {} features to {}", features.features.len(), path.display());
    Ok(())
}

/// Wraps a geometry value and properties into a feature.
#[must_use]
pub fn feature(value: geojson::Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn parses_polygon_and_multipolygon_features() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "Lima"}, "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-77.1, -12.1], [-77.0, -12.1], [-77.0, -12.0], [-77.1, -12.1]]]
                }},
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[-77.2, -12.2], [-77.15, -12.2], [-77.15, -12.15], [-77.2, -12.2]]],
                        [[[-77.3, -12.3], [-77.25, -12.3], [-77.25, -12.25], [-77.3, -12.3]]]
                    ]
                }},
                {"type": "Feature", "properties": {}, "geometry": {
                    "type": "Point", "coordinates": [-77.0, -12.0]
                }}
            ]
        }"#;
        let collection = parse_boundaries(text).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.geometries[1].0.len(), 2);
        assert_eq!(collection.explode().len(), 3);
    }

    #[test]
    fn areas_keep_features_apart_with_their_ids() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "Lima"}, "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-77.1, -12.1], [-77.0, -12.1], [-77.0, -12.0], [-77.1, -12.1]]]
                }},
                {"type": "Feature", "properties": {"name": 7}, "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-77.1, -12.1], [-77.0, -12.1], [-77.0, -12.0], [-77.1, -12.1]]]
                }},
                {"type": "Feature", "properties": null, "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[-77.2, -12.2], [-77.15, -12.2], [-77.15, -12.15], [-77.2, -12.2]]],
                        [[[-77.3, -12.3], [-77.25, -12.3], [-77.25, -12.25], [-77.3, -12.3]]]
                    ]
                }}
            ]
        }"#;
        let areas = parse_areas(text, Some("name")).unwrap();
        assert_eq!(areas.len(), 3);
        assert_eq!(areas[0].id.as_deref(), Some("Lima"));
        assert_eq!(areas[1].id.as_deref(), Some("7"));
        assert_eq!(areas[2].id, None);
        assert_eq!(areas[2].geometry.0.len(), 2);

        assert!(parse_areas(text, None).unwrap().iter().all(|a| a.id.is_none()));
    }

    #[test]
    fn rejects_invalid_geojson() {
        assert!(matches!(
            parse_boundaries("{\"type\": \"Nope\"}"),
            Err(GeometryError::GeoJson(_))
        ));
    }

    #[test]
    fn parses_population_columns_and_missing_values() {
        let data = "latitude,longitude,population_2015,population_2020\n\
                    -12.519861,-76.774583,2.633668,2.644757\n\
                    -12.5,-76.7,,3.1\n\
                    bad,-76.7,1.0,1.0\n";
        let reader = csv::Reader::from_reader(data.as_bytes());
        let dataset = parse_population(reader).unwrap();

        assert_eq!(
            dataset.columns,
            vec!["population_2015".to_string(), "population_2020".to_string()]
        );
        assert_eq!(dataset.len(), 2);
        assert!((dataset.rows[0].longitude - -76.774_583).abs() < 1e-9);
        assert_eq!(dataset.rows[1].values, vec![None, Some(3.1)]);
    }

    #[test]
    fn population_without_coordinates_is_rejected() {
        let reader = csv::Reader::from_reader("lat,lon\n1,2\n".as_bytes());
        assert!(matches!(
            parse_population(reader),
            Err(GeometryError::Conversion { .. })
        ));
    }

    #[test]
    fn hexagon_features_carry_id_and_attributes() {
        let city = parse_boundaries(
            r#"{"type": "Polygon", "coordinates": [[[-77.05, -12.1], [-77.0, -12.1], [-77.0, -12.05], [-77.05, -12.05], [-77.05, -12.1]]]}"#,
        )
        .unwrap();
        let (mut hexes, centroids) = crate::gen_hexagons(8, &city).unwrap();
        hexes.cells[0].attributes = BTreeMap::from([("population_2020".to_string(), 12.5)]);

        let fc = hexagons_to_geojson(&hexes);
        assert_eq!(fc.features.len(), hexes.len());
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props[HEX_ID_PROPERTY], JsonValue::from(hexes.cells[0].id.to_string()));
        assert_eq!(props["population_2020"], JsonValue::from(12.5));

        let fc = centroids_to_geojson(&centroids);
        assert_eq!(fc.features.len(), centroids.len());
    }
}
