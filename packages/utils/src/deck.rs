//! Outer-ring normalisation of `GeoJSON` polygons for deck-style map
//! renderers, which expect every polygon as a single list of positions.

use geojson::{FeatureCollection, Value};

use crate::UtilsError;

/// Rewrites every feature's polygon coordinates to `[[outer ring]]`.
///
/// Holes are discarded. Feature properties, ids and foreign members are
/// left untouched.
///
/// # Errors
///
/// Returns [`UtilsError::UnsupportedFeature`] for the first feature whose
/// geometry is missing or is not a `Polygon`.
pub fn tuples_to_lists(mut collection: FeatureCollection) -> Result<FeatureCollection, UtilsError> {
    for (index, feature) in collection.features.iter_mut().enumerate() {
        let Some(geometry) = feature.geometry.as_mut() else {
            return Err(UtilsError::UnsupportedFeature {
                index,
                kind: "null".to_string(),
            });
        };

        match &mut geometry.value {
            Value::Polygon(rings) => rings.truncate(1),
            other => {
                return Err(UtilsError::UnsupportedFeature {
                    index,
                    kind: value_kind(other).to_string(),
                });
            }
        }
    }

    Ok(collection)
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
