//! Coordinate-order swapping for geometries read with lat/lon reversed.

use geo::{
    Coord, Geometry, GeometryCollection, HasDimensions, Line, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Point, Polygon,
};

use crate::UtilsError;

/// Swaps the `x` and `y` of every coordinate in `geom`.
///
/// Points, lines, line strings, and polygons (shell and holes) are swapped
/// directly; multi-geometries and geometry collections recurse into their
/// members. Empty geometries are returned unchanged.
///
/// # Errors
///
/// Returns [`UtilsError::UnrecognizedGeometry`] for `Rect` and `Triangle`,
/// whose shape is tied to axis order and cannot be swapped in place. A
/// collection containing one fails as a whole.
pub fn swap_xy(geom: &Geometry<f64>) -> Result<Geometry<f64>, UtilsError> {
    if geom.is_empty() {
        return Ok(geom.clone());
    }

    Ok(match geom {
        Geometry::Point(p) => Geometry::Point(swap_point(*p)),
        Geometry::Line(l) => Geometry::Line(Line::new(swap_coord(l.start), swap_coord(l.end))),
        Geometry::LineString(ls) => Geometry::LineString(swap_line_string(ls)),
        Geometry::Polygon(p) => Geometry::Polygon(swap_polygon(p)),
        Geometry::MultiPoint(mp) => {
            Geometry::MultiPoint(MultiPoint(mp.iter().copied().map(swap_point).collect()))
        }
        Geometry::MultiLineString(mls) => {
            Geometry::MultiLineString(MultiLineString(mls.iter().map(swap_line_string).collect()))
        }
        Geometry::MultiPolygon(mp) => {
            Geometry::MultiPolygon(MultiPolygon(mp.iter().map(swap_polygon).collect()))
        }
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.iter().map(swap_xy).collect::<Result<Vec<_>, _>>()?,
        )),
        Geometry::Rect(_) => return Err(UtilsError::UnrecognizedGeometry { kind: "Rect" }),
        Geometry::Triangle(_) => return Err(UtilsError::UnrecognizedGeometry { kind: "Triangle" }),
    })
}

const fn swap_coord(c: Coord<f64>) -> Coord<f64> {
    Coord { x: c.y, y: c.x }
}

fn swap_point(p: Point<f64>) -> Point<f64> {
    Point(swap_coord(p.0))
}

fn swap_line_string(ls: &LineString<f64>) -> LineString<f64> {
    LineString(ls.0.iter().copied().map(swap_coord).collect())
}

fn swap_polygon(p: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(
        swap_line_string(p.exterior()),
        p.interiors().iter().map(swap_line_string).collect(),
    )
}
