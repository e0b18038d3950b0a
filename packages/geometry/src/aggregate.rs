//! Spatial join of point layers onto hexagons and per-cell aggregation.
//!
//! The join pairs point rows with hexagon rows under a
//! [`SpatialPredicate`]; aggregation groups the matched pairs by cell
//! identifier and writes the reduced values into a copy of the hexagon
//! layer. Write-back is keyed by cell id, never by row position.

use std::collections::BTreeMap;

use h3o::CellIndex;
use urbankit_geometry_models::{HexLayer, JoinMode, PointLayer, Reducer, SpatialPredicate};

use crate::GeometryError;
use crate::index::HexIndex;

/// One row of a spatial join: positions into the point and hexagon layers.
///
/// Either side is `None` for the unmatched rows kept by [`JoinMode::Left`]
/// and [`JoinMode::Right`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedRow {
    pub point: Option<usize>,
    pub cell: Option<usize>,
}

/// Validated mapping from point column name to reducer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregations(BTreeMap<String, Reducer>);

impl Aggregations {
    /// Parses `(column, reducer name)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnsupportedReducer`] for any reducer name
    /// other than `sum`, `min`, or `max`.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self, GeometryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (column, reducer) in pairs {
            let column = column.into();
            let name = reducer.as_ref();
            let parsed = name
                .parse::<Reducer>()
                .map_err(|_| GeometryError::UnsupportedReducer {
                    column: column.clone(),
                    reducer: name.to_string(),
                })?;
            map.insert(column, parsed);
        }
        Ok(Self(map))
    }

    /// Declared columns and their reducers, ordered by column name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Reducer)> {
        self.0.iter().map(|(column, reducer)| (column.as_str(), *reducer))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Reducer)> for Aggregations {
    fn from_iter<T: IntoIterator<Item = (String, Reducer)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Joins `points` to `hexes` under `predicate`.
///
/// Produces one row per matched `(point, cell)` pair in point order. A
/// point matching several cells (possible only with
/// [`SpatialPredicate::Intersects`] on a shared edge) yields one row per
/// cell. `how` decides which unmatched rows are appended.
#[must_use]
pub fn spatial_join(
    points: &PointLayer,
    hexes: &HexLayer,
    how: JoinMode,
    predicate: SpatialPredicate,
) -> Vec<JoinedRow> {
    let index = HexIndex::build(hexes);
    let mut rows = Vec::new();
    let mut cell_matched = vec![false; hexes.len()];

    for (point_pos, feature) in points.features.iter().enumerate() {
        let cells = index.lookup(&feature.geometry, predicate);
        if cells.is_empty() {
            if how == JoinMode::Left {
                rows.push(JoinedRow {
                    point: Some(point_pos),
                    cell: None,
                });
            }
            continue;
        }
        for cell_pos in cells {
            cell_matched[cell_pos] = true;
            rows.push(JoinedRow {
                point: Some(point_pos),
                cell: Some(cell_pos),
            });
        }
    }

    if how == JoinMode::Right {
        rows.extend(
            cell_matched
                .iter()
                .enumerate()
                .filter(|&(_, matched)| !matched)
                .map(|(cell_pos, _)| JoinedRow {
                    point: None,
                    cell: Some(cell_pos),
                }),
        );
    }

    rows
}

/// Aggregates point attributes onto the hexagons they join.
///
/// Returns a copy of `hexes` where every cell with at least one matched
/// point receives the reduced value of each declared column. Cells with
/// no match keep those columns as they were (absent for a fresh layer).
/// Missing point values are skipped; a cell whose matched points are all
/// missing a column is left unset for that column. The hexagon row set and
/// geometry are never changed, whatever `how` is.
///
/// # Errors
///
/// Returns [`GeometryError::UnknownColumn`] if an aggregation names a
/// column that `points` does not have.
pub fn merge_shape_hex(
    hexes: &HexLayer,
    points: &PointLayer,
    how: JoinMode,
    predicate: SpatialPredicate,
    aggregations: &Aggregations,
) -> Result<HexLayer, GeometryError> {
    let columns = aggregations
        .iter()
        .map(|(column, reducer)| {
            points
                .column_index(column)
                .map(|position| (column, position, reducer))
                .ok_or_else(|| GeometryError::UnknownColumn {
                    column: column.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups: BTreeMap<CellIndex, Vec<usize>> = BTreeMap::new();
    for row in spatial_join(points, hexes, how, predicate) {
        if let (Some(point), Some(cell)) = (row.point, row.cell) {
            groups.entry(hexes.cells[cell].id).or_default().push(point);
        }
    }

    let mut reduced: BTreeMap<CellIndex, Vec<(&str, f64)>> = BTreeMap::new();
    for (cell, members) in &groups {
        let values = columns
            .iter()
            .filter_map(|&(column, position, reducer)| {
                let present = members
                    .iter()
                    .filter_map(|&p| points.features[p].record.values.get(position).copied().flatten());
                reduce(reducer, present).map(|value| (column, value))
            })
            .collect();
        reduced.insert(*cell, values);
    }

    let mut merged = hexes.clone();
    for cell in &mut merged.cells {
        if let Some(values) = reduced.get(&cell.id) {
            for &(column, value) in values {
                cell.attributes.insert(column.to_string(), value);
            }
        }
    }

    log::info!(
        "Aggregated {} columns onto {} of {} hexagons",
        columns.len(),
        reduced.len(),
        hexes.len()
    );

    Ok(merged)
}

/// Applies `reducer` to `values`, `None` when there are no values.
fn reduce(reducer: Reducer, values: impl Iterator<Item = f64>) -> Option<f64> {
    match reducer {
        Reducer::Sum => values.fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v)),
        Reducer::Min => values.reduce(f64::min),
        Reducer::Max => values.reduce(f64::max),
    }
}
