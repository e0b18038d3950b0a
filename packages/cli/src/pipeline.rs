//! Subcommand runners chaining the library crates.
//!
//! Each runner reads its inputs, drives the stages in order, and writes
//! `GeoJSON` outputs. Stage progress goes through `indicatif` bars that
//! share the log bridge's [`MultiProgress`].

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;

use geojson::{FeatureCollection, JsonObject};
use indicatif::MultiProgress;
use urbankit_geometry::io::{
    Area, boundaries_to_geojson, centroids_to_geojson, feature, hexagons_to_geojson, read_areas,
    read_boundaries, read_population_csv, write_geojson,
};
use urbankit_geometry::{
    Aggregations, BoundsSource, filter_population, gen_hexagons, merge_geom_downloads,
    merge_shape_hex, remove_features,
};
use urbankit_geometry_models::PolygonCollection;
use urbankit_network::{OverpassProvider, annotate_networks};
use urbankit_network_models::{AnnotationReport, AreaRow};
use urbankit_utils::create_duration_labels;

use crate::config::PipelineConfig;
use crate::progress::IndicatifProgress;

/// Property holding the row identifier in network output.
const ROW_ID_PROPERTY: &str = "row_id";
/// Property holding the failure reason of a row that was not annotated.
const ERROR_PROPERTY: &str = "network_error";

/// Reads and merges boundary downloads.
///
/// # Errors
///
/// Returns an error if any file cannot be read as `GeoJSON`.
pub fn load_boundary(paths: &[PathBuf]) -> Result<PolygonCollection, Box<dyn Error>> {
    let downloads = paths
        .iter()
        .map(|path| read_boundaries(path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merge_geom_downloads(&downloads))
}

/// Reads every boundary feature as its own row, in file order.
///
/// # Errors
///
/// Returns an error if any file cannot be read as `GeoJSON`.
pub fn load_area_rows(paths: &[PathBuf], id_property: &str) -> Result<Vec<AreaRow>, Box<dyn Error>> {
    let mut areas = Vec::new();
    for path in paths {
        areas.extend(read_areas(path, Some(id_property))?);
    }
    Ok(area_rows(areas))
}

/// Turns areas into rows. Areas without an id, or whose id is already
/// taken, are named by their position.
#[must_use]
pub fn area_rows(areas: Vec<Area>) -> Vec<AreaRow> {
    let mut seen = BTreeSet::new();
    areas
        .into_iter()
        .enumerate()
        .map(|(position, area)| {
            let mut id = area.id.unwrap_or_else(|| position.to_string());
            if seen.contains(&id) {
                log::warn!("Duplicate area id '{id}' at position {position}");
                id = position.to_string();
            }
            while !seen.insert(id.clone()) {
                id.push('\'');
            }
            AreaRow::new(id, area.geometry)
        })
        .collect()
}

/// `urbankit merge`: concatenates boundary files into one.
///
/// # Errors
///
/// Returns an error if an input cannot be read or the output cannot be
/// written.
pub fn run_merge(inputs: &[PathBuf], output: &Path) -> Result<(), Box<dyn Error>> {
    let merged = load_boundary(inputs)?;
    write_geojson(output, &boundaries_to_geojson(&merged))?;
    Ok(())
}

/// `urbankit hexagons`: boundary, population filter, tiling, aggregation.
///
/// # Errors
///
/// Returns an error if the config lacks a `[hexagons]` table, an input
/// cannot be read, the resolution or an aggregation is invalid, or an
/// output cannot be written.
pub fn run_hexagons(config: &PipelineConfig, multi: &MultiProgress) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let hex_config = config.hexagons()?;
    let aggregations = Aggregations::parse(&hex_config.aggregate)?;

    let total_steps = if config.population.is_some() { 4 } else { 3 };
    let steps = IndicatifProgress::steps_bar(multi, "Hexagons", total_steps);

    steps.set_message("Merging boundaries".to_string());
    let boundary = load_boundary(&config.boundary.paths)?;
    steps.inc(1);

    steps.set_message(format!("Tiling at resolution {}", hex_config.resolution));
    let (mut hexes, centroids) = gen_hexagons(hex_config.resolution, &boundary)?;
    steps.inc(1);

    if let Some(population) = &config.population {
        steps.set_message("Aggregating population".to_string());
        let points = read_population_csv(&population.path)?;
        let mut layer = filter_population(&points, BoundsSource::Polygons(&boundary));
        for bounds in population.removal_boxes() {
            layer = remove_features(layer, bounds);
        }
        if aggregations.is_empty() {
            log::warn!("No [hexagons.aggregate] columns; hexagons keep no attributes");
        } else {
            hexes = merge_shape_hex(
                &hexes,
                &layer,
                hex_config.join,
                hex_config.predicate,
                &aggregations,
            )?;
        }
        steps.inc(1);
    }

    steps.set_message("Writing".to_string());
    write_geojson(&hex_config.output, &hexagons_to_geojson(&hexes))?;
    if let Some(path) = &hex_config.centroids {
        write_geojson(path, &centroids_to_geojson(&centroids))?;
    }
    steps.inc(1);

    steps.finish(format!("{} hexagons", hexes.len()));
    log::info!("Hexagon pipeline complete in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// `urbankit network`: one row per boundary feature, annotated with
/// street-network statistics from Overpass.
///
/// # Errors
///
/// Returns an error if the config lacks a `[network]` table, the boundary
/// cannot be read, the HTTP client cannot be built, or the output cannot
/// be written. Per-row download failures are logged and kept in the output.
pub fn run_network(config: &PipelineConfig, multi: &MultiProgress) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let network_config = config.network()?;
    let rows = load_area_rows(&config.boundary.paths, &network_config.id_property)?;

    let provider = OverpassProvider::new(config.overpass.clone())?;
    let progress = IndicatifProgress::batch_bar(multi, "Street networks");
    let report = annotate_networks(rows, &provider, &network_config.request(), progress.as_ref());

    for failure in &report.failures {
        log::warn!("Row {} not annotated: {}", failure.row_id, failure.reason);
    }

    write_geojson(&network_config.output, &network_features(&report)?)?;
    log::info!("Network pipeline complete in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Converts annotated rows to features whose properties are the row id,
/// the statistics, and the failure reason for rows that failed.
///
/// # Errors
///
/// Returns an error if a statistic cannot be represented as JSON.
pub fn network_features(report: &AnnotationReport) -> Result<FeatureCollection, serde_json::Error> {
    let failures: BTreeMap<&str, &str> = report
        .failures
        .iter()
        .map(|f| (f.row_id.as_str(), f.reason.as_str()))
        .collect();

    let features = report
        .rows
        .iter()
        .map(|row| {
            let mut properties = JsonObject::new();
            properties.insert(ROW_ID_PROPERTY.to_string(), row.id.clone().into());
            for (name, value) in &row.columns {
                properties.insert(name.clone(), serde_json::to_value(value)?);
            }
            if let Some(reason) = failures.get(row.id.as_str()) {
                properties.insert(ERROR_PROPERTY.to_string(), (*reason).into());
            }
            Ok(feature(geojson::Value::from(&row.geometry), properties))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// `urbankit durations`: prints bins and labels for a CSV column as JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the column is missing or
/// not numeric, or the column has no values.
pub fn run_durations(path: &Path, column: &str) -> Result<(), Box<dyn Error>> {
    let file = std::fs::File::open(path)?;
    let durations = read_duration_column(file, column)?;
    log::debug!("Read {} durations from {}", durations.len(), path.display());
    let bins = create_duration_labels(&durations)?;
    println!("{}", serde_json::to_string_pretty(&bins)?);
    Ok(())
}

/// Reads one numeric column from CSV. Blank cells are skipped.
///
/// # Errors
///
/// Returns an error if the CSV is malformed, the column is absent, or a
/// cell is not a number.
pub fn read_duration_column<R: std::io::Read>(
    reader: R,
    column: &str,
) -> Result<Vec<f64>, Box<dyn Error>> {
    let mut csv = csv::Reader::from_reader(reader);
    let position = csv
        .headers()?
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| format!("Column '{column}' not found"))?;

    let mut values = Vec::new();
    for (line, record) in csv.records().enumerate() {
        let record = record?;
        let Some(cell) = record.get(position).map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };
        let value = cell
            .parse::<f64>()
            .map_err(|e| format!("Row {}: invalid duration '{cell}': {e}", line + 1))?;
        values.push(value);
    }
    Ok(values)
}
