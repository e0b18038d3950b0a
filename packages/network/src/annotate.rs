//! Failure-tolerant batch annotation of polygon rows with network
//! statistics.

use geo::GeodesicArea;
use urbankit_network_models::{AnnotationReport, AreaRow, RowFailure, StatsRequest};

use crate::overpass::NetworkProvider;
use crate::progress::ProgressCallback;
use crate::stats::{Stats, basic_stats, extended_stats};
use crate::NetworkError;

/// Downloads a street network for every row and writes the requested
/// statistics onto it.
///
/// A row whose network cannot be built or measured is logged, recorded as
/// a [`RowFailure`], and returned unchanged; the rest of the batch carries
/// on. Requested names that were not computed for a row (for instance a
/// gated extended statistic whose switch is off) are skipped.
pub fn annotate_networks(
    rows: Vec<AreaRow>,
    provider: &dyn NetworkProvider,
    request: &StatsRequest,
    progress: &dyn ProgressCallback,
) -> AnnotationReport {
    progress.set_total(rows.len() as u64);

    let mut failures = Vec::new();
    let mut annotated = Vec::with_capacity(rows.len());

    for mut row in rows {
        progress.set_message(format!("network {}", row.id));
        match row_stats(&row, provider, request) {
            Ok(stats) => {
                log::debug!("Row {}: wrote {} statistics", row.id, stats.len());
                row.columns.extend(stats);
            }
            Err(e) => {
                log::warn!("Row {}: street network failed: {e}", row.id);
                failures.push(RowFailure {
                    row_id: row.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
        annotated.push(row);
        progress.inc(1);
    }

    log::info!(
        "Annotated {} of {} rows with {} network statistics ({} failed)",
        annotated.len() - failures.len(),
        annotated.len(),
        request.network_type,
        failures.len()
    );
    progress.finish(format!("{} rows annotated", annotated.len() - failures.len()));

    AnnotationReport {
        rows: annotated,
        failures,
    }
}

/// Computes and selects the requested statistics for one row.
fn row_stats(
    row: &AreaRow,
    provider: &dyn NetworkProvider,
    request: &StatsRequest,
) -> Result<Stats, NetworkError> {
    let graph = provider.street_graph(&row.geometry, request.network_type)?;
    let mut selected = Stats::new();

    if !request.basic.is_empty() {
        let area = row.geometry.geodesic_area_unsigned();
        select(&mut selected, basic_stats(&graph, Some(area)), &request.basic, &row.id);
    }
    if !request.extended.is_empty() {
        let extended = extended_stats(&graph, request.options);
        select(&mut selected, extended, &request.extended, &row.id);
    }

    Ok(selected)
}

fn select(into: &mut Stats, mut computed: Stats, names: &[String], row_id: &str) {
    for name in names {
        match computed.remove(name) {
            Some(value) => {
                into.insert(name.clone(), value);
            }
            None => log::debug!("Row {row_id}: statistic '{name}' not available"),
        }
    }
}
