//! Histogram bins and labels for trip-duration columns (minutes).

use serde::Serialize;

/// Default bin edges in minutes.
pub const DEFAULT_EDGES: [i64; 7] = [0, 15, 30, 45, 60, 90, 120];

/// Default labels, one per interval plus the open-ended tail.
pub const DEFAULT_LABELS: [&str; 7] = [
    "De 0 a 15",
    "De 15 a 30",
    "De 30 a 45",
    "De 45 a 60",
    "De 60 a 90",
    "De 90 a 120",
    "Más de 120",
];

/// Bin edges and matching interval labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DurationBins {
    pub bins: Vec<i64>,
    pub labels: Vec<String>,
}

/// Chooses bin edges and labels that cover `durations` without empty
/// trailing intervals.
///
/// The edges are the defaults up to the first one at or above the rounded-up
/// maximum. When the maximum runs past the last default edge, it becomes the
/// closing edge of the "Más de 120" interval.
///
/// # Errors
///
/// * [`UtilsError::EmptyDurations`] if `durations` is empty
/// * [`UtilsError::NonFiniteDuration`] if any value is NaN or infinite
///
/// [`UtilsError::EmptyDurations`]: crate::UtilsError::EmptyDurations
/// [`UtilsError::NonFiniteDuration`]: crate::UtilsError::NonFiniteDuration
pub fn create_duration_labels(durations: &[f64]) -> Result<DurationBins, crate::UtilsError> {
    if durations.is_empty() {
        return Err(crate::UtilsError::EmptyDurations);
    }
    if durations.iter().any(|d| !d.is_finite()) {
        return Err(crate::UtilsError::NonFiniteDuration);
    }

    let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    #[allow(clippy::cast_possible_truncation)]
    let max = max.ceil() as i64;

    let mut candidates: Vec<i64> = DEFAULT_EDGES.to_vec();
    candidates.push(max);
    candidates.sort_unstable();
    candidates.dedup();
    let ix = candidates.iter().position(|&e| e == max).unwrap_or_default();

    let mut edges = DEFAULT_EDGES.to_vec();
    if ix + 1 >= DEFAULT_EDGES.len() && max != DEFAULT_EDGES[DEFAULT_EDGES.len() - 1] {
        edges.push(max);
    }

    let bins: Vec<i64> = edges.into_iter().take(ix + 1).collect();
    let labels = DEFAULT_LABELS
        .iter()
        .take(ix)
        .map(ToString::to_string)
        .collect();

    log::debug!("Duration max {max} min: bins {bins:?}");

    Ok(DurationBins { bins, labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UtilsError;

    #[test]
    fn short_trips_truncate_defaults() {
        let out = create_duration_labels(&[3.0, 12.5, 49.2]).unwrap();
        assert_eq!(out.bins, vec![0, 15, 30, 45, 60]);
        assert_eq!(
            out.labels,
            vec!["De 0 a 15", "De 15 a 30", "De 30 a 45", "De 45 a 60"]
        );
    }

    #[test]
    fn max_on_an_edge_stops_at_that_edge() {
        let out = create_duration_labels(&[10.0, 30.0]).unwrap();
        assert_eq!(out.bins, vec![0, 15, 30]);
        assert_eq!(out.labels.len(), 2);
    }

    #[test]
    fn max_of_120_uses_all_default_edges() {
        let out = create_duration_labels(&[119.2]).unwrap();
        assert_eq!(out.bins, DEFAULT_EDGES.to_vec());
        assert_eq!(out.labels.len(), 6);
        assert_eq!(out.labels[5], "De 90 a 120");
    }

    #[test]
    fn long_trips_extend_to_max() {
        let out = create_duration_labels(&[20.0, 149.3]).unwrap();
        assert_eq!(out.bins, vec![0, 15, 30, 45, 60, 90, 120, 150]);
        assert_eq!(out.labels.len(), 7);
        assert_eq!(out.labels[6], "Más de 120");
    }

    #[test]
    fn bins_never_exceed_defaults_below_120() {
        for max in [0.5, 14.0, 33.3, 61.0, 95.0, 120.0] {
            let out = create_duration_labels(&[max]).unwrap();
            assert!(out.bins.len() <= 7, "{max}: {:?}", out.bins);
            assert_eq!(out.labels.len() + 1, out.bins.len());
        }
    }

    #[test]
    fn zero_max_gives_single_edge() {
        let out = create_duration_labels(&[0.0, 0.0]).unwrap();
        assert_eq!(out.bins, vec![0]);
        assert!(out.labels.is_empty());
    }

    #[test]
    fn rejects_empty_and_non_finite() {
        assert!(matches!(
            create_duration_labels(&[]),
            Err(UtilsError::EmptyDurations)
        ));
        assert!(matches!(
            create_duration_labels(&[1.0, f64::NAN]),
            Err(UtilsError::NonFiniteDuration)
        ));
    }
}
