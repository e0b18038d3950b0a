#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Small helpers used throughout the urbankit pipeline.
//!
//! Coordinate-order swapping, nearest-neighbour search over lat/lon
//! points, `GeoJSON` outer-ring normalisation for map renderers, shell
//! extraction from lat/lon records, and trip-duration histogram bins.

pub mod deck;
pub mod durations;
pub mod nearest;
pub mod shell;
pub mod swap;

pub use deck::tuples_to_lists;
pub use durations::{DurationBins, create_duration_labels};
pub use nearest::{DistanceMetric, EARTH_RADIUS_KM, Neighbor, nn_search};
pub use shell::{LatLon, shell_from_geometry};
pub use swap::swap_xy;

use thiserror::Error;

/// Errors that can occur in the utility helpers.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// Geometry kind the coordinate swap does not handle.
    #[error("Type '{kind}' not recognized")]
    UnrecognizedGeometry {
        /// Name of the rejected geometry kind.
        kind: &'static str,
    },

    /// Distance metric name that is not supported.
    #[error("Unknown distance metric '{name}'")]
    UnknownMetric {
        /// The rejected metric name.
        name: String,
    },

    /// Nearest-neighbour search was given no reference points.
    #[error("Nearest-neighbour search needs at least one reference point")]
    EmptyReference,

    /// A coordinate pair contained NaN or infinity.
    #[error("Non-finite coordinate at position {index}")]
    InvalidCoordinate {
        /// Position of the pair in its input slice.
        index: usize,
    },

    /// A feature could not be normalised.
    #[error("Feature {index} has unsupported geometry '{kind}'")]
    UnsupportedFeature {
        /// Position of the feature in the collection.
        index: usize,
        /// Geometry type found (or `"null"`).
        kind: String,
    },

    /// Duration binning was given no values.
    #[error("Duration series is empty")]
    EmptyDurations,

    /// Duration binning was given NaN or infinity.
    #[error("Duration series contains a non-finite value")]
    NonFiniteDuration,
}
