#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon and hexagon processing for urban analytics batches.
//!
//! Merges boundary downloads, narrows population points to a region,
//! tiles polygons into H3 hexagons, and aggregates point attributes onto
//! those hexagons through an R-tree backed spatial join. Every operation
//! takes its inputs by reference (or by value when it only drops rows)
//! and returns a fresh layer.

pub mod aggregate;
pub mod bounds;
pub mod hexagons;
pub mod index;
pub mod io;
pub mod merge;

pub use aggregate::{Aggregations, JoinedRow, merge_shape_hex, spatial_join};
pub use bounds::{BoundsSource, filter_population, remove_features};
pub use hexagons::gen_hexagons;
pub use merge::merge_geom_downloads;

use thiserror::Error;

/// Errors that can occur during geometry operations.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Resolution outside the range supported by H3.
    #[error("Invalid H3 resolution {resolution}: {source}")]
    InvalidResolution {
        /// Requested resolution.
        resolution: u8,
        #[source]
        source: h3o::error::InvalidResolution,
    },

    /// The H3 tiler rejected one of the exploded polygons.
    #[error("Polygon {index} rejected by the hexagon tiler: {source}")]
    Tiling {
        /// Position of the polygon in the exploded collection.
        index: usize,
        #[source]
        source: h3o::error::InvalidGeometry,
    },

    /// Aggregation names a reducer other than sum, min, or max.
    #[error("Unsupported aggregation '{reducer}' for column '{column}' (expected sum, min, or max)")]
    UnsupportedReducer {
        /// Point column the reducer was requested for.
        column: String,
        /// The rejected reducer name.
        reducer: String,
    },

    /// Aggregation names a column the point data does not have.
    #[error("Column '{column}' not found in point data")]
    UnknownColumn {
        /// The missing column.
        column: String,
    },

    /// File IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` parsing or conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Input data did not have the expected shape.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
