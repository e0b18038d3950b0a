#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Street-network statistics for polygon rows.
//!
//! For each [`AreaRow`](urbankit_network_models::AreaRow) a
//! [`NetworkProvider`] supplies a [`StreetGraph`] clipped to the row's
//! polygon. Basic and extended statistics are computed on that graph and
//! the requested ones are written back onto the row. Rows that fail are
//! logged and reported, never fatal to the batch.

pub mod annotate;
pub mod graph;
pub mod overpass;
pub mod progress;
pub mod simplify;
pub mod stats;

pub use annotate::annotate_networks;
pub use graph::{StreetEdge, StreetGraph, StreetNode};
pub use overpass::{NetworkProvider, OverpassConfig, OverpassProvider};
pub use progress::{NullProgress, ProgressCallback, null_progress};

use thiserror::Error;

/// Errors that can occur while building or measuring a street network.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Overpass answered with a non-success status.
    #[error("Overpass returned HTTP {status}: {body}")]
    Overpass {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// Polygon has no usable exterior ring.
    #[error("Invalid polygon: {message}")]
    InvalidPolygon {
        /// Description of what is wrong with it.
        message: String,
    },

    /// No street network remained after clipping and cleanup.
    #[error("Found no graph nodes within the requested polygon")]
    EmptyGraph,
}
