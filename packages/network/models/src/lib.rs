#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Street-network annotation types.
//!
//! An [`AreaRow`] is a polygon with a bag of statistic columns. The
//! annotator downloads a street network for each row and writes the
//! requested [`StatValue`]s back onto it, collecting a [`RowFailure`] for
//! every row it could not annotate.

use std::collections::BTreeMap;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Which OSM ways make up the street network.
///
/// Mirrors the osmnx network type names.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum NetworkType {
    /// Public drivable streets, excluding service roads.
    #[default]
    Drive,
    /// Drivable streets including service roads.
    DriveService,
    /// Streets and paths pedestrians can use. Ignores one-way restrictions.
    Walk,
    /// Streets and paths cyclists can use.
    Bike,
    /// All public streets and paths.
    All,
    /// All streets and paths, including private access.
    AllPrivate,
}

impl NetworkType {
    /// Whether one-way tags are honoured when building the graph.
    #[must_use]
    pub const fn respects_oneway(self) -> bool {
        !matches!(self, Self::Walk)
    }
}

/// A computed statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Scalar metric.
    Number(f64),
    /// Set of OSM node ids (e.g. graph center or periphery).
    NodeList(Vec<i64>),
    /// Per-node metric keyed by OSM node id.
    NodeValues(BTreeMap<i64, f64>),
    /// Count or proportion keyed by streets-per-node.
    Histogram(BTreeMap<u32, f64>),
}

impl StatValue {
    /// Returns the scalar value, if this is a [`StatValue::Number`].
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for StatValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Switches for the expensive extended statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExtendedStatsOptions {
    /// Node and edge connectivity of the whole graph.
    pub connectivity: bool,
    /// Average node connectivity over all node pairs.
    pub anc: bool,
    /// Eccentricity, diameter, radius, center and periphery.
    pub ecc: bool,
    /// Betweenness centrality.
    pub bc: bool,
    /// Closeness centrality.
    pub cc: bool,
}

/// What to download and which statistics to write per row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRequest {
    pub network_type: NetworkType,
    /// Names of basic statistics to copy onto each row.
    pub basic: Vec<String>,
    /// Names of extended statistics to copy onto each row.
    pub extended: Vec<String>,
    pub options: ExtendedStatsOptions,
}

/// A polygon row to annotate.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaRow {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    pub columns: BTreeMap<String, StatValue>,
}

impl AreaRow {
    #[must_use]
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
            columns: BTreeMap::new(),
        }
    }
}

/// A row the annotator could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row_id: String,
    pub reason: String,
}

/// Output of a batch annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationReport {
    /// Every input row, in input order. Failed rows are unchanged.
    pub rows: Vec<AreaRow>,
    pub failures: Vec<RowFailure>,
}

impl AnnotationReport {
    /// Number of rows annotated without error.
    #[must_use]
    pub fn annotated(&self) -> usize {
        self.rows.len() - self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_type_names_are_snake_case() {
        assert_eq!(NetworkType::DriveService.to_string(), "drive_service");
        assert_eq!("all_private".parse::<NetworkType>().unwrap(), NetworkType::AllPrivate);
        assert_eq!("WALK".parse::<NetworkType>().unwrap(), NetworkType::Walk);
        assert!("tram".parse::<NetworkType>().is_err());
    }

    #[test]
    fn only_walk_ignores_oneway() {
        assert!(!NetworkType::Walk.respects_oneway());
        assert!(NetworkType::Drive.respects_oneway());
        assert!(NetworkType::Bike.respects_oneway());
    }

    #[test]
    fn stat_values_serialize_untagged() {
        assert_eq!(serde_json::to_string(&StatValue::Number(2.5)).unwrap(), "2.5");
        assert_eq!(
            serde_json::to_string(&StatValue::NodeList(vec![10, 20])).unwrap(),
            "[10,20]"
        );
        let hist = StatValue::Histogram(BTreeMap::from([(1, 2.0), (3, 4.0)]));
        assert_eq!(serde_json::to_string(&hist).unwrap(), r#"{"1":2.0,"3":4.0}"#);
    }

    #[test]
    fn request_deserializes_with_default_options() {
        let request: StatsRequest = serde_json::from_str(
            r#"{"network_type": "bike", "basic": ["n"], "extended": [], "options": {"ecc": true}}"#,
        )
        .unwrap();
        assert_eq!(request.network_type, NetworkType::Bike);
        assert!(request.options.ecc);
        assert!(!request.options.bc);
    }
}
