//! TOML pipeline configuration.
//!
//! Relative paths in the file are resolved against the directory the file
//! lives in, so a pipeline can be run from anywhere.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use urbankit_geometry_models::{Bounds, JoinMode, SpatialPredicate};
use urbankit_network::OverpassConfig;
use urbankit_network_models::{ExtendedStatsOptions, NetworkType, StatsRequest};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pipeline config {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Pipeline config has no [{section}] section")]
    MissingSection { section: &'static str },
}

/// A whole pipeline file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    pub boundary: BoundaryConfig,
    pub population: Option<PopulationConfig>,
    pub hexagons: Option<HexagonConfig>,
    pub network: Option<NetworkConfig>,
    #[serde(default)]
    pub overpass: OverpassConfig,
}

/// Boundary downloads: merged into the study area for `hexagons`, one row
/// per feature for `network`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoundaryConfig {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationConfig {
    /// CSV with `latitude`, `longitude` and numeric columns.
    pub path: PathBuf,
    /// Boxes to excise, each `[min_lat, max_lat, min_lon, max_lon]`.
    #[serde(default)]
    pub remove: Vec<[f64; 4]>,
}

impl PopulationConfig {
    #[must_use]
    pub fn removal_boxes(&self) -> Vec<Bounds> {
        self.remove
            .iter()
            .map(|&[min_lat, max_lat, min_lon, max_lon]| {
                Bounds::from_lat_lon(min_lat, max_lat, min_lon, max_lon)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HexagonConfig {
    pub resolution: u8,
    #[serde(default)]
    pub join: JoinMode,
    #[serde(default)]
    pub predicate: SpatialPredicate,
    pub output: PathBuf,
    pub centroids: Option<PathBuf>,
    /// Point column name to reducer name (`sum`, `min` or `max`).
    #[serde(default)]
    pub aggregate: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub network_type: NetworkType,
    #[serde(default)]
    pub basic: Vec<String>,
    #[serde(default)]
    pub extended: Vec<String>,
    #[serde(flatten)]
    pub options: ExtendedStatsOptions,
    /// Boundary feature property used as the row id; rows without it are
    /// numbered by position.
    #[serde(default = "default_id_property")]
    pub id_property: String,
    pub output: PathBuf,
}

fn default_id_property() -> String {
    "name".to_string()
}

impl NetworkConfig {
    #[must_use]
    pub fn request(&self) -> StatsRequest {
        StatsRequest {
            network_type: self.network_type,
            basic: self.basic.clone(),
            extended: self.extended.clone(),
            options: self.options,
        }
    }
}

impl PipelineConfig {
    /// Reads and parses a pipeline file.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Io`] if the file cannot be read
    /// * [`ConfigError::Toml`] if it is not a valid pipeline config
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.relative_to(base))
    }

    /// Parses pipeline TOML without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if `text` does not describe a pipeline.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Rebases every relative path onto `base`.
    #[must_use]
    pub fn relative_to(mut self, base: &Path) -> Self {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        self.boundary.paths.iter_mut().for_each(rebase);
        if let Some(population) = &mut self.population {
            rebase(&mut population.path);
        }
        if let Some(hexagons) = &mut self.hexagons {
            rebase(&mut hexagons.output);
            if let Some(centroids) = &mut hexagons.centroids {
                rebase(centroids);
            }
        }
        if let Some(network) = &mut self.network {
            rebase(&mut network.output);
        }
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSection`] without a `[hexagons]` table.
    pub fn hexagons(&self) -> Result<&HexagonConfig, ConfigError> {
        self.hexagons
            .as_ref()
            .ok_or(ConfigError::MissingSection { section: "hexagons" })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSection`] without a `[network]` table.
    pub fn network(&self) -> Result<&NetworkConfig, ConfigError> {
        self.network
            .as_ref()
            .ok_or(ConfigError::MissingSection { section: "network" })
    }
}
