#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line driver for the urbankit pipelines.
//!
//! ```text
//! urbankit merge -o lima_metro.geojson lima.geojson callao.geojson
//! urbankit hexagons --config pipeline.toml
//! urbankit network --config pipeline.toml
//! urbankit durations trips.csv --column minutes
//! ```
//!
//! Log output is routed through `indicatif-log-bridge` so that log lines
//! and progress bars never fight for the terminal. `RUST_LOG` sets the
//! level.

mod config;
mod pipeline;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PipelineConfig;

#[derive(Parser)]
#[command(name = "urbankit", about = "Geospatial helpers for urban analytics batches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge boundary GeoJSON files into one
    Merge {
        /// Output GeoJSON path
        #[arg(short, long)]
        output: PathBuf,
        /// Boundary GeoJSON files, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Tile the boundary into hexagons and aggregate population onto them
    Hexagons {
        /// Pipeline TOML file
        #[arg(long)]
        config: PathBuf,
    },
    /// Annotate boundary polygons with street-network statistics
    Network {
        /// Pipeline TOML file
        #[arg(long)]
        config: PathBuf,
    },
    /// Print duration bins and labels for a CSV column
    Durations {
        /// CSV file with a header row
        path: PathBuf,
        /// Column holding durations in minutes
        #[arg(long)]
        column: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Merge { output, inputs } => pipeline::run_merge(&inputs, &output)?,
        Commands::Hexagons { config } => {
            let config = PipelineConfig::load(&config)?;
            pipeline::run_hexagons(&config, &multi)?;
        }
        Commands::Network { config } => {
            let config = PipelineConfig::load(&config)?;
            pipeline::run_network(&config, &multi)?;
        }
        Commands::Durations { path, column } => pipeline::run_durations(&path, &column)?,
    }

    Ok(())
}
