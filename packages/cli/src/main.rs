#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the wildfire map.
//!
//! ```text
//! wildfire_map_cli fetch --lat 37.77 --lng -122.41 [--radius-km 50]
//! wildfire_map_cli legend
//! wildfire_map_cli watch [--config wildfire.toml]
//! ```
//!
//! Running with no subcommand enters interactive mode.
//!
//! The backend URL comes from the config file, overridden by
//! `WILDFIRE_BACKEND_URL` when set.

mod command;
mod interactive;
mod session;
mod surface;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wildfire_map_fire_models::Coordinates;

#[derive(Parser)]
#[command(
    name = "wildfire_map_cli",
    about = "Query fire detections and drive a viewport-synced fire overlay"
)]
struct Cli {
    /// Path to a TOML sync config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch detections around a point once and print them
    Fetch {
        /// Center latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Center longitude
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Search radius in kilometers (defaults to the configured search radius)
        #[arg(long)]
        radius_km: Option<f64>,
    },
    /// Print the severity legend
    Legend,
    /// Start an interactive session driven by viewport commands on stdin
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = session::load_config(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return interactive::run(&config).await;
    };

    match command {
        Commands::Fetch {
            lat,
            lng,
            radius_km,
        } => {
            let radius_km = radius_km.unwrap_or(config.search_radius_km);
            session::fetch(&config, Coordinates::new(lat, lng), radius_km).await?;
        }
        Commands::Legend => session::print_legend(),
        Commands::Watch => session::watch(&config).await?,
    }

    Ok(())
}
