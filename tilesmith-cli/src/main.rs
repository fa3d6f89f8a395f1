//! Tilesmith CLI - command-line interface
//!
//! Inspects tile coordinates and validates ingest directories using the
//! tilesmith library.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use error::CliError;
use std::path::PathBuf;
use tilesmith::config::ConfigFile;
use tilesmith::logging::init_logging;

#[derive(Parser)]
#[command(name = "tilesmith")]
#[command(version = tilesmith::VERSION)]
#[command(about = "Tile pyramid tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the tile, pixel and tile bounds of a geographic point
    Coord {
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Zoom level (0-24)
        #[arg(long, default_value = "10")]
        zoom: u8,
    },

    /// Validate every `x,y` point file in a directory
    Ingest {
        /// Directory of input files
        dir: PathBuf,

        /// Concurrent workers (defaults to [ingest] workers from config.ini)
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        err.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Coord { lon, lat, zoom } => commands::coord::run(lon, lat, zoom),
        Command::Ingest { dir, workers } => {
            let config = ConfigFile::load()?;
            let _guard = init_logging(&config.logging.directory, &config.logging.file)
                .map_err(CliError::LoggingInit)?;
            commands::ingest::run(&dir, workers, &config).await
        }
    }
}
