//! CLI errors and exit handling.

use std::process;
use thiserror::Error;
use tilesmith::config::ConfigFileError;
use tilesmith::coord::CoordError;
use tilesmith::ingest::IngestError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),

    #[error("Invalid coordinates: {0}")]
    Coord(#[from] CoordError),

    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),
}

impl CliError {
    /// Prints the error and exits with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        if let CliError::Config(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!(
                "Check {} or delete it to use defaults.",
                tilesmith::config::config_file_path().display()
            );
        }
        process::exit(1)
    }
}
