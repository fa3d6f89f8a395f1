//! User configuration from `~/.tilesmith/config.ini`.
//!
//! Settings structs live in `settings`, defaults in [`defaults`], INI
//! parsing in `parser` and serialization in `writer`. Each settings section
//! converts into the runtime config of the component it drives.

pub mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{BatchSettings, ConfigFile, IngestSettings, LoggingSettings, TileSettings};
