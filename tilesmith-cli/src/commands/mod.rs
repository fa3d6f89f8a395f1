//! Subcommand handlers.

pub mod coord;
pub mod ingest;
