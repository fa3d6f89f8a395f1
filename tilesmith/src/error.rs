//! Error types for tile generation.
//!
//! Errors are categorized by where they originate so that coalescing and
//! batching can deliver one failure to exactly the callers it affects.

use std::time::Duration;
use thiserror::Error;

/// Errors returned to tile callers.
///
/// `Clone` so a single failure can be handed to every coalesced waiter and
/// to every tile of a merged joint request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// Malformed or missing request parameters (never retried)
    #[error("invalid tile configuration: {0}")]
    Config(String),

    /// Query/aggregation execution failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Remote compute response could not be decoded
    #[error("malformed tile response: {0}")]
    Decode(String),

    /// Remote call did not answer in time
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),
}

impl TileError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Shorthand for a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

impl From<serde_json::Error> for TileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias for the tile path.
pub type TileResult<T> = Result<T, TileError>;
