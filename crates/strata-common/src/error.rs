//! Error types for Strata.

use thiserror::Error;

/// Errors raised by the in-memory world engine.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Chunk not found
    #[error("Chunk not found at ({x}, {y})")]
    ChunkNotFound {
        /// X coordinate
        x: i32,
        /// Y coordinate
        y: i32,
    },

    /// Raw chunk data did not have the expected shape
    #[error("Invalid chunk data: {0}")]
    InvalidData(String),

    /// A tile identifier is not part of the active tileset
    #[error("Unknown tile: {0}")]
    UnknownTile(String),

    /// A tileset definition is malformed
    #[error("Invalid tileset: {0}")]
    InvalidTileset(String),
}

/// Result type alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
