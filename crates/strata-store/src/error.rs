//! Error types for persistence and migration.

use strata_common::{RealmId, TileId, WorldError};
use thiserror::Error;

/// Errors raised by the persistence backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Relational backend failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Key-value backend failure
    #[error("Key-value store error: {0}")]
    Kv(#[from] redb::Error),

    /// Metadata document could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary record could not be (de)serialized
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored chunk data was rejected by the world engine
    #[error(transparent)]
    World(#[from] WorldError),

    /// The store was used after `close`
    #[error("Store is closed")]
    Closed,

    /// No row exists for the realm
    #[error("{0} not found")]
    RealmNotFound(RealmId),

    /// No archived tileset exists for the hash
    #[error("Tileset {0} not found")]
    TilesetNotFound(String),

    /// The database was written by a newer build
    #[error("Database format {found} is newer than supported format {current}")]
    FormatTooNew {
        /// Stored version
        found: u32,
        /// Version of this build
        current: u32,
    },

    /// Tile ID migration failed
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

macro_rules! kv_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for StoreError {
                fn from(e: $source) -> Self {
                    Self::Kv(e.into())
                }
            }
        )*
    };
}

kv_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that abort a realm's tile ID migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The stored tileset hash has no archived name table
    #[error("No archived tileset for hash {hash}; cannot migrate")]
    MissingTileset {
        /// Stored tileset hash
        hash: String,
    },

    /// A stored tile no longer exists in the active tileset
    #[error("Tile {identifier} (old ID {old_id}) does not exist in the active tileset")]
    UnresolvedTile {
        /// Identifier the old tileset gave the tile
        identifier: String,
        /// Numeric ID found in chunk data
        old_id: TileId,
    },

    /// Chunk data holds an ID the old tileset never assigned
    #[error("Old tile ID {old_id} is not in the archived tileset")]
    UnknownTileId {
        /// Numeric ID found in chunk data
        old_id: TileId,
    },

    /// The tileset archive could not be read
    #[error("Failed to read tileset archive: {0}")]
    Archive(#[source] Box<StoreError>),
}

impl From<StoreError> for MigrationError {
    fn from(e: StoreError) -> Self {
        Self::Archive(Box::new(e))
    }
}
