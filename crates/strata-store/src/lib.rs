//! # Strata Store
//!
//! Persistence for Strata realms.
//!
//! This crate handles:
//! - The relational backend (SQLite): realms, chunks, tile-entities,
//!   entities, users, villages and archived tilesets
//! - The key-value export backend (redb)
//! - Tile ID migration when a realm was saved under another tileset
//! - Store configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod kv;
pub mod migration;
pub mod sqlite;

#[cfg(test)]
mod e2e_tests;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::StoreConfig;
    pub use crate::error::{MigrationError, StoreError, StoreResult};
    pub use crate::kv::KvStore;
    pub use crate::migration::{
        migrate_realm, MigrationEngine, MigrationOptions, MigrationOutcome, MigrationReport,
        TilesetArchive,
    };
    pub use crate::sqlite::{SqliteStore, UserRecord, VillageRecord};
}

pub use prelude::*;
