//! # Strata World
//!
//! In-memory realm state for Strata.
//!
//! This crate handles:
//! - Chunked tile layers, biomes, fluids and pathmaps
//! - Tilesets and their content hashes
//! - Per-map and per-chunk locking
//! - Autotiling of position-dependent tiles
//! - Realms and the set of resident realms

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod autotile;
pub mod biome;
pub mod chunk;
pub mod fluid;
pub mod layer;
pub mod provider;
pub mod realm;
pub mod tileset;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::biome::*;
    pub use crate::chunk::*;
    pub use crate::fluid::*;
    pub use crate::layer::*;
    pub use crate::provider::*;
    pub use crate::realm::*;
    pub use crate::tileset::*;
    pub use crate::world::*;
}

pub use prelude::*;
