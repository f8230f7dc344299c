//! # Strata Common
//!
//! Common types shared by every Strata crate.
//!
//! This crate provides:
//! - Coordinate types (tile, chunk, local) and chunk ranges
//! - ID types (RealmId, GlobalId, Identifier, TileId)
//! - The database format version gate
//! - World-level error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_position_conversion() {
        let position = Position::new(100, 200);
        let chunk = ChunkPosition::from_position(position);
        let local = LocalPosition::from_position(position);

        assert_eq!(chunk, ChunkPosition::new(1, 3));
        assert_eq!(local, LocalPosition::new(36, 8));
        assert_eq!(chunk.top_left(), Position::new(64, 192));
    }

    #[test]
    fn test_global_id_generation() {
        let id1 = GlobalId::next();
        let id2 = GlobalId::next();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_format_gate() {
        assert_eq!(
            check_format(DATABASE_FORMAT_VERSION),
            FormatCompatibility::Current
        );
        assert_eq!(check_format(0), FormatCompatibility::Fresh);
    }
}
