//! Marching-squares autotiling.
//!
//! Tiles in an autotile family (walls, towers, carpets) render a variant
//! chosen from which cardinal neighbors belong to the same family:
//! ```text
//!      N(1)
//! W(8)  *  E(2)
//!      S(4)
//! ```
//! The 4-bit mask indexes the family's 16 variants.

use strata_common::{Position, TileId};

use crate::layer::Layer;
use crate::provider::TileProvider;

/// Cardinal neighbor mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NeighborMask(pub u8);

impl NeighborMask {
    /// North neighbor bit.
    pub const NORTH: u8 = 1;
    /// East neighbor bit.
    pub const EAST: u8 = 2;
    /// South neighbor bit.
    pub const SOUTH: u8 = 4;
    /// West neighbor bit.
    pub const WEST: u8 = 8;

    /// No matching neighbors.
    pub const NONE: Self = Self(0);
    /// All four neighbors match.
    pub const ALL: Self = Self(15);

    /// Builds a mask from neighbor flags.
    #[must_use]
    pub const fn new(north: bool, east: bool, south: bool, west: bool) -> Self {
        let mut mask = 0u8;
        if north {
            mask |= Self::NORTH;
        }
        if east {
            mask |= Self::EAST;
        }
        if south {
            mask |= Self::SOUTH;
        }
        if west {
            mask |= Self::WEST;
        }
        Self(mask)
    }
}

/// Computes the neighbor mask of `position` for tiles matching `member`.
/// Neighbors in missing chunks never match.
pub fn neighbor_mask<F: Fn(TileId) -> bool>(
    provider: &TileProvider,
    layer: Layer,
    position: Position,
    member: F,
) -> NeighborMask {
    let matches = |dx, dy| {
        provider
            .try_tile(layer, position.offset(dx, dy))
            .is_some_and(&member)
    };
    NeighborMask::new(matches(0, -1), matches(1, 0), matches(0, 1), matches(-1, 0))
}

/// Re-selects the variant of the tile at `position` if it belongs to an
/// autotile family. Returns the tile now stored there, or `None` if the
/// tile is not autotiled or its chunk does not exist.
pub fn autotile(provider: &TileProvider, position: Position, layer: Layer) -> Option<TileId> {
    let tile = provider.try_tile(layer, position)?;
    let tileset = provider.tileset();
    let family = tileset.autotile_family(tile)?;
    let mask = neighbor_mask(provider, layer, position, |neighbor| {
        tileset
            .autotile_family(neighbor)
            .is_some_and(|other| other.name() == family.name())
    });
    let variant = family.variant(mask.0);
    if variant != tile {
        provider.set_tile(layer, position, variant, false);
    }
    Some(variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tileset::Tileset;
    use std::sync::Arc;
    use strata_common::ChunkPosition;

    const WALLS: [&str; 16] = [
        "base:tile/wall_0", "base:tile/wall_1", "base:tile/wall_2", "base:tile/wall_3",
        "base:tile/wall_4", "base:tile/wall_5", "base:tile/wall_6", "base:tile/wall_7",
        "base:tile/wall_8", "base:tile/wall_9", "base:tile/wall_10", "base:tile/wall_11",
        "base:tile/wall_12", "base:tile/wall_13", "base:tile/wall_14", "base:tile/wall_15",
    ];

    fn provider() -> TileProvider {
        let mut builder = Tileset::builder("test:tileset").tile(1, "base:tile/grass");
        for (i, wall) in WALLS.iter().enumerate() {
            builder = builder.solid(10 + i as TileId, wall);
        }
        let tileset = builder
            .autotile("base:autotile/wall", &WALLS)
            .build()
            .expect("valid tileset");
        let provider = TileProvider::new(Arc::new(tileset));
        provider.ensure_all_chunks(ChunkPosition::new(0, 0));
        provider
    }

    #[test]
    fn test_mask_bits() {
        assert_eq!(NeighborMask::new(true, true, true, true), NeighborMask::ALL);
        assert_eq!(NeighborMask::new(false, true, false, true).0, 10);
    }

    #[test]
    fn test_horizontal_wall_run() {
        let provider = provider();
        for x in 4..=6 {
            provider.set_tile(Layer::Objects, Position::new(x, 4), 10, false);
        }
        for x in 4..=6 {
            autotile(&provider, Position::new(x, 4), Layer::Objects);
        }

        // Left end sees east, middle sees east and west, right end sees west.
        assert_eq!(provider.get_tile(Layer::Objects, Position::new(4, 4)), 10 + 2);
        assert_eq!(provider.get_tile(Layer::Objects, Position::new(5, 4)), 10 + 10);
        assert_eq!(provider.get_tile(Layer::Objects, Position::new(6, 4)), 10 + 8);
    }

    #[test]
    fn test_non_family_tiles_untouched() {
        let provider = provider();
        provider.set_tile(Layer::Terrain, Position::new(1, 1), 1, false);
        assert_eq!(autotile(&provider, Position::new(1, 1), Layer::Terrain), None);
        assert_eq!(provider.get_tile(Layer::Terrain, Position::new(1, 1)), 1);
    }

    #[test]
    fn test_missing_neighbor_chunk_does_not_match() {
        let provider = provider();
        let edge = Position::new(0, 0);
        provider.set_tile(Layer::Objects, edge, 15, false);
        assert_eq!(autotile(&provider, edge, Layer::Objects), Some(10));
    }
}
