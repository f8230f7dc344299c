//! Packed fluid descriptors.

use serde::{Deserialize, Serialize};
use strata_common::FluidId;

/// Number of low bits of the packed value holding the level.
pub const FLUID_LEVEL_BITS: u32 = 16;

const LEVEL_MASK: u32 = (1 << FLUID_LEVEL_BITS) - 1;

/// Fluid type and level of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FluidTile {
    /// Fluid type
    pub id: FluidId,
    /// 0 is empty, [`FluidTile::FULL`] is full, [`FluidTile::INFINITE`] never depletes
    pub level: u16,
}

impl FluidTile {
    /// Level of a full tile.
    pub const FULL: u16 = 1000;

    /// Level of a source that never depletes.
    pub const INFINITE: u16 = u16::MAX;

    /// Creates a fluid tile.
    #[must_use]
    pub const fn new(id: FluidId, level: u16) -> Self {
        Self { id, level }
    }

    /// A full tile of the given fluid.
    #[must_use]
    pub const fn full(id: FluidId) -> Self {
        Self::new(id, Self::FULL)
    }

    /// An infinite source of the given fluid.
    #[must_use]
    pub const fn infinite(id: FluidId) -> Self {
        Self::new(id, Self::INFINITE)
    }

    /// Checks if no fluid is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.level == 0
    }

    /// Checks if the tile is full (infinite sources count as full).
    #[must_use]
    pub const fn is_full(self) -> bool {
        self.level >= Self::FULL
    }

    /// Checks if the tile is an infinite source.
    #[must_use]
    pub const fn is_infinite(self) -> bool {
        self.level == Self::INFINITE
    }

    /// Checks if two finite amounts of the same fluid can be combined.
    #[must_use]
    pub const fn can_merge(self, other: Self) -> bool {
        self.id == other.id && !self.is_infinite() && !other.is_infinite()
    }

    /// Packs into the 32-bit on-disk form.
    #[must_use]
    pub const fn pack(self) -> u32 {
        ((self.id as u32) << FLUID_LEVEL_BITS) | (self.level as u32 & LEVEL_MASK)
    }

    /// Unpacks the 32-bit on-disk form.
    #[must_use]
    pub const fn unpack(packed: u32) -> Self {
        Self {
            id: (packed >> FLUID_LEVEL_BITS) as FluidId,
            level: (packed & LEVEL_MASK) as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let tile = FluidTile::new(3, 250);
        assert_eq!(tile.pack(), (3 << 16) | 250);
        assert_eq!(FluidTile::unpack(tile.pack()), tile);
        assert_eq!(FluidTile::unpack(0), FluidTile::default());
    }

    #[test]
    fn test_sentinels() {
        let water = FluidTile::full(1);
        let spring = FluidTile::infinite(1);

        assert!(water.is_full());
        assert!(!water.is_infinite());
        assert!(spring.is_full());
        assert!(spring.is_infinite());
        assert!(FluidTile::default().is_empty());
        assert_eq!(FluidTile::unpack(spring.pack()), spring);
    }

    #[test]
    fn test_infinite_never_merges() {
        let half = FluidTile::new(1, 500);
        assert!(half.can_merge(FluidTile::new(1, 10)));
        assert!(!half.can_merge(FluidTile::new(2, 10)));
        assert!(!half.can_merge(FluidTile::infinite(1)));
    }
}
