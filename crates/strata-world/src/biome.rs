//! Biome tags.

use serde::{Deserialize, Serialize};

/// Biome of a tile. Unknown tags are kept as-is so they round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiomeType(u16);

impl BiomeType {
    /// No biome assigned.
    pub const VOID: Self = Self(0);
    /// Grassland.
    pub const GRASSLAND: Self = Self(1);
    /// Volcanic.
    pub const VOLCANIC: Self = Self(2);
    /// Snowy.
    pub const SNOWY: Self = Self(3);
    /// Desert.
    pub const DESERT: Self = Self(4);
    /// Cave interior.
    pub const CAVE: Self = Self(5);
    /// Ship interior.
    pub const SHIP: Self = Self(6);

    /// Creates a biome tag from a raw value.
    #[must_use]
    pub const fn from_raw(tag: u16) -> Self {
        Self(tag)
    }

    /// Returns the raw tag.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Human-readable name, `None` for unknown tags.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("void"),
            1 => Some("grassland"),
            2 => Some("volcanic"),
            3 => Some("snowy"),
            4 => Some("desert"),
            5 => Some("cave"),
            6 => Some("ship"),
            _ => None,
        }
    }
}
