//! Tile layers.

use serde::{Deserialize, Serialize};

/// Number of persisted layers.
pub const LAYER_COUNT: usize = 9;

/// One of the stacked tile planes of a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Indestructible base
    Bedrock,
    /// Dirt and sand under the terrain
    Soil,
    /// Ground surface
    Terrain,
    /// Things under fluid
    Submerged,
    /// Placed objects
    Objects,
    /// Plants
    Vegetation,
    /// Snow cover
    Snow,
    /// Floors built by players
    Flooring,
    /// Roofs and overhangs
    Highest,
    /// Never persisted
    Invalid,
}

/// Persisted layers in storage order. This order is part of the binary
/// chunk format.
pub const ALL_LAYERS: [Layer; LAYER_COUNT] = [
    Layer::Bedrock,
    Layer::Soil,
    Layer::Terrain,
    Layer::Submerged,
    Layer::Objects,
    Layer::Vegetation,
    Layer::Snow,
    Layer::Flooring,
    Layer::Highest,
];

impl Layer {
    /// Position of the layer in [`ALL_LAYERS`], `None` for `Invalid`.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Bedrock => Some(0),
            Self::Soil => Some(1),
            Self::Terrain => Some(2),
            Self::Submerged => Some(3),
            Self::Objects => Some(4),
            Self::Vegetation => Some(5),
            Self::Snow => Some(6),
            Self::Flooring => Some(7),
            Self::Highest => Some(8),
            Self::Invalid => None,
        }
    }

    /// Inverse of [`Layer::index`].
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        ALL_LAYERS.get(index).copied().unwrap_or(Self::Invalid)
    }

    /// Lowercase name used in logs and content data.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bedrock => "bedrock",
            Self::Soil => "soil",
            Self::Terrain => "terrain",
            Self::Submerged => "submerged",
            Self::Objects => "objects",
            Self::Vegetation => "vegetation",
            Self::Snow => "snow",
            Self::Flooring => "flooring",
            Self::Highest => "highest",
            Self::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_storage_order() {
        for (i, layer) in ALL_LAYERS.iter().enumerate() {
            assert_eq!(layer.index(), Some(i));
            assert_eq!(Layer::from_index(i), *layer);
        }
        assert_eq!(Layer::Invalid.index(), None);
        assert_eq!(Layer::from_index(LAYER_COUNT), Layer::Invalid);
    }
}
