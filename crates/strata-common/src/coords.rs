//! Coordinate types for tile, chunk, and local positions.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Width and height of a chunk in tiles.
pub const CHUNK_SIZE: u32 = 64;

/// Number of cells in one chunk plane.
pub const CHUNK_AREA: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Absolute tile position in a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// Column of the tile
    pub x: i64,
    /// Row of the tile
    pub y: i64,
}

impl Position {
    /// Creates a new tile position.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the position offset by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Chunk coordinate (identifies a chunk in the realm grid).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Pod, Zeroable,
)]
#[repr(C)]
pub struct ChunkPosition {
    /// X coordinate in chunk space
    pub x: i32,
    /// Y coordinate in chunk space
    pub y: i32,
}

impl ChunkPosition {
    /// Creates a new chunk position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the chunk containing a tile position.
    #[must_use]
    pub const fn from_position(position: Position) -> Self {
        let size = CHUNK_SIZE as i64;
        Self {
            x: position.x.div_euclid(size) as i32,
            y: position.y.div_euclid(size) as i32,
        }
    }

    /// Returns the minimum-coordinate tile of this chunk.
    #[must_use]
    pub const fn top_left(self) -> Position {
        Position {
            x: (self.x as i64) * (CHUNK_SIZE as i64),
            y: (self.y as i64) * (CHUNK_SIZE as i64),
        }
    }

    /// Visits every tile position in the chunk in row-major order.
    pub fn iterate<F: FnMut(Position)>(self, mut visit: F) {
        let origin = self.top_left();
        for dy in 0..i64::from(CHUNK_SIZE) {
            for dx in 0..i64::from(CHUNK_SIZE) {
                visit(origin.offset(dx, dy));
            }
        }
    }
}

impl std::fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

impl From<Position> for ChunkPosition {
    fn from(position: Position) -> Self {
        Self::from_position(position)
    }
}

/// Local coordinate within a chunk (0 to CHUNK_SIZE-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct LocalPosition {
    /// X coordinate within chunk
    pub x: u16,
    /// Y coordinate within chunk
    pub y: u16,
}

impl LocalPosition {
    /// Creates a new local position.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Returns the local part of an absolute tile position.
    #[must_use]
    pub const fn from_position(position: Position) -> Self {
        let size = CHUNK_SIZE as i64;
        Self {
            x: position.x.rem_euclid(size) as u16,
            y: position.y.rem_euclid(size) as u16,
        }
    }

    /// Converts to linear index for array access.
    #[must_use]
    pub const fn to_index(self) -> usize {
        (self.y as usize) * (CHUNK_SIZE as usize) + (self.x as usize)
    }

    /// Creates from linear index.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        let size = CHUNK_SIZE as usize;
        Self {
            x: (index % size) as u16,
            y: (index / size) as u16,
        }
    }
}

/// Inclusive rectangle of chunk positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    /// Minimum corner
    pub min: ChunkPosition,
    /// Maximum corner (inclusive)
    pub max: ChunkPosition,
}

impl ChunkRange {
    /// Creates a range spanning the two corners in any order.
    #[must_use]
    pub fn new(a: ChunkPosition, b: ChunkPosition) -> Self {
        Self {
            min: ChunkPosition::new(a.x.min(b.x), a.y.min(b.y)),
            max: ChunkPosition::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// A range holding exactly one chunk.
    #[must_use]
    pub const fn single(position: ChunkPosition) -> Self {
        Self {
            min: position,
            max: position,
        }
    }

    /// Checks whether a chunk lies inside the range.
    #[must_use]
    pub const fn contains(&self, position: ChunkPosition) -> bool {
        position.x >= self.min.x
            && position.x <= self.max.x
            && position.y >= self.min.y
            && position.y <= self.max.y
    }

    /// Iterates the chunk positions of the range in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = ChunkPosition> {
        let Self { min, max } = *self;
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| ChunkPosition::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_positions_floor() {
        let position = Position::new(-1, -65);
        assert_eq!(ChunkPosition::from(position), ChunkPosition::new(-1, -2));
        assert_eq!(
            LocalPosition::from_position(position),
            LocalPosition::new(63, 63)
        );
    }

    #[test]
    fn test_iterate_is_row_major() {
        let chunk = ChunkPosition::new(2, -1);
        let mut visited = Vec::new();
        chunk.iterate(|position| visited.push(position));

        assert_eq!(visited.len(), CHUNK_AREA);
        assert_eq!(visited[0], chunk.top_left());
        assert_eq!(visited[1], chunk.top_left().offset(1, 0));
        assert_eq!(
            visited[CHUNK_SIZE as usize],
            chunk.top_left().offset(0, 1)
        );
        assert!(visited
            .iter()
            .all(|position| ChunkPosition::from(*position) == chunk));
    }

    #[test]
    fn test_local_index_round_trip() {
        for index in [0, 1, 63, 64, 4095] {
            assert_eq!(LocalPosition::from_index(index).to_index(), index);
        }
    }

    #[test]
    fn test_chunk_range_positions() {
        let range = ChunkRange::new(ChunkPosition::new(1, 1), ChunkPosition::new(0, 0));
        let positions: Vec<_> = range.positions().collect();
        assert_eq!(
            positions,
            vec![
                ChunkPosition::new(0, 0),
                ChunkPosition::new(1, 0),
                ChunkPosition::new(0, 1),
                ChunkPosition::new(1, 1),
            ]
        );
        assert!(range.contains(ChunkPosition::new(1, 0)));
        assert!(!range.contains(ChunkPosition::new(2, 0)));
    }
}
