//! Fixed-size chunk grids and their byte layout.
//!
//! Every chunk plane is a dense `CHUNK_SIZE × CHUNK_SIZE` grid stored
//! row-major. Each grid carries its own reader/writer lock, separate from
//! the lock of the map that holds it.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_common::{LocalPosition, TileId, WorldError, WorldResult, CHUNK_AREA};

use crate::biome::BiomeType;
use crate::fluid::FluidTile;

/// A cell type that can live in a chunk plane.
pub trait PlaneCell: Copy + Default + PartialEq + Send + Sync + 'static {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Appends the little-endian encoding of the cell.
    fn encode(self, out: &mut Vec<u8>);

    /// Decodes one cell from exactly [`PlaneCell::WIDTH`] bytes.
    fn decode(bytes: &[u8]) -> Self;
}

impl PlaneCell for TileId {
    const WIDTH: usize = 2;

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl PlaneCell for BiomeType {
    const WIDTH: usize = 2;

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.raw().to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        Self::from_raw(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

impl PlaneCell for FluidTile {
    const WIDTH: usize = 4;

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.pack().to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        Self::unpack(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl PlaneCell for bool {
    const WIDTH: usize = 1;

    fn encode(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Byte length of one plane of the given cell type.
#[must_use]
pub const fn plane_len<T: PlaneCell>() -> usize {
    CHUNK_AREA * T::WIDTH
}

/// A dense chunk grid guarded by its own lock.
#[derive(Debug)]
pub struct Chunk<T> {
    cells: RwLock<Box<[T]>>,
}

/// Tile IDs of one layer.
pub type TileChunk = Chunk<TileId>;
/// Biome tags.
pub type BiomeChunk = Chunk<BiomeType>;
/// Fluid descriptors.
pub type FluidChunk = Chunk<FluidTile>;
/// Walkability flags.
pub type PathChunk = Chunk<bool>;

impl<T: PlaneCell> Default for Chunk<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PlaneCell> Chunk<T> {
    /// Creates a chunk with every cell at its default value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cells: RwLock::new(vec![T::default(); CHUNK_AREA].into_boxed_slice()),
        }
    }

    /// Creates a chunk from exactly `CHUNK_AREA` cells.
    pub fn from_cells(cells: Vec<T>) -> WorldResult<Self> {
        if cells.len() != CHUNK_AREA {
            return Err(WorldError::InvalidData(format!(
                "expected {CHUNK_AREA} cells, got {}",
                cells.len()
            )));
        }
        Ok(Self {
            cells: RwLock::new(cells.into_boxed_slice()),
        })
    }

    /// Reads one cell.
    #[must_use]
    pub fn get(&self, local: LocalPosition) -> T {
        self.cells.read()[local.to_index()]
    }

    /// Writes one cell, returning the previous value.
    pub fn set(&self, local: LocalPosition, value: T) -> T {
        let mut cells = self.cells.write();
        std::mem::replace(&mut cells[local.to_index()], value)
    }

    /// Shared access to all cells.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[T]>> {
        self.cells.read()
    }

    /// Exclusive access to all cells.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[T]>> {
        self.cells.write()
    }

    /// Appends the encoded plane to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let cells = self.cells.read();
        out.reserve(cells.len() * T::WIDTH);
        for cell in cells.iter() {
            cell.encode(out);
        }
    }

    /// Encodes the plane into a new buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(plane_len::<T>());
        self.encode_into(&mut out);
        out
    }
}

/// Decodes one plane from exactly [`plane_len`] bytes.
pub fn decode_plane<T: PlaneCell>(bytes: &[u8]) -> WorldResult<Vec<T>> {
    if bytes.len() != plane_len::<T>() {
        return Err(WorldError::InvalidData(format!(
            "plane is {} bytes, expected {}",
            bytes.len(),
            plane_len::<T>()
        )));
    }
    Ok(bytes.chunks_exact(T::WIDTH).map(T::decode).collect())
}
