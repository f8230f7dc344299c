//! Thread-safe access to all per-tile state of one realm.
//!
//! Every layer has its own chunk map behind its own reader/writer lock, and
//! so do biomes, fluids and the pathmap. Inside a map, every chunk carries
//! its own lock for cell access. Lock order is always map lock, then chunk
//! lock; the map lock is released as soon as the chunk's `Arc` has been
//! cloned out, so two chunks' locks are never held together.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use strata_common::{
    ChunkPosition, ChunkRange, LocalPosition, Position, TileId, WorldError, WorldResult,
};
use tracing::debug;

use crate::biome::BiomeType;
use crate::chunk::{decode_plane, plane_len, Chunk, PlaneCell};
use crate::fluid::FluidTile;
use crate::layer::{Layer, ALL_LAYERS, LAYER_COUNT};
use crate::tileset::Tileset;

/// Byte length of the terrain plane (every layer).
pub const TERRAIN_PLANE_LEN: usize = LAYER_COUNT * plane_len::<TileId>();
/// Byte length of the biome plane.
pub const BIOME_PLANE_LEN: usize = plane_len::<BiomeType>();
/// Byte length of the fluid plane.
pub const FLUID_PLANE_LEN: usize = plane_len::<FluidTile>();
/// Byte length of the pathmap plane.
pub const PATH_PLANE_LEN: usize = plane_len::<bool>();

/// Reports whether a solid tile-entity occupies a position.
///
/// Consulted while recomputing the pathmap. The provider holds none of its
/// locks during the call.
pub trait Occupancy: Send + Sync {
    /// Checks for a solid tile-entity at `position`.
    fn is_occupied(&self, position: Position) -> bool;
}

/// Occupancy for realms without tile-entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unoccupied;

impl Occupancy for Unoccupied {
    fn is_occupied(&self, _position: Position) -> bool {
        false
    }
}

/// The four raw planes of one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkSet {
    /// Every layer's tile IDs, in [`ALL_LAYERS`] order
    pub terrain: Vec<u8>,
    /// Biome tags
    pub biomes: Vec<u8>,
    /// Packed fluid descriptors
    pub fluids: Vec<u8>,
    /// Walkability flags
    pub pathmap: Vec<u8>,
}

impl ChunkSet {
    /// Checks every plane's length.
    pub fn validate(&self) -> WorldResult<()> {
        let planes = [
            ("terrain", self.terrain.len(), TERRAIN_PLANE_LEN),
            ("biome", self.biomes.len(), BIOME_PLANE_LEN),
            ("fluid", self.fluids.len(), FLUID_PLANE_LEN),
            ("pathmap", self.pathmap.len(), PATH_PLANE_LEN),
        ];
        for (name, actual, expected) in planes {
            if actual != expected {
                return Err(WorldError::InvalidData(format!(
                    "{name} plane is {actual} bytes, expected {expected}"
                )));
            }
        }
        Ok(())
    }
}

type ChunkMap<T> = RwLock<AHashMap<ChunkPosition, Arc<Chunk<T>>>>;

/// Looks up a chunk under the map's read lock and releases the lock.
fn find<T>(map: &ChunkMap<T>, position: ChunkPosition) -> Option<Arc<Chunk<T>>> {
    map.read().get(&position).cloned()
}

/// Inserts a default chunk, taking the writer lock only if it is missing.
fn ensure<T: PlaneCell>(map: &ChunkMap<T>, position: ChunkPosition) -> Arc<Chunk<T>> {
    ensure_inserted(map, position).0
}

/// Like [`ensure`], also reporting whether this call created the chunk.
fn ensure_inserted<T: PlaneCell>(
    map: &ChunkMap<T>,
    position: ChunkPosition,
) -> (Arc<Chunk<T>>, bool) {
    if let Some(chunk) = find(map, position) {
        return (chunk, false);
    }
    match map.write().entry(position) {
        Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
        Entry::Vacant(entry) => (Arc::clone(entry.insert(Arc::new(Chunk::new()))), true),
    }
}

/// Overwrites (or creates) a chunk's cells.
fn replace<T: PlaneCell>(
    map: &ChunkMap<T>,
    position: ChunkPosition,
    cells: Vec<T>,
) -> WorldResult<()> {
    if let Some(chunk) = find(map, position) {
        chunk.write().copy_from_slice(&cells);
        return Ok(());
    }
    match map.write().entry(position) {
        Entry::Occupied(entry) => entry.get().write().copy_from_slice(&cells),
        Entry::Vacant(entry) => {
            entry.insert(Arc::new(Chunk::from_cells(cells)?));
        },
    }
    Ok(())
}

fn missing(position: ChunkPosition) -> WorldError {
    WorldError::ChunkNotFound {
        x: position.x,
        y: position.y,
    }
}

/// Authoritative per-tile state of one realm.
pub struct TileProvider {
    layers: [ChunkMap<TileId>; LAYER_COUNT],
    biomes: ChunkMap<BiomeType>,
    fluids: ChunkMap<FluidTile>,
    paths: ChunkMap<bool>,
    tileset: Arc<Tileset>,
    occupancy: RwLock<Arc<dyn Occupancy>>,
}

impl std::fmt::Debug for TileProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileProvider")
            .field("tileset", self.tileset.name())
            .field("chunks", &self.chunk_positions().len())
            .finish_non_exhaustive()
    }
}

impl TileProvider {
    /// Creates an empty provider for the given tileset.
    #[must_use]
    pub fn new(tileset: Arc<Tileset>) -> Self {
        Self {
            layers: std::array::from_fn(|_| RwLock::new(AHashMap::new())),
            biomes: RwLock::new(AHashMap::new()),
            fluids: RwLock::new(AHashMap::new()),
            paths: RwLock::new(AHashMap::new()),
            tileset,
            occupancy: RwLock::new(Arc::new(Unoccupied)),
        }
    }

    /// Installs the tile-entity occupancy source used by the pathmap.
    pub fn set_occupancy(&self, occupancy: Arc<dyn Occupancy>) {
        *self.occupancy.write() = occupancy;
    }

    /// Active tileset.
    #[must_use]
    pub fn tileset(&self) -> &Arc<Tileset> {
        &self.tileset
    }

    fn layer_map(&self, layer: Layer) -> Option<&ChunkMap<TileId>> {
        layer.index().map(|index| &self.layers[index])
    }

    /// Materializes every plane's chunk at `position` if absent.
    ///
    /// The pathmap chunk is created last and derived from the layers as
    /// soon as it exists.
    pub fn ensure_all_chunks(&self, position: ChunkPosition) {
        for map in &self.layers {
            ensure(map, position);
        }
        ensure(&self.biomes, position);
        ensure(&self.fluids, position);
        if ensure_inserted(&self.paths, position).1 {
            self.remake_path_map(ChunkRange::single(position));
        }
    }

    /// Materializes the chunks containing a tile position.
    pub fn ensure_tile(&self, position: Position) {
        self.ensure_all_chunks(ChunkPosition::from(position));
    }

    /// Checks whether the terrain plane has a chunk at `position`.
    #[must_use]
    pub fn has_chunk(&self, position: ChunkPosition) -> bool {
        self.layers[0].read().contains_key(&position)
    }

    /// Every resident chunk position, sorted.
    ///
    /// A chunk is resident once `ensure_all_chunks` or `absorb` created it;
    /// biome chunks materialized on their own by `find_biome_type` do not
    /// count.
    #[must_use]
    pub fn chunk_positions(&self) -> Vec<ChunkPosition> {
        let mut positions: Vec<_> = self.layers[0].read().keys().copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Resident chunks of one layer.
    #[must_use]
    pub fn layer_chunks(&self, layer: Layer) -> Vec<(ChunkPosition, Arc<Chunk<TileId>>)> {
        self.layer_map(layer).map_or_else(Vec::new, |map| {
            let mut chunks: Vec<_> = map
                .read()
                .iter()
                .map(|(position, chunk)| (*position, Arc::clone(chunk)))
                .collect();
            chunks.sort_by_key(|(position, _)| *position);
            chunks
        })
    }

    /// Reads a tile whose chunk must exist.
    ///
    /// # Panics
    ///
    /// Panics if the chunk was never materialized or `layer` is `Invalid`.
    #[must_use]
    pub fn get_tile(&self, layer: Layer, position: Position) -> TileId {
        self.try_tile(layer, position).unwrap_or_else(|| {
            panic!(
                "no {layer} chunk at {} for tile {position}; ensure_all_chunks was skipped",
                ChunkPosition::from(position)
            )
        })
    }

    /// Reads a tile, `None` if its chunk does not exist.
    #[must_use]
    pub fn try_tile(&self, layer: Layer, position: Position) -> Option<TileId> {
        let chunk = find(self.layer_map(layer)?, ChunkPosition::from(position))?;
        Some(chunk.get(LocalPosition::from_position(position)))
    }

    /// Writes a tile whose chunk must exist, optionally re-deriving the
    /// pathmap cell.
    ///
    /// # Panics
    ///
    /// Panics if the chunk was never materialized or `layer` is `Invalid`.
    pub fn set_tile(&self, layer: Layer, position: Position, tile: TileId, recompute_path: bool) {
        self.update_tile(layer, position, |_| tile);
        if recompute_path {
            self.recompute_path(position);
        }
    }

    /// Atomically replaces a tile with `f(old)` and returns the new value.
    ///
    /// # Panics
    ///
    /// Panics if the chunk was never materialized or `layer` is `Invalid`.
    pub fn update_tile<F: FnOnce(TileId) -> TileId>(
        &self,
        layer: Layer,
        position: Position,
        f: F,
    ) -> TileId {
        let chunk_position = ChunkPosition::from(position);
        let chunk = self
            .layer_map(layer)
            .and_then(|map| find(map, chunk_position))
            .unwrap_or_else(|| {
                panic!("no {layer} chunk at {chunk_position}; ensure_all_chunks was skipped")
            });
        let index = LocalPosition::from_position(position).to_index();
        let mut cells = chunk.write();
        let updated = f(cells[index]);
        cells[index] = updated;
        updated
    }

    /// Copies the fluid at a position.
    #[must_use]
    pub fn copy_fluid_tile(&self, position: Position) -> Option<FluidTile> {
        let chunk = find(&self.fluids, ChunkPosition::from(position))?;
        Some(chunk.get(LocalPosition::from_position(position)))
    }

    /// Sets the fluid at a position. Returns `false` if the chunk does not exist.
    pub fn set_fluid(&self, position: Position, fluid: FluidTile) -> bool {
        match find(&self.fluids, ChunkPosition::from(position)) {
            Some(chunk) => {
                chunk.set(LocalPosition::from_position(position), fluid);
                true
            },
            None => false,
        }
    }

    /// Returns the biome at a position, materializing its chunk on demand.
    pub fn find_biome_type(&self, position: Position) -> BiomeType {
        ensure(&self.biomes, ChunkPosition::from(position))
            .get(LocalPosition::from_position(position))
    }

    /// Sets the biome at a position, materializing its chunk on demand.
    pub fn set_biome(&self, position: Position, biome: BiomeType) {
        ensure(&self.biomes, ChunkPosition::from(position))
            .set(LocalPosition::from_position(position), biome);
    }

    /// Runs `f` on the biome at a position while holding its chunk's
    /// writer lock, so a read and the write that depends on it are atomic.
    pub fn update_biome<R, F: FnOnce(&mut BiomeType) -> R>(&self, position: Position, f: F) -> R {
        let chunk = ensure(&self.biomes, ChunkPosition::from(position));
        let mut cells = chunk.write();
        f(&mut cells[LocalPosition::from_position(position).to_index()])
    }

    /// Reads the pathmap at a position.
    #[must_use]
    pub fn is_walkable(&self, position: Position) -> Option<bool> {
        let chunk = find(&self.paths, ChunkPosition::from(position))?;
        Some(chunk.get(LocalPosition::from_position(position)))
    }

    /// Derives walkability from every layer and tile-entity occupancy.
    ///
    /// Each layer read takes and releases its own locks; occupancy is asked
    /// last with no provider lock held.
    #[must_use]
    pub fn compute_walkable(&self, position: Position) -> bool {
        for layer in ALL_LAYERS {
            if let Some(tile) = self.try_tile(layer, position) {
                if !self.tileset.is_walkable(tile) {
                    return false;
                }
            }
        }
        let occupancy = Arc::clone(&self.occupancy.read());
        !occupancy.is_occupied(position)
    }

    /// Recomputes one pathmap cell. Returns the new flag, or `None` if the
    /// pathmap chunk does not exist.
    pub fn recompute_path(&self, position: Position) -> Option<bool> {
        let walkable = self.compute_walkable(position);
        let chunk = find(&self.paths, ChunkPosition::from(position))?;
        chunk.set(LocalPosition::from_position(position), walkable);
        Some(walkable)
    }

    /// Rebuilds the pathmap from scratch for every resident chunk in `range`.
    pub fn remake_path_map(&self, range: ChunkRange) {
        let mut rebuilt = 0usize;
        for chunk_position in range.positions() {
            let Some(chunk) = find(&self.paths, chunk_position) else {
                continue;
            };
            let mut flags = Vec::with_capacity(strata_common::CHUNK_AREA);
            chunk_position.iterate(|position| flags.push(self.compute_walkable(position)));
            chunk.write().copy_from_slice(&flags);
            rebuilt += 1;
        }
        debug!("Rebuilt pathmap for {rebuilt} chunks in {range:?}");
    }

    /// Rebuilds the pathmap of every resident chunk.
    pub fn remake_all_path_maps(&self) {
        for position in self.chunk_positions() {
            self.remake_path_map(ChunkRange::single(position));
        }
    }

    /// Raw terrain plane: every layer in [`ALL_LAYERS`] order.
    pub fn get_raw_terrain(&self, position: ChunkPosition) -> WorldResult<Vec<u8>> {
        let mut out = Vec::with_capacity(TERRAIN_PLANE_LEN);
        for map in &self.layers {
            find(map, position)
                .ok_or_else(|| missing(position))?
                .encode_into(&mut out);
        }
        Ok(out)
    }

    /// Raw biome plane.
    pub fn get_raw_biomes(&self, position: ChunkPosition) -> WorldResult<Vec<u8>> {
        Ok(find(&self.biomes, position).ok_or_else(|| missing(position))?.encode())
    }

    /// Raw fluid plane.
    pub fn get_raw_fluids(&self, position: ChunkPosition) -> WorldResult<Vec<u8>> {
        Ok(find(&self.fluids, position).ok_or_else(|| missing(position))?.encode())
    }

    /// Raw pathmap plane.
    pub fn get_raw_pathmap(&self, position: ChunkPosition) -> WorldResult<Vec<u8>> {
        Ok(find(&self.paths, position).ok_or_else(|| missing(position))?.encode())
    }

    /// All four raw planes of a chunk.
    pub fn get_chunk_set(&self, position: ChunkPosition) -> WorldResult<ChunkSet> {
        Ok(ChunkSet {
            terrain: self.get_raw_terrain(position)?,
            biomes: self.get_raw_biomes(position)?,
            fluids: self.get_raw_fluids(position)?,
            pathmap: self.get_raw_pathmap(position)?,
        })
    }

    /// Materializes or overwrites the chunk at `position` in every plane.
    ///
    /// All planes are decoded before anything is written, so malformed
    /// input leaves the provider untouched.
    pub fn absorb(&self, position: ChunkPosition, set: &ChunkSet) -> WorldResult<()> {
        set.validate()?;
        let layer_len = plane_len::<TileId>();
        let layers = set
            .terrain
            .chunks_exact(layer_len)
            .map(decode_plane::<TileId>)
            .collect::<WorldResult<Vec<_>>>()?;
        let biomes = decode_plane::<BiomeType>(&set.biomes)?;
        let fluids = decode_plane::<FluidTile>(&set.fluids)?;
        let paths = decode_plane::<bool>(&set.pathmap)?;

        for (map, cells) in self.layers.iter().zip(layers) {
            replace(map, position, cells)?;
        }
        replace(&self.biomes, position, biomes)?;
        replace(&self.fluids, position, fluids)?;
        replace(&self.paths, position, paths)?;
        debug!("Absorbed chunk {position}");
        Ok(())
    }
}
