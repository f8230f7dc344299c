//! Realms: one playable level with its tiles, tile-entities and entities.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strata_common::{ChunkPosition, GlobalId, Identifier, Position, RealmId};
use tracing::debug;

use crate::autotile;
use crate::layer::Layer;
use crate::provider::{Occupancy, TileProvider};
use crate::tileset::Tileset;

/// Entity type that survives realm deletion.
pub const PLAYER_ENTITY: &str = "base:entity/player";

/// Serialized realm metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealmMeta {
    /// Realm type, e.g. `base:realm/overworld`
    pub kind: Identifier,
    /// Generation seed
    pub seed: i64,
    /// Has weather and daylight
    #[serde(default)]
    pub outdoors: bool,
    /// Fields owned by higher layers
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl RealmMeta {
    /// Metadata for a realm of the given type.
    #[must_use]
    pub fn new(kind: impl Into<Identifier>, seed: i64) -> Self {
        Self {
            kind: kind.into(),
            seed,
            outdoors: true,
            extra: serde_json::Value::Null,
        }
    }
}

/// Facing of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Facing up
    Up = 0,
    /// Facing right
    Right = 1,
    /// Facing down
    #[default]
    Down = 2,
    /// Facing left
    Left = 3,
}

impl Direction {
    /// Convert from u8.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Right),
            2 => Some(Self::Down),
            3 => Some(Self::Left),
            _ => None,
        }
    }
}

/// A tile-entity as stored: position, type and opaque encoded state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileEntityRecord {
    /// Global ID
    pub global_id: GlobalId,
    /// Tile position
    pub position: Position,
    /// Tile shown for this tile-entity
    pub tile_id: Identifier,
    /// Tile-entity type
    pub type_id: Identifier,
    /// Blocks movement
    pub solid: bool,
    /// Encoded state owned by the simulation layer
    pub encoded: Vec<u8>,
}

/// An entity as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// Global ID
    pub global_id: GlobalId,
    /// Tile position
    pub position: Position,
    /// Entity type
    pub type_id: Identifier,
    /// Facing
    pub direction: Direction,
    /// Encoded state owned by the simulation layer
    pub encoded: Vec<u8>,
}

impl EntityRecord {
    /// Checks if this is a player entity.
    #[must_use]
    pub fn is_player(&self) -> bool {
        self.type_id.as_str() == PLAYER_ENTITY
    }
}

/// Tile-entities of a realm, indexed by ID and position.
#[derive(Debug, Default)]
pub struct TileEntityRegistry {
    inner: RwLock<TileEntityIndex>,
}

#[derive(Debug, Default)]
struct TileEntityIndex {
    by_id: AHashMap<GlobalId, TileEntityRecord>,
    by_position: AHashMap<Position, GlobalId>,
}

impl TileEntityRegistry {
    /// Adds or replaces a tile-entity. Returns the one it displaced at the
    /// same position, if any.
    pub fn insert(&self, record: TileEntityRecord) -> Option<TileEntityRecord> {
        let mut index = self.inner.write();
        if let Some(old) = index.by_id.get(&record.global_id).map(|old| old.position) {
            index.by_position.remove(&old);
        }
        let displaced = index
            .by_position
            .insert(record.position, record.global_id)
            .filter(|id| *id != record.global_id)
            .and_then(|id| index.by_id.remove(&id));
        index.by_id.insert(record.global_id, record);
        displaced
    }

    /// Removes a tile-entity by ID.
    pub fn remove(&self, id: GlobalId) -> Option<TileEntityRecord> {
        let mut index = self.inner.write();
        let record = index.by_id.remove(&id)?;
        index.by_position.remove(&record.position);
        Some(record)
    }

    /// Tile-entity at a position.
    #[must_use]
    pub fn at(&self, position: Position) -> Option<TileEntityRecord> {
        let index = self.inner.read();
        let id = index.by_position.get(&position)?;
        index.by_id.get(id).cloned()
    }

    /// Every tile-entity, sorted by ID.
    #[must_use]
    pub fn all(&self) -> Vec<TileEntityRecord> {
        let mut records: Vec<_> = self.inner.read().by_id.values().cloned().collect();
        records.sort_by_key(|record| record.global_id.raw());
        records
    }

    /// Number of tile-entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Checks if there are no tile-entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }
}

impl Occupancy for TileEntityRegistry {
    fn is_occupied(&self, position: Position) -> bool {
        let index = self.inner.read();
        index
            .by_position
            .get(&position)
            .and_then(|id| index.by_id.get(id))
            .is_some_and(|record| record.solid)
    }
}

/// Re-selects position-dependent tile variants.
pub trait Autotiler {
    /// Re-autotiles the tile at `position` on `layer`.
    fn autotile(&self, position: Position, layer: Layer);
}

/// One playable level.
#[derive(Debug)]
pub struct Realm {
    id: RealmId,
    meta: RwLock<RealmMeta>,
    tileset_hash: RwLock<String>,
    provider: TileProvider,
    tile_entities: Arc<TileEntityRegistry>,
    entities: RwLock<AHashMap<GlobalId, EntityRecord>>,
}

impl Realm {
    /// Creates an empty realm saved under the given tileset.
    #[must_use]
    pub fn new(id: RealmId, meta: RealmMeta, tileset: Arc<Tileset>) -> Self {
        let hash = tileset.hash().to_owned();
        Self::with_stored_hash(id, meta, tileset, hash)
    }

    /// Creates an empty realm whose data was saved under `stored_hash`,
    /// which may differ from the active tileset until migration runs.
    #[must_use]
    pub fn with_stored_hash(
        id: RealmId,
        meta: RealmMeta,
        tileset: Arc<Tileset>,
        stored_hash: String,
    ) -> Self {
        let tile_entities = Arc::new(TileEntityRegistry::default());
        let provider = TileProvider::new(tileset);
        provider.set_occupancy(Arc::clone(&tile_entities) as Arc<dyn Occupancy>);
        Self {
            id,
            meta: RwLock::new(meta),
            tileset_hash: RwLock::new(stored_hash),
            provider,
            tile_entities,
            entities: RwLock::new(AHashMap::new()),
        }
    }

    /// Realm ID.
    #[must_use]
    pub fn id(&self) -> RealmId {
        self.id
    }

    /// Tile storage.
    #[must_use]
    pub fn provider(&self) -> &TileProvider {
        &self.provider
    }

    /// Active tileset.
    #[must_use]
    pub fn tileset(&self) -> &Arc<Tileset> {
        self.provider.tileset()
    }

    /// Copy of the metadata document.
    #[must_use]
    pub fn meta(&self) -> RealmMeta {
        self.meta.read().clone()
    }

    /// Replaces the metadata document.
    pub fn set_meta(&self, meta: RealmMeta) {
        *self.meta.write() = meta;
    }

    /// Hash of the tileset the realm's chunk data is expressed in.
    #[must_use]
    pub fn tileset_hash(&self) -> String {
        self.tileset_hash.read().clone()
    }

    /// Records the tileset the realm's chunk data is expressed in.
    pub fn set_tileset_hash(&self, hash: impl Into<String>) {
        *self.tileset_hash.write() = hash.into();
    }

    /// Tile-entities of the realm.
    #[must_use]
    pub fn tile_entities(&self) -> &TileEntityRegistry {
        &self.tile_entities
    }

    /// Adds a tile-entity and re-derives the pathmap under it.
    pub fn add_tile_entity(&self, record: TileEntityRecord) {
        let position = record.position;
        self.tile_entities.insert(record);
        self.provider.recompute_path(position);
    }

    /// Removes a tile-entity and re-derives the pathmap under it.
    pub fn remove_tile_entity(&self, id: GlobalId) -> Option<TileEntityRecord> {
        let record = self.tile_entities.remove(id)?;
        self.provider.recompute_path(record.position);
        Some(record)
    }

    /// Adds or replaces an entity.
    pub fn add_entity(&self, record: EntityRecord) {
        self.entities.write().insert(record.global_id, record);
    }

    /// Removes an entity.
    pub fn remove_entity(&self, id: GlobalId) -> Option<EntityRecord> {
        self.entities.write().remove(&id)
    }

    /// Every entity, sorted by ID.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityRecord> {
        let mut records: Vec<_> = self.entities.read().values().cloned().collect();
        records.sort_by_key(|record| record.global_id.raw());
        records
    }

    /// Re-autotiles every family tile of every layer in one chunk.
    pub fn autotile_chunk(&self, chunk: ChunkPosition) {
        for (layer, position) in self.family_cells(chunk) {
            self.autotile(position, layer);
        }
        debug!("Autotiled chunk {chunk} of {}", self.id);
    }

    fn family_cells(&self, chunk: ChunkPosition) -> Vec<(Layer, Position)> {
        let tileset = self.tileset();
        let mut cells = Vec::new();
        for layer in crate::layer::ALL_LAYERS {
            chunk.iterate(|position| {
                if self
                    .provider
                    .try_tile(layer, position)
                    .is_some_and(|tile| tileset.autotile_family(tile).is_some())
                {
                    cells.push((layer, position));
                }
            });
        }
        cells
    }
}

impl Autotiler for Realm {
    fn autotile(&self, position: Position, layer: Layer) {
        autotile::autotile(&self.provider, position, layer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> Realm {
        let tileset = Tileset::builder("test:tileset")
            .tile(1, "base:tile/grass")
            .build()
            .expect("valid tileset");
        Realm::new(
            RealmId::new(1),
            RealmMeta::new("base:realm/overworld", 42),
            Arc::new(tileset),
        )
    }

    fn chest(position: Position, solid: bool) -> TileEntityRecord {
        TileEntityRecord {
            global_id: GlobalId::next(),
            position,
            tile_id: Identifier::from("base:tile/chest"),
            type_id: Identifier::from("base:te/chest"),
            solid,
            encoded: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_solid_tile_entity_blocks_path() {
        let realm = realm();
        let position = Position::new(2, 2);
        realm.provider().ensure_tile(position);
        realm.provider().set_tile(Layer::Terrain, position, 1, true);
        assert_eq!(realm.provider().is_walkable(position), Some(true));

        let record = chest(position, true);
        let id = record.global_id;
        realm.add_tile_entity(record);
        assert_eq!(realm.provider().is_walkable(position), Some(false));

        realm.remove_tile_entity(id);
        assert_eq!(realm.provider().is_walkable(position), Some(true));
    }

    #[test]
    fn test_non_solid_tile_entity_keeps_path() {
        let realm = realm();
        let position = Position::new(2, 3);
        realm.provider().ensure_tile(position);
        realm.add_tile_entity(chest(position, false));
        assert_eq!(realm.provider().is_walkable(position), Some(true));
    }

    #[test]
    fn test_registry_displaces_same_position() {
        let registry = TileEntityRegistry::default();
        let first = chest(Position::new(0, 0), true);
        let second = chest(Position::new(0, 0), false);
        registry.insert(first.clone());
        assert_eq!(registry.insert(second.clone()), Some(first));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.at(Position::new(0, 0)), Some(second));
    }

    #[test]
    fn test_registry_moves_entity() {
        let registry = TileEntityRegistry::default();
        let mut record = chest(Position::new(0, 0), true);
        registry.insert(record.clone());
        record.position = Position::new(5, 5);
        assert_eq!(registry.insert(record.clone()), None);
        assert_eq!(registry.at(Position::new(0, 0)), None);
        assert_eq!(registry.at(Position::new(5, 5)), Some(record));
    }

    #[test]
    fn test_meta_json_round_trip() {
        let meta = RealmMeta::new("base:realm/house", -7);
        let json = serde_json::to_string(&meta).expect("serialize");
        let back: RealmMeta = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, meta);
    }
}
