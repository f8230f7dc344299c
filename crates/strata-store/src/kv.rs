//! Ordered key-value backend.
//!
//! A write-mostly export store. Each chunk is one entry:
//! - key: `realmID ∥ chunkX ∥ chunkY`, three `i32` little-endian, 12 bytes
//! - value: terrain plane (every layer in storage order) ∥ biome plane ∥
//!   fluid plane
//!
//! The pathmap is derived state and is not stored; it is rebuilt when a
//! chunk is loaded. Realm tileset hashes and archived tilesets live in two
//! side tables so a realm exported here can still be migrated.

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use strata_common::{ChunkPosition, ChunkRange, RealmId, WorldError, WorldResult};
use strata_world::{
    ChunkSet, Realm, TileProvider, TilesetMeta, World, BIOME_PLANE_LEN, FLUID_PLANE_LEN,
    PATH_PLANE_LEN, TERRAIN_PLANE_LEN,
};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration::{short, TilesetArchive};

const CHUNKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("chunks");
const REALMS: TableDefinition<i32, &str> = TableDefinition::new("realms");
const TILESETS: TableDefinition<&str, &[u8]> = TableDefinition::new("tilesets");

/// Length of a chunk key.
pub const KEY_LEN: usize = 12;

/// Length of a chunk value.
pub const VALUE_LEN: usize = TERRAIN_PLANE_LEN + BIOME_PLANE_LEN + FLUID_PLANE_LEN;

/// Encodes a chunk key.
#[must_use]
pub fn chunk_key(realm: RealmId, position: ChunkPosition) -> [u8; KEY_LEN] {
    let mut key = [0; KEY_LEN];
    key[0..4].copy_from_slice(&realm.raw().to_le_bytes());
    key[4..8].copy_from_slice(&position.x.to_le_bytes());
    key[8..12].copy_from_slice(&position.y.to_le_bytes());
    key
}

/// Decodes a chunk key.
#[must_use]
pub fn parse_chunk_key(key: &[u8]) -> Option<(RealmId, ChunkPosition)> {
    let key: &[u8; KEY_LEN] = key.try_into().ok()?;
    let field = |at: usize| i32::from_le_bytes([key[at], key[at + 1], key[at + 2], key[at + 3]]);
    Some((RealmId::new(field(0)), ChunkPosition::new(field(4), field(8))))
}

/// Smallest and largest possible key of a realm. Every key of the realm
/// shares its 4-byte prefix, so they sort between these two.
fn realm_bounds(realm: RealmId) -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
    let mut low = [0x00; KEY_LEN];
    let mut high = [0xFF; KEY_LEN];
    low[..4].copy_from_slice(&realm.raw().to_le_bytes());
    high[..4].copy_from_slice(&realm.raw().to_le_bytes());
    (low, high)
}

/// Snapshots a chunk into its stored value.
pub fn encode_chunk(provider: &TileProvider, position: ChunkPosition) -> WorldResult<Vec<u8>> {
    let mut value = Vec::with_capacity(VALUE_LEN);
    value.extend_from_slice(&provider.get_raw_terrain(position)?);
    value.extend_from_slice(&provider.get_raw_biomes(position)?);
    value.extend_from_slice(&provider.get_raw_fluids(position)?);
    Ok(value)
}

/// Splits a stored value into planes. The pathmap comes back all blocked
/// until it is re-derived.
pub fn decode_chunk(value: &[u8]) -> WorldResult<ChunkSet> {
    if value.len() != VALUE_LEN {
        return Err(WorldError::InvalidData(format!(
            "chunk value is {} bytes, expected {VALUE_LEN}",
            value.len()
        )));
    }
    let (terrain, rest) = value.split_at(TERRAIN_PLANE_LEN);
    let (biomes, fluids) = rest.split_at(BIOME_PLANE_LEN);
    Ok(ChunkSet {
        terrain: terrain.to_vec(),
        biomes: biomes.to_vec(),
        fluids: fluids.to_vec(),
        pathmap: vec![0; PATH_PLANE_LEN],
    })
}

/// redb-backed chunk store.
pub struct KvStore {
    path: PathBuf,
    db: RwLock<Option<Database>>,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl KvStore {
    /// Opens (or creates) a store.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path)?;
        let txn = db.begin_write()?;
        txn.open_table(CHUNKS)?;
        txn.open_table(REALMS)?;
        txn.open_table(TILESETS)?;
        txn.commit()?;
        info!("Opened chunk export {}", path.display());
        Ok(Self {
            path,
            db: RwLock::new(Some(db)),
        })
    }

    /// Store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if the store has not been closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.db.read().is_some()
    }

    /// Closes the store. Closing twice is a no-op.
    pub fn close(&self) {
        if self.db.write().take().is_some() {
            info!("Closed chunk export {}", self.path.display());
        }
    }

    fn with_db<R>(&self, f: impl FnOnce(&Database) -> StoreResult<R>) -> StoreResult<R> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        f(db)
    }

    /// Writes one chunk.
    pub fn write_chunk(&self, realm: &Realm, position: ChunkPosition) -> StoreResult<()> {
        let key = chunk_key(realm.id(), position);
        let value = encode_chunk(realm.provider(), position)?;
        self.with_db(|db| {
            let txn = db.begin_write()?;
            txn.open_table(CHUNKS)?
                .insert(key.as_slice(), value.as_slice())?;
            txn.commit()?;
            Ok(())
        })?;
        debug!("Exported chunk {position} of {}", realm.id());
        Ok(())
    }

    /// Writes every resident chunk of a realm and its tileset hash in one
    /// transaction, archiving the active tileset if needed. Returns the
    /// number of chunks written.
    pub fn write_realm(&self, realm: &Realm) -> StoreResult<usize> {
        let positions = realm.provider().chunk_positions();
        let tileset = realm.tileset();
        let meta = bincode::serialize(&tileset.meta())?;
        let stored_hash = realm.tileset_hash();

        self.with_db(|db| {
            let txn = db.begin_write()?;
            {
                let mut chunks = txn.open_table(CHUNKS)?;
                for &position in &positions {
                    let key = chunk_key(realm.id(), position);
                    let value = encode_chunk(realm.provider(), position)?;
                    chunks.insert(key.as_slice(), value.as_slice())?;
                }
                txn.open_table(REALMS)?
                    .insert(realm.id().raw(), stored_hash.as_str())?;
                let mut tilesets = txn.open_table(TILESETS)?;
                if tilesets.get(tileset.hash())?.is_none() {
                    tilesets.insert(tileset.hash(), meta.as_slice())?;
                }
            }
            txn.commit()?;
            Ok(())
        })?;

        info!(
            "Exported {} with {} chunks under tileset {}",
            realm.id(),
            positions.len(),
            short(&stored_hash)
        );
        Ok(positions.len())
    }

    /// Writes every resident chunk of every resident realm. Returns the
    /// number of chunks written.
    pub fn write_all(&self, world: &World) -> StoreResult<usize> {
        let mut written = 0;
        for realm in world.realms() {
            written += self.write_realm(&realm)?;
        }
        info!("Exported {written} chunks from {} realms", world.loaded_count());
        Ok(written)
    }

    /// Reads one chunk.
    pub fn read_chunk(
        &self,
        realm: RealmId,
        position: ChunkPosition,
    ) -> StoreResult<Option<ChunkSet>> {
        let key = chunk_key(realm, position);
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(CHUNKS)?;
            let value = table.get(key.as_slice())?;
            Ok(value.map(|guard| decode_chunk(guard.value())).transpose()?)
        })
    }

    /// Reads every stored chunk of a realm, sorted by position.
    pub fn read_all_chunks(&self, realm: RealmId) -> StoreResult<Vec<(ChunkPosition, ChunkSet)>> {
        let (low, high) = realm_bounds(realm);
        let mut chunks = self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(CHUNKS)?;
            let mut chunks = Vec::new();
            for entry in table.range(low.as_slice()..=high.as_slice())? {
                let (key, value) = entry?;
                if let Some((_, position)) = parse_chunk_key(key.value()) {
                    chunks.push((position, decode_chunk(value.value())?));
                }
            }
            Ok(chunks)
        })?;
        chunks.sort_by_key(|(position, _)| *position);
        Ok(chunks)
    }

    /// Loads one stored chunk into a provider and re-derives its pathmap.
    /// Returns `false` if nothing is stored at `position`.
    pub fn load_chunk_into(
        &self,
        provider: &TileProvider,
        realm: RealmId,
        position: ChunkPosition,
    ) -> StoreResult<bool> {
        let Some(set) = self.read_chunk(realm, position)? else {
            return Ok(false);
        };
        provider.absorb(position, &set)?;
        provider.remake_path_map(ChunkRange::single(position));
        Ok(true)
    }

    /// Loads every stored chunk of a realm into it. Returns the number
    /// loaded.
    pub fn load_realm_chunks(&self, realm: &Realm) -> StoreResult<usize> {
        let chunks = self.read_all_chunks(realm.id())?;
        for (position, set) in &chunks {
            realm.provider().absorb(*position, set)?;
            realm.provider().remake_path_map(ChunkRange::single(*position));
        }
        debug!("Imported {} chunks of {}", chunks.len(), realm.id());
        Ok(chunks.len())
    }

    /// Hash of the tileset a realm was exported under.
    pub fn read_realm_tileset_hash(&self, realm: RealmId) -> StoreResult<String> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(REALMS)?;
            let hash = table.get(realm.raw())?.map(|guard| guard.value().to_owned());
            hash.ok_or(StoreError::RealmNotFound(realm))
        })
    }
}

impl TilesetArchive for KvStore {
    fn has_tileset(&self, hash: &str) -> StoreResult<bool> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(TILESETS)?;
            let found = table.get(hash)?.is_some();
            Ok(found)
        })
    }

    fn read_tileset_meta(&self, hash: &str) -> StoreResult<TilesetMeta> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(TILESETS)?;
            let meta = match table.get(hash)? {
                Some(guard) => bincode::deserialize(guard.value())?,
                None => return Err(StoreError::TilesetNotFound(hash.to_owned())),
            };
            Ok(meta)
        })
    }

    fn write_tileset_meta(&self, meta: &TilesetMeta) -> StoreResult<()> {
        let bytes = bincode::serialize(meta)?;
        self.with_db(|db| {
            let txn = db.begin_write()?;
            txn.open_table(TILESETS)?
                .insert(meta.hash.as_str(), bytes.as_slice())?;
            txn.commit()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{migrate_realm, MigrationOptions};
    use std::sync::Arc;
    use strata_common::Position;
    use strata_world::{FluidTile, Layer, RealmMeta, Tileset};
    use tempfile::TempDir;

    fn tileset() -> Arc<Tileset> {
        Arc::new(
            Tileset::builder("test:tileset")
                .tile(1, "base:tile/grass")
                .solid(2, "base:tile/stone_wall")
                .build()
                .expect("valid tileset"),
        )
    }

    fn store() -> (TempDir, KvStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KvStore::open(dir.path().join("export.redb")).expect("open");
        (dir, store)
    }

    #[test]
    fn test_key_layout() {
        let key = chunk_key(RealmId::new(1), ChunkPosition::new(-1, 2));
        assert_eq!(key, [1, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 2, 0, 0, 0]);
        assert_eq!(
            parse_chunk_key(&key),
            Some((RealmId::new(1), ChunkPosition::new(-1, 2)))
        );
        assert_eq!(parse_chunk_key(&key[..11]), None);
    }

    #[test]
    fn test_value_layout() {
        let provider = TileProvider::new(tileset());
        let position = ChunkPosition::new(0, 0);
        provider.ensure_all_chunks(position);
        provider.set_tile(Layer::Soil, Position::new(0, 0), 0x0201, false);
        provider.set_fluid(Position::new(0, 0), FluidTile::full(4));

        let value = encode_chunk(&provider, position).expect("encode");
        assert_eq!(value.len(), VALUE_LEN);
        let soil = TERRAIN_PLANE_LEN / 9;
        assert_eq!(&value[soil..soil + 2], &[0x01, 0x02]);
        let fluids = TERRAIN_PLANE_LEN + BIOME_PLANE_LEN;
        assert_eq!(&value[fluids..fluids + 4], &FluidTile::full(4).pack().to_le_bytes());
        assert!(decode_chunk(&value[1..]).is_err());
    }

    #[test]
    fn test_realm_export_and_import() {
        let (_dir, store) = store();
        let world = World::new(tileset());
        let realm = world.create_realm(RealmId::new(5), RealmMeta::new("base:realm/overworld", 0));
        let wall = Position::new(70, -3);
        realm.provider().ensure_tile(wall);
        realm.provider().ensure_all_chunks(ChunkPosition::new(0, 0));
        realm.provider().set_tile(Layer::Objects, wall, 2, true);
        world.create_realm(RealmId::new(6), RealmMeta::new("base:realm/cave", 0));

        assert_eq!(store.write_all(&world).expect("export"), 2);
        assert_eq!(
            store.read_realm_tileset_hash(realm.id()).expect("hash"),
            realm.tileset().hash()
        );

        let fresh = TileProvider::new(tileset());
        assert!(store
            .load_chunk_into(&fresh, realm.id(), ChunkPosition::from(wall))
            .expect("import"));
        assert_eq!(fresh.get_tile(Layer::Objects, wall), 2);
        assert_eq!(fresh.is_walkable(wall), Some(false));
        assert_eq!(fresh.is_walkable(wall.offset(1, 0)), Some(true));
        assert!(!store
            .load_chunk_into(&fresh, RealmId::new(6), ChunkPosition::from(wall))
            .expect("import"));

        let positions: Vec<_> = store
            .read_all_chunks(realm.id())
            .expect("scan")
            .into_iter()
            .map(|(position, _)| position)
            .collect();
        assert_eq!(positions, realm.provider().chunk_positions());
    }

    #[test]
    fn test_scan_stays_inside_realm() {
        let (_dir, store) = store();
        let tileset = tileset();
        for id in [-1, 0, 1] {
            let realm = Realm::new(
                RealmId::new(id),
                RealmMeta::new("base:realm/cave", 0),
                Arc::clone(&tileset),
            );
            realm.provider().ensure_all_chunks(ChunkPosition::new(i32::MIN, i32::MAX));
            realm.provider().ensure_all_chunks(ChunkPosition::new(3, -3));
            store.write_realm(&realm).expect("export");
        }
        assert_eq!(store.read_all_chunks(RealmId::new(0)).expect("scan").len(), 2);
        assert!(store.read_all_chunks(RealmId::new(2)).expect("scan").is_empty());
    }

    #[test]
    fn test_migration_from_export() {
        let (_dir, store) = store();
        let old = tileset();
        let realm = Realm::new(
            RealmId::new(1),
            RealmMeta::new("base:realm/overworld", 0),
            Arc::clone(&old),
        );
        realm.provider().ensure_all_chunks(ChunkPosition::new(0, 0));
        realm.provider().set_tile(Layer::Terrain, Position::new(1, 1), 1, false);
        store.write_realm(&realm).expect("export");

        let new = Arc::new(
            Tileset::builder("test:tileset")
                .tile(3, "base:tile/grass")
                .build()
                .expect("valid tileset"),
        );
        let stored = store.read_realm_tileset_hash(realm.id()).expect("hash");
        let loaded = Realm::with_stored_hash(realm.id(), realm.meta(), new, stored);
        assert_eq!(store.load_realm_chunks(&loaded).expect("import"), 1);

        let outcome = migrate_realm(&loaded, &store, MigrationOptions::default()).expect("migrate");
        assert!(outcome.is_migrated());
        assert_eq!(loaded.provider().get_tile(Layer::Terrain, Position::new(1, 1)), 3);
    }

    #[test]
    fn test_closed_store() {
        let (_dir, store) = store();
        store.close();
        store.close();
        assert!(!store.is_open());
        assert!(matches!(
            store.read_chunk(RealmId::new(1), ChunkPosition::new(0, 0)),
            Err(StoreError::Closed)
        ));
    }
}
