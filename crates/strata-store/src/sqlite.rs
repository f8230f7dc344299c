//! Relational backend.
//!
//! One SQLite database holds every realm. Multi-statement saves always run
//! inside a transaction, and the connection sits behind a mutex so two
//! threads never interleave statements of different transactions.
//!
//! | table          | key                       | contents                                |
//! |----------------|---------------------------|-----------------------------------------|
//! | `chunks`       | `(realmID, x, y)`         | terrain, biome, fluid and pathmap blobs |
//! | `realms`       | `realmID`                 | metadata JSON, tileset hash             |
//! | `tilesets`     | `hash`                    | archived [`TilesetMeta`] JSON           |
//! | `tileEntities` | `globalID`                | realm, position, tile, type, state      |
//! | `entities`     | `globalID`                | realm, position, type, facing, state    |
//! | `users`        | `username`                | player record                           |
//! | `villages`     | `villageID`               | settlement record                       |

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_common::{
    check_format, ChunkPosition, FormatCompatibility, GlobalId, Identifier, Position, RealmId,
    DATABASE_FORMAT_VERSION,
};
use strata_world::{
    ChunkSet, Direction, EntityRecord, Realm, RealmMeta, TileEntityRecord, Tileset, TilesetMeta,
    World, PLAYER_ENTITY,
};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::migration::{short, MigrationEngine, MigrationOptions, TilesetArchive};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    realmID INTEGER NOT NULL,
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    terrain BLOB NOT NULL,
    biomes BLOB NOT NULL,
    fluids BLOB NOT NULL,
    pathmap BLOB NOT NULL,
    PRIMARY KEY (realmID, x, y)
);
CREATE TABLE IF NOT EXISTS realms (
    realmID INTEGER PRIMARY KEY,
    json TEXT NOT NULL,
    tilesetHash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tilesets (
    hash TEXT PRIMARY KEY,
    json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tileEntities (
    globalID INTEGER PRIMARY KEY,
    realmID INTEGER NOT NULL,
    "row" INTEGER NOT NULL,
    col INTEGER NOT NULL,
    tileID TEXT NOT NULL,
    typeID TEXT NOT NULL,
    solid INTEGER NOT NULL DEFAULT 0,
    encoded BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS tileEntitiesByRealm ON tileEntities (realmID);
CREATE TABLE IF NOT EXISTS entities (
    globalID INTEGER PRIMARY KEY,
    realmID INTEGER NOT NULL,
    "row" INTEGER NOT NULL,
    col INTEGER NOT NULL,
    typeID TEXT NOT NULL,
    direction INTEGER NOT NULL,
    encoded BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS entitiesByRealm ON entities (realmID);
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    displayName TEXT NOT NULL,
    encoded BLOB NOT NULL,
    releasePosition TEXT,
    releaseRealm INTEGER
);
CREATE TABLE IF NOT EXISTS villages (
    villageID INTEGER PRIMARY KEY,
    realmID INTEGER NOT NULL,
    encoded BLOB NOT NULL
);
"#;

const TABLES: [&str; 7] = [
    "chunks",
    "realms",
    "tilesets",
    "tileEntities",
    "entities",
    "users",
    "villages",
];

/// A player account as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Login name
    pub username: String,
    /// Name shown to other players
    pub display_name: String,
    /// Encoded state owned by the account layer
    pub encoded: Vec<u8>,
    /// Where the player reappears after logging back in
    pub release_position: Option<Position>,
    /// Realm of `release_position`
    pub release_realm: Option<RealmId>,
}

/// A settlement as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VillageRecord {
    /// Village ID
    pub id: i64,
    /// Realm the village lies in
    pub realm: RealmId,
    /// Encoded state owned by the settlement layer
    pub encoded: Vec<u8>,
}

/// SQLite-backed realm store.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a database, bringing its schema to the current
    /// format version.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path)?;
        prepare_schema(&mut conn)?;
        info!("Opened realm database {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if the store has not been closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&self) -> StoreResult<()> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, e)| e)?;
            info!("Closed realm database {}", self.path.display());
        }
        Ok(())
    }

    fn with_conn<R>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<R>) -> StoreResult<R> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// On-disk format version.
    pub fn format_version(&self) -> StoreResult<u32> {
        self.with_conn(|conn| Ok(read_user_version(conn)?))
    }

    /// Writes one chunk's four planes.
    ///
    /// With `use_transaction` the upsert runs in its own transaction;
    /// otherwise it autocommits. Batches go through [`Self::write_chunks`].
    pub fn write_chunk(
        &self,
        realm: &Realm,
        position: ChunkPosition,
        use_transaction: bool,
    ) -> StoreResult<()> {
        let set = realm.provider().get_chunk_set(position)?;
        self.with_conn(|conn| {
            if use_transaction {
                let tx = conn.transaction()?;
                upsert_chunk(&tx, realm.id(), position, &set)?;
                tx.commit()?;
            } else {
                upsert_chunk(conn, realm.id(), position, &set)?;
            }
            Ok(())
        })?;
        debug!("Wrote chunk {position} of {}", realm.id());
        Ok(())
    }

    /// Writes the given chunks, `batch_size` chunks per transaction.
    /// Returns the number written.
    pub fn write_chunks(
        &self,
        realm: &Realm,
        positions: &[ChunkPosition],
        batch_size: usize,
    ) -> StoreResult<usize> {
        for batch in positions.chunks(batch_size.max(1)) {
            self.with_conn(|conn| {
                let tx = conn.transaction()?;
                for &position in batch {
                    let set = realm.provider().get_chunk_set(position)?;
                    upsert_chunk(&tx, realm.id(), position, &set)?;
                }
                tx.commit()?;
                Ok(())
            })?;
        }
        debug!("Flushed {} chunks of {}", positions.len(), realm.id());
        Ok(positions.len())
    }

    /// Reads one chunk's four planes.
    pub fn get_chunk(
        &self,
        realm: RealmId,
        position: ChunkPosition,
    ) -> StoreResult<Option<ChunkSet>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT terrain, biomes, fluids, pathmap FROM chunks
                     WHERE realmID = ?1 AND x = ?2 AND y = ?3",
                    params![realm.raw(), position.x, position.y],
                    |row| chunk_set(row, 0),
                )
                .optional()?)
        })
    }

    /// Reads every stored chunk of a realm, sorted by position.
    pub fn read_all_chunks(&self, realm: RealmId) -> StoreResult<Vec<(ChunkPosition, ChunkSet)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT x, y, terrain, biomes, fluids, pathmap FROM chunks
                 WHERE realmID = ?1 ORDER BY x, y",
            )?;
            let rows = stmt.query_map(params![realm.raw()], |row| {
                Ok((ChunkPosition::new(row.get(0)?, row.get(1)?), chunk_set(row, 2)?))
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Writes a realm's metadata, every resident chunk, its tile-entities
    /// and its entities in one transaction. The active tileset is archived
    /// if it was not yet.
    ///
    /// A realm whose chunks are still in an older tileset is only written
    /// if that tileset's table is archived too; otherwise nothing is written
    /// and [`StoreError::TilesetNotFound`] is returned.
    pub fn write_realm(&self, realm: &Realm) -> StoreResult<()> {
        let json = serde_json::to_string(&realm.meta())?;
        let stored_hash = realm.tileset_hash();
        let tileset = realm.tileset();
        let tileset_json = serde_json::to_string(&tileset.meta())?;
        let positions = realm.provider().chunk_positions();
        let id = realm.id().raw();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO realms (realmID, json, tilesetHash) VALUES (?1, ?2, ?3)",
                params![id, json, stored_hash],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO tilesets (hash, json) VALUES (?1, ?2)",
                params![tileset.hash(), tileset_json],
            )?;
            if stored_hash != tileset.hash() && !tileset_archived(&tx, &stored_hash)? {
                return Err(StoreError::TilesetNotFound(stored_hash.clone()));
            }
            for &position in &positions {
                let set = realm.provider().get_chunk_set(position)?;
                upsert_chunk(&tx, realm.id(), position, &set)?;
            }

            tx.execute("DELETE FROM tileEntities WHERE realmID = ?1", params![id])?;
            for record in realm.tile_entities().all() {
                tx.execute(
                    r#"INSERT OR REPLACE INTO tileEntities
                       (globalID, realmID, "row", col, tileID, typeID, solid, encoded)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        record.global_id.raw() as i64,
                        id,
                        record.position.y,
                        record.position.x,
                        record.tile_id.as_str(),
                        record.type_id.as_str(),
                        record.solid,
                        record.encoded,
                    ],
                )?;
            }

            tx.execute("DELETE FROM entities WHERE realmID = ?1", params![id])?;
            for record in realm.entities() {
                tx.execute(
                    r#"INSERT OR REPLACE INTO entities
                       (globalID, realmID, "row", col, typeID, direction, encoded)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        record.global_id.raw() as i64,
                        id,
                        record.position.y,
                        record.position.x,
                        record.type_id.as_str(),
                        record.direction as u8,
                        record.encoded,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })?;

        info!(
            "Wrote {} with {} chunks under tileset {}",
            realm.id(),
            positions.len(),
            short(&realm.tileset_hash())
        );
        Ok(())
    }

    /// Writes every resident realm, one transaction each. Returns the
    /// number of realms written.
    pub fn write_all_realms(&self, world: &World) -> StoreResult<usize> {
        let realms = world.realms();
        for realm in &realms {
            self.write_realm(realm)?;
        }
        Ok(realms.len())
    }

    /// Loads a realm: metadata, every stored chunk, tile-entities and
    /// entities. The pathmap is re-derived and the chunks are migrated to
    /// `tileset` if they were saved under another one; a migrated realm is
    /// written back before it is returned.
    pub fn load_realm(
        &self,
        id: RealmId,
        tileset: Arc<Tileset>,
        options: MigrationOptions,
    ) -> StoreResult<Realm> {
        let (meta, stored_hash) = self.read_realm_row(id)?;
        let realm = Realm::with_stored_hash(id, meta, tileset, stored_hash);

        let chunks = self.read_all_chunks(id)?;
        for (position, set) in &chunks {
            realm.provider().absorb(*position, set)?;
        }
        for record in self.read_tile_entities(id)? {
            realm.tile_entities().insert(record);
        }
        for record in self.read_entities(id)? {
            realm.add_entity(record);
        }
        realm.provider().remake_all_path_maps();

        let outcome = MigrationEngine::new(self, options).migrate(&realm)?;
        if outcome.is_migrated() {
            self.write_realm(&realm)?;
        }
        info!("Loaded {} with {} chunks", id, chunks.len());
        Ok(realm)
    }

    fn read_realm_row(&self, id: RealmId) -> StoreResult<(RealmMeta, String)> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT json, tilesetHash FROM realms WHERE realmID = ?1",
                    params![id.raw()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?)
        })?;
        let (json, hash) = row.ok_or(StoreError::RealmNotFound(id))?;
        Ok((serde_json::from_str(&json)?, hash))
    }

    /// Checks if a realm row exists.
    pub fn has_realm(&self, id: RealmId) -> StoreResult<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM realms WHERE realmID = ?1",
                    params![id.raw()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    /// Every stored realm ID, ascending.
    pub fn realm_ids(&self) -> StoreResult<Vec<RealmId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT realmID FROM realms ORDER BY realmID")?;
            let rows = stmt.query_map([], |row| Ok(RealmId::new(row.get(0)?)))?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Hash of the tileset a realm's chunks were saved under.
    pub fn read_realm_tileset_hash(&self, id: RealmId) -> StoreResult<String> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT tilesetHash FROM realms WHERE realmID = ?1",
                    params![id.raw()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?
        .ok_or(StoreError::RealmNotFound(id))
    }

    /// Overwrites a realm's stored tileset hash.
    pub fn update_realm_tileset_hash(&self, id: RealmId, hash: &str) -> StoreResult<()> {
        let updated = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE realms SET tilesetHash = ?2 WHERE realmID = ?1",
                params![id.raw(), hash],
            )?)
        })?;
        if updated == 0 {
            return Err(StoreError::RealmNotFound(id));
        }
        Ok(())
    }

    /// Removes a realm's row, chunks and tile-entities, and every entity in
    /// it except players.
    pub fn delete_realm(&self, id: RealmId) -> StoreResult<()> {
        let chunks = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let chunks = tx.execute("DELETE FROM chunks WHERE realmID = ?1", params![id.raw()])?;
            tx.execute("DELETE FROM tileEntities WHERE realmID = ?1", params![id.raw()])?;
            tx.execute(
                "DELETE FROM entities WHERE realmID = ?1 AND typeID != ?2",
                params![id.raw(), PLAYER_ENTITY],
            )?;
            tx.execute("DELETE FROM realms WHERE realmID = ?1", params![id.raw()])?;
            tx.commit()?;
            Ok(chunks)
        })?;
        info!("Deleted {id} ({chunks} chunks)");
        Ok(())
    }

    /// Stored tile-entities of a realm, sorted by ID.
    pub fn read_tile_entities(&self, realm: RealmId) -> StoreResult<Vec<TileEntityRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT globalID, "row", col, tileID, typeID, solid, encoded
                   FROM tileEntities WHERE realmID = ?1 ORDER BY globalID"#,
            )?;
            let rows = stmt.query_map(params![realm.raw()], |row| {
                Ok(TileEntityRecord {
                    global_id: GlobalId::from_raw(row.get::<_, i64>(0)? as u64),
                    position: Position::new(row.get(2)?, row.get(1)?),
                    tile_id: Identifier::new(row.get::<_, String>(3)?),
                    type_id: Identifier::new(row.get::<_, String>(4)?),
                    solid: row.get(5)?,
                    encoded: row.get(6)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Stored entities of a realm, sorted by ID.
    pub fn read_entities(&self, realm: RealmId) -> StoreResult<Vec<EntityRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT globalID, "row", col, typeID, direction, encoded
                   FROM entities WHERE realmID = ?1 ORDER BY globalID"#,
            )?;
            let rows = stmt.query_map(params![realm.raw()], |row| {
                Ok(EntityRecord {
                    global_id: GlobalId::from_raw(row.get::<_, i64>(0)? as u64),
                    position: Position::new(row.get(2)?, row.get(1)?),
                    type_id: Identifier::new(row.get::<_, String>(3)?),
                    direction: direction(row, 4)?,
                    encoded: row.get(5)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Inserts or replaces a user.
    pub fn write_user(&self, user: &UserRecord) -> StoreResult<()> {
        let release_position = user
            .release_position
            .map(|position| serde_json::to_string(&position))
            .transpose()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO users
                 (username, displayName, encoded, releasePosition, releaseRealm)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.username,
                    user.display_name,
                    user.encoded,
                    release_position,
                    user.release_realm.map(RealmId::raw),
                ],
            )?;
            Ok(())
        })
    }

    /// Reads a user.
    pub fn read_user(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT displayName, encoded, releasePosition, releaseRealm
                     FROM users WHERE username = ?1",
                    params![username],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Vec<u8>>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<i32>>(3)?,
                        ))
                    },
                )
                .optional()?)
        })?;
        let Some((display_name, encoded, release_position, release_realm)) = row else {
            return Ok(None);
        };
        Ok(Some(UserRecord {
            username: username.to_owned(),
            display_name,
            encoded,
            release_position: release_position
                .map(|json| serde_json::from_str(&json))
                .transpose()?,
            release_realm: release_realm.map(RealmId::new),
        }))
    }

    /// Inserts or replaces a village.
    pub fn write_village(&self, village: &VillageRecord) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO villages (villageID, realmID, encoded) VALUES (?1, ?2, ?3)",
                params![village.id, village.realm.raw(), village.encoded],
            )?;
            Ok(())
        })
    }

    /// Villages of a realm, sorted by ID.
    pub fn read_villages(&self, realm: RealmId) -> StoreResult<Vec<VillageRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT villageID, encoded FROM villages WHERE realmID = ?1 ORDER BY villageID",
            )?;
            let rows = stmt.query_map(params![realm.raw()], |row| {
                Ok(VillageRecord {
                    id: row.get(0)?,
                    realm,
                    encoded: row.get(1)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

impl TilesetArchive for SqliteStore {
    fn has_tileset(&self, hash: &str) -> StoreResult<bool> {
        self.with_conn(|conn| Ok(tileset_archived(conn, hash)?))
    }

    fn read_tileset_meta(&self, hash: &str) -> StoreResult<TilesetMeta> {
        let json = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT json FROM tilesets WHERE hash = ?1",
                    params![hash],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;
        let json = json.ok_or_else(|| StoreError::TilesetNotFound(hash.to_owned()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_tileset_meta(&self, meta: &TilesetMeta) -> StoreResult<()> {
        let json = serde_json::to_string(meta)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO tilesets (hash, json) VALUES (?1, ?2)",
                params![meta.hash, json],
            )?;
            Ok(())
        })
    }
}

fn upsert_chunk(
    conn: &Connection,
    realm: RealmId,
    position: ChunkPosition,
    set: &ChunkSet,
) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO chunks (realmID, x, y, terrain, biomes, fluids, pathmap)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            realm.raw(),
            position.x,
            position.y,
            set.terrain,
            set.biomes,
            set.fluids,
            set.pathmap,
        ],
    )?;
    Ok(())
}

fn chunk_set(row: &Row<'_>, first: usize) -> rusqlite::Result<ChunkSet> {
    Ok(ChunkSet {
        terrain: row.get(first)?,
        biomes: row.get(first + 1)?,
        fluids: row.get(first + 2)?,
        pathmap: row.get(first + 3)?,
    })
}

fn tileset_archived(conn: &Connection, hash: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM tilesets WHERE hash = ?1", params![hash], |_| Ok(()))
        .optional()?
        .is_some())
}

fn direction(row: &Row<'_>, index: usize) -> rusqlite::Result<Direction> {
    let raw: u8 = row.get(index)?;
    Direction::from_u8(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Integer,
            format!("invalid entity direction {raw}").into(),
        )
    })
}

fn read_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Brings the schema to [`DATABASE_FORMAT_VERSION`].
fn prepare_schema(conn: &mut Connection) -> StoreResult<()> {
    let stored = read_user_version(conn)?;
    let mut compatibility = check_format(stored);
    // Tables without a version predate format versioning.
    if compatibility == FormatCompatibility::Fresh && table_exists(conn, "chunks")? {
        compatibility = FormatCompatibility::Rebuild;
    }

    let tx = conn.transaction()?;
    match compatibility {
        FormatCompatibility::Fresh => {
            tx.execute_batch(SCHEMA)?;
            info!("Created database schema v{DATABASE_FORMAT_VERSION}");
        },
        FormatCompatibility::Current => {
            debug!("Database schema is current (v{stored})");
        },
        FormatCompatibility::Migrate => {
            migrate_schema(&tx, stored)?;
            info!("Migrated database schema v{stored} -> v{DATABASE_FORMAT_VERSION}");
        },
        FormatCompatibility::Rebuild => {
            warn!("Database schema v{stored} is too old to migrate; rebuilding");
            for table in TABLES {
                tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
            }
            tx.execute_batch(SCHEMA)?;
        },
        FormatCompatibility::TooNew => {
            return Err(StoreError::FormatTooNew {
                found: stored,
                current: DATABASE_FORMAT_VERSION,
            });
        },
    }
    tx.pragma_update(None, "user_version", DATABASE_FORMAT_VERSION)?;
    tx.commit()?;
    Ok(())
}

/// Targeted schema changes from one migratable version to the next.
fn migrate_schema(conn: &Connection, from: u32) -> StoreResult<()> {
    if from < 2
        && table_exists(conn, "tileEntities")?
        && !column_exists(conn, "tileEntities", "solid")?
    {
        conn.execute_batch(
            "ALTER TABLE tileEntities ADD COLUMN solid INTEGER NOT NULL DEFAULT 0;",
        )?;
    }
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
