//! Tile ID migration between tileset versions.
//!
//! Chunks store numeric tile IDs, and content updates are free to renumber
//! tiles. Every realm row records the hash of the tileset its chunks were
//! written under, and every such tileset's name table is archived. When a
//! realm is loaded under a different tileset, each stored ID is translated
//! through its identifier to the ID the active tileset assigns.
//!
//! Migration runs in two phases. The plan phase remaps every resident chunk
//! of every layer into fresh buffers, taking each chunk's reader lock for
//! one chunk at a time; an unresolvable tile aborts here, before anything
//! was written. The commit phase copies the planned buffers back, then
//! re-autotiles and rebuilds the pathmap of every rewritten chunk.

use ahash::AHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use strata_common::{ChunkPosition, ChunkRange, Identifier, TileId};
use strata_world::layer::{Layer, ALL_LAYERS};
use strata_world::{Realm, TileChunk, TileProvider, Tileset, TilesetMeta};
use tracing::{debug, info, warn};

use crate::error::{MigrationError, StoreError, StoreResult};

/// Archived tileset name tables, keyed by tileset hash.
pub trait TilesetArchive {
    /// Checks if a tileset has been archived.
    fn has_tileset(&self, hash: &str) -> StoreResult<bool>;

    /// Reads an archived tileset. Fails with
    /// [`StoreError::TilesetNotFound`] if it was never written.
    fn read_tileset_meta(&self, hash: &str) -> StoreResult<TilesetMeta>;

    /// Archives a tileset, replacing any previous copy.
    fn write_tileset_meta(&self, meta: &TilesetMeta) -> StoreResult<()>;

    /// Archives the tileset unless it already is. Returns `true` if written.
    fn archive_tileset(&self, tileset: &Tileset) -> StoreResult<bool> {
        if self.has_tileset(tileset.hash())? {
            return Ok(false);
        }
        self.write_tileset_meta(&tileset.meta())?;
        info!("Archived tileset {} ({})", tileset.name(), short(tileset.hash()));
        Ok(true)
    }
}

/// Per-run migration settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Rewrite unresolvable tiles to the empty tile instead of aborting
    pub force: bool,
}

/// What a migration run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Tileset hash the chunks were stored under
    pub from_hash: String,
    /// Active tileset hash
    pub to_hash: String,
    /// Every distinct old ID that was rewritten to a different ID
    pub remapped: BTreeMap<TileId, TileId>,
    /// Old IDs replaced by the empty tile, with their old identifier if known
    pub forced: BTreeMap<TileId, Option<Identifier>>,
    /// Chunk positions with at least one rewritten cell
    pub chunks: BTreeSet<ChunkPosition>,
}

impl MigrationReport {
    fn new(from_hash: String, to_hash: String) -> Self {
        Self {
            from_hash,
            to_hash,
            remapped: BTreeMap::new(),
            forced: BTreeMap::new(),
            chunks: BTreeSet::new(),
        }
    }

    /// Checks if any tile was replaced by the empty tile.
    #[must_use]
    pub fn is_lossy(&self) -> bool {
        !self.forced.is_empty()
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Stored hash already matches the active tileset
    UpToDate,
    /// Chunks were rewritten and the stored hash updated
    Migrated(MigrationReport),
}

impl MigrationOutcome {
    /// Checks if the realm was rewritten.
    #[must_use]
    pub fn is_migrated(&self) -> bool {
        matches!(self, Self::Migrated(_))
    }
}

/// Builds the old ID to new ID table.
///
/// An identifier missing from the active tileset falls back to the base
/// variant of its old autotile family when that family still exists. The
/// old empty tile always maps to the new empty tile.
#[must_use]
pub fn build_migration_map(old: &TilesetMeta, current: &Tileset) -> AHashMap<TileId, TileId> {
    let mut map = AHashMap::with_capacity(old.names.len());
    for (&old_id, identifier) in &old.names {
        let new_id = current.id(identifier).or_else(|| {
            old.family_of(identifier)
                .and_then(|family| current.family(family))
                .map(|family| family.base())
        });
        if let Some(new_id) = new_id {
            map.insert(old_id, new_id);
        }
    }
    map.insert(old.empty, current.empty_id());
    map
}

struct PlannedChunk {
    layer: Layer,
    position: ChunkPosition,
    chunk: Arc<TileChunk>,
    cells: Vec<TileId>,
}

/// Rewrites a realm's stored tile IDs to the active tileset.
pub struct MigrationEngine<'a, A: TilesetArchive + ?Sized> {
    archive: &'a A,
    options: MigrationOptions,
}

impl<'a, A: TilesetArchive + ?Sized> MigrationEngine<'a, A> {
    /// Creates an engine reading old tilesets from `archive`.
    pub fn new(archive: &'a A, options: MigrationOptions) -> Self {
        Self { archive, options }
    }

    /// Migrates a realm that is not yet online.
    ///
    /// On error the realm's tiles and stored hash are unchanged; the caller
    /// must not bring the realm online.
    pub fn migrate(&self, realm: &Realm) -> Result<MigrationOutcome, MigrationError> {
        let tileset = realm.tileset();
        let current = tileset.hash();
        let stored = realm.tileset_hash();
        if stored == current {
            debug!("{} is up to date with tileset {}", realm.id(), tileset.name());
            return Ok(MigrationOutcome::UpToDate);
        }

        let old = match self.archive.read_tileset_meta(&stored) {
            Ok(meta) => meta,
            Err(StoreError::TilesetNotFound(hash)) => {
                return Err(MigrationError::MissingTileset { hash });
            },
            Err(e) => return Err(e.into()),
        };
        info!(
            "Migrating {} from tileset {} ({}) to {} ({})",
            realm.id(),
            old.name,
            short(&stored),
            tileset.name(),
            short(current)
        );

        let map = build_migration_map(&old, tileset);
        let mut report = MigrationReport::new(stored, current.to_owned());
        let plan = self.plan(realm.provider(), &old, &map, &mut report)?;

        for planned in plan {
            planned.chunk.write().copy_from_slice(&planned.cells);
            debug!("Rewrote {} chunk {}", planned.layer, planned.position);
            report.chunks.insert(planned.position);
        }
        for &position in &report.chunks {
            realm.autotile_chunk(position);
            realm.provider().remake_path_map(ChunkRange::single(position));
        }
        realm.set_tileset_hash(current);

        info!(
            "Migrated {}: {} chunks rewritten, {} IDs remapped, {} forced to empty",
            realm.id(),
            report.chunks.len(),
            report.remapped.len(),
            report.forced.len()
        );
        Ok(MigrationOutcome::Migrated(report))
    }

    fn plan(
        &self,
        provider: &TileProvider,
        old: &TilesetMeta,
        map: &AHashMap<TileId, TileId>,
        report: &mut MigrationReport,
    ) -> Result<Vec<PlannedChunk>, MigrationError> {
        let empty = provider.tileset().empty_id();
        let mut plan = Vec::new();
        for layer in ALL_LAYERS {
            for (position, chunk) in provider.layer_chunks(layer) {
                let mut changed = false;
                let cells = {
                    let current = chunk.read();
                    let mut cells = Vec::with_capacity(current.len());
                    for &old_id in current.iter() {
                        let new_id = self.resolve(old_id, old, map, empty, report)?;
                        changed |= new_id != old_id;
                        cells.push(new_id);
                    }
                    cells
                };
                if changed {
                    plan.push(PlannedChunk {
                        layer,
                        position,
                        chunk,
                        cells,
                    });
                }
            }
        }
        Ok(plan)
    }

    fn resolve(
        &self,
        old_id: TileId,
        old: &TilesetMeta,
        map: &AHashMap<TileId, TileId>,
        empty: TileId,
        report: &mut MigrationReport,
    ) -> Result<TileId, MigrationError> {
        if let Some(&new_id) = map.get(&old_id) {
            if new_id != old_id && report.remapped.insert(old_id, new_id).is_none() {
                match old.names.get(&old_id) {
                    Some(identifier) => info!("Remapping {identifier}: {old_id} -> {new_id}"),
                    None => info!("Remapping empty tile: {old_id} -> {new_id}"),
                }
            }
            return Ok(new_id);
        }

        let identifier = old.names.get(&old_id);
        if !self.options.force {
            return Err(match identifier {
                Some(identifier) => MigrationError::UnresolvedTile {
                    identifier: identifier.to_string(),
                    old_id,
                },
                None => MigrationError::UnknownTileId { old_id },
            });
        }
        if report.forced.insert(old_id, identifier.cloned()).is_none() {
            match identifier {
                Some(identifier) => {
                    warn!("Force-migrating {identifier} (old ID {old_id}) to the empty tile");
                },
                None => warn!("Force-migrating unknown old ID {old_id} to the empty tile"),
            }
        }
        Ok(empty)
    }
}

/// Migrates one realm with a one-off engine.
pub fn migrate_realm<A: TilesetArchive + ?Sized>(
    realm: &Realm,
    archive: &A,
    options: MigrationOptions,
) -> Result<MigrationOutcome, MigrationError> {
    MigrationEngine::new(archive, options).migrate(realm)
}

/// First 12 hex digits of a hash, for logs.
pub(crate) fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
