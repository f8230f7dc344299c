//! End-to-end tests for Strata persistence.
//!
//! These drive a realm through the same steps a server does: build it,
//! save it, reopen the database and load it again, possibly under a newer
//! tileset.

#![cfg(test)]

use std::sync::Arc;
use strata_common::{ChunkPosition, Position, RealmId};
use strata_world::{FluidTile, Layer, RealmMeta, Tileset, World};

use crate::config::StoreConfig;
use crate::error::{MigrationError, StoreError};
use crate::kv::KvStore;
use crate::migration::{MigrationOptions, TilesetArchive};
use crate::sqlite::SqliteStore;

const WATER: u16 = 1;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn overworld() -> Arc<Tileset> {
    Arc::new(
        Tileset::builder("base:tileset/overworld")
            .tile(1, "base:tile/grass")
            .solid(5, "base:tile/stone")
            .tile(6, "base:tile/sand")
            .build()
            .expect("valid tileset"),
    )
}

/// Same tiles as [`overworld`], renumbered, with stone moved to 11.
fn overworld_v2() -> Arc<Tileset> {
    Arc::new(
        Tileset::builder("base:tileset/overworld")
            .tile(2, "base:tile/grass")
            .tile(6, "base:tile/sand")
            .tile(9, "base:tile/clay")
            .solid(11, "base:tile/stone")
            .build()
            .expect("valid tileset"),
    )
}

/// Test suite for saving and reloading realms
mod round_trip_tests {
    use super::*;

    #[test]
    fn e2e_tile_and_fluid_survive_reopen() {
        init_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.db");
        let tileset = overworld();
        let grass = tileset.require("base:tile/grass").expect("grass");
        let spot = Position::new(3, 4);

        {
            let world = World::new(Arc::clone(&tileset));
            let realm =
                world.create_realm(RealmId::new(1), RealmMeta::new("base:realm/overworld", 99));
            realm.provider().ensure_all_chunks(ChunkPosition::new(0, 0));
            realm.provider().set_tile(Layer::Terrain, spot, grass, true);
            assert!(realm.provider().set_fluid(spot, FluidTile::full(WATER)));

            let store = SqliteStore::open(&path).expect("open");
            assert_eq!(store.write_all_realms(&world).expect("save"), 1);
            store.close().expect("close");
        }

        let store = SqliteStore::open(&path).expect("reopen");
        let realm = store
            .load_realm(RealmId::new(1), Arc::clone(&tileset), MigrationOptions::default())
            .expect("load");

        assert_eq!(realm.provider().get_tile(Layer::Terrain, spot), grass);
        let fluid = realm.provider().copy_fluid_tile(spot).expect("fluid chunk");
        assert_eq!(fluid.id, WATER);
        assert!(fluid.is_full());
        assert_eq!(realm.provider().is_walkable(spot), Some(true));
        assert_eq!(realm.meta().seed, 99);
    }

    #[test]
    fn e2e_config_drives_both_backends() {
        init_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("store.toml");
        StoreConfig {
            database_path: dir.path().join("world.db"),
            kv_path: Some(dir.path().join("export.redb")),
            force_migrate: false,
            flush_batch_chunks: 2,
        }
        .save_to(&config_path)
        .expect("save config");
        let config = StoreConfig::load_from(&config_path);

        let world = World::new(overworld());
        let realm = world.create_realm(RealmId::new(3), RealmMeta::new("base:realm/overworld", 0));
        for x in 0..5 {
            realm.provider().ensure_all_chunks(ChunkPosition::new(x, 0));
        }
        realm.provider().set_tile(Layer::Terrain, Position::new(200, 10), 6, true);

        let sqlite = SqliteStore::open(&config.database_path).expect("open sqlite");
        sqlite.write_realm(&realm).expect("save realm");
        let positions = realm.provider().chunk_positions();
        assert_eq!(
            sqlite
                .write_chunks(&realm, &positions, config.flush_batch_chunks)
                .expect("flush"),
            5
        );

        let kv_path = config.kv_path.as_ref().expect("kv path configured");
        let kv = KvStore::open(kv_path).expect("open kv");
        assert_eq!(kv.write_all(&world).expect("export"), 5);

        let relational = sqlite
            .get_chunk(realm.id(), ChunkPosition::new(3, 0))
            .expect("read")
            .expect("stored");
        let exported = kv
            .read_chunk(realm.id(), ChunkPosition::new(3, 0))
            .expect("read")
            .expect("stored");
        assert_eq!(relational.terrain, exported.terrain);
        assert_eq!(relational.biomes, exported.biomes);
        assert_eq!(relational.fluids, exported.fluids);
    }
}

/// Test suite for loading realms saved under an older tileset
mod migration_tests {
    use super::*;

    fn save_under_v1(path: &std::path::Path, extra: Option<(Position, &str)>) {
        let v1 = overworld();
        let world = World::new(Arc::clone(&v1));
        let realm = world.create_realm(RealmId::new(7), RealmMeta::new("base:realm/overworld", 1));
        realm.provider().ensure_all_chunks(ChunkPosition::new(0, 0));
        realm.provider().set_tile(Layer::Objects, Position::new(10, 10), 5, true);
        realm.provider().set_tile(Layer::Terrain, Position::new(10, 11), 1, true);
        if let Some((position, identifier)) = extra {
            let id = v1.require(identifier).expect("known tile");
            realm.provider().set_tile(Layer::Terrain, position, id, true);
        }

        let store = SqliteStore::open(path).expect("open");
        store.write_all_realms(&world).expect("save");
        store.close().expect("close");
    }

    #[test]
    fn e2e_stone_is_remapped_and_hash_updated() {
        init_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.db");
        save_under_v1(&path, None);

        let v1_hash = overworld().hash().to_owned();
        let v2 = overworld_v2();
        let store = SqliteStore::open(&path).expect("reopen");
        assert_eq!(store.read_realm_tileset_hash(RealmId::new(7)).expect("hash"), v1_hash);
        assert!(store.has_tileset(&v1_hash).expect("archived"));

        let realm = store
            .load_realm(RealmId::new(7), Arc::clone(&v2), MigrationOptions::default())
            .expect("load");
        assert_eq!(realm.provider().get_tile(Layer::Objects, Position::new(10, 10)), 11);
        assert_eq!(realm.provider().get_tile(Layer::Terrain, Position::new(10, 11)), 2);
        assert_eq!(realm.provider().is_walkable(Position::new(10, 10)), Some(false));
        assert_eq!(realm.tileset_hash(), v2.hash());
        assert_eq!(store.read_realm_tileset_hash(RealmId::new(7)).expect("hash"), v2.hash());

        // The migrated chunks were written back with the new hash.
        let stored = store
            .get_chunk(RealmId::new(7), ChunkPosition::new(0, 0))
            .expect("read")
            .expect("stored");
        assert_eq!(
            stored.terrain,
            realm.provider().get_raw_terrain(ChunkPosition::new(0, 0)).expect("raw")
        );

        // A second load is a no-op.
        let again = store
            .load_realm(RealmId::new(7), v2, MigrationOptions::default())
            .expect("reload");
        assert_eq!(again.provider().get_tile(Layer::Objects, Position::new(10, 10)), 11);
    }

    #[test]
    fn e2e_vanished_tile_refuses_load() {
        init_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.db");

        let v1 = Arc::new(
            Tileset::builder("base:tileset/overworld")
                .tile(1, "base:tile/grass")
                .tile(4, "base:tile/marsh")
                .build()
                .expect("valid tileset"),
        );
        {
            let world = World::new(Arc::clone(&v1));
            let realm =
                world.create_realm(RealmId::new(2), RealmMeta::new("base:realm/overworld", 0));
            realm.provider().ensure_all_chunks(ChunkPosition::new(0, 0));
            realm.provider().set_tile(Layer::Terrain, Position::new(0, 0), 4, true);
            let store = SqliteStore::open(&path).expect("open");
            store.write_all_realms(&world).expect("save");
        }

        let store = SqliteStore::open(&path).expect("reopen");
        let err = store
            .load_realm(RealmId::new(2), overworld_v2(), MigrationOptions::default())
            .expect_err("must refuse");
        match err {
            StoreError::Migration(MigrationError::UnresolvedTile { identifier, old_id }) => {
                assert_eq!(identifier, "base:tile/marsh");
                assert_eq!(old_id, 4);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.read_realm_tileset_hash(RealmId::new(2)).expect("hash"), v1.hash());

        let config = StoreConfig {
            force_migrate: true,
            ..StoreConfig::default()
        };
        let realm = store
            .load_realm(RealmId::new(2), overworld_v2(), config.migration_options())
            .expect("forced load");
        assert_eq!(realm.provider().get_tile(Layer::Terrain, Position::new(0, 0)), 0);
    }

    #[test]
    fn e2e_untouched_realm_loads_without_rewrite() {
        init_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.db");
        save_under_v1(&path, Some((Position::new(1, 1), "base:tile/sand")));

        let store = SqliteStore::open(&path).expect("reopen");
        let realm = store
            .load_realm(RealmId::new(7), overworld(), MigrationOptions::default())
            .expect("load");
        assert_eq!(realm.provider().get_tile(Layer::Terrain, Position::new(1, 1)), 6);
        assert_eq!(realm.tileset_hash(), overworld().hash());
    }
}
