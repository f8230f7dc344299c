//! The set of resident realms.

use dashmap::DashMap;
use std::sync::Arc;
use strata_common::RealmId;
use tracing::info;

use crate::realm::{Realm, RealmMeta};
use crate::tileset::Tileset;

/// Resident realms sharing one active tileset.
#[derive(Debug)]
pub struct World {
    tileset: Arc<Tileset>,
    realms: DashMap<RealmId, Arc<Realm>>,
}

impl World {
    /// Creates a world with no realms.
    #[must_use]
    pub fn new(tileset: Arc<Tileset>) -> Self {
        Self {
            tileset,
            realms: DashMap::new(),
        }
    }

    /// Active tileset.
    #[must_use]
    pub fn tileset(&self) -> &Arc<Tileset> {
        &self.tileset
    }

    /// Creates and registers an empty realm. Replaces any resident realm
    /// with the same ID.
    pub fn create_realm(&self, id: RealmId, meta: RealmMeta) -> Arc<Realm> {
        let realm = Arc::new(Realm::new(id, meta, Arc::clone(&self.tileset)));
        self.insert(Arc::clone(&realm));
        info!("Created {id}");
        realm
    }

    /// Registers a loaded realm.
    pub fn insert(&self, realm: Arc<Realm>) -> Option<Arc<Realm>> {
        self.realms.insert(realm.id(), realm)
    }

    /// Gets a resident realm.
    #[must_use]
    pub fn realm(&self, id: RealmId) -> Option<Arc<Realm>> {
        self.realms.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregisters a realm.
    pub fn remove(&self, id: RealmId) -> Option<Arc<Realm>> {
        self.realms.remove(&id).map(|(_, realm)| realm)
    }

    /// Checks if a realm is resident.
    #[must_use]
    pub fn is_loaded(&self, id: RealmId) -> bool {
        self.realms.contains_key(&id)
    }

    /// Every resident realm, sorted by ID.
    #[must_use]
    pub fn realms(&self) -> Vec<Arc<Realm>> {
        let mut realms: Vec<_> = self
            .realms
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        realms.sort_by_key(|realm| realm.id());
        realms
    }

    /// Number of resident realms.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.realms.len()
    }
}
