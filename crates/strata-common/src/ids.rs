//! ID types for realms, entities, and content.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Numeric tile ID as stored in chunk data.
pub type TileId = u16;

/// Numeric fluid type ID.
pub type FluidId = u16;

/// Global counter for entity and tile-entity IDs.
static GLOBAL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier of a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealmId(i32);

impl RealmId {
    /// Creates a realm ID from a raw value.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for RealmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "realm {}", self.0)
    }
}

/// Unique identifier shared by entities and tile-entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalId(u64);

impl GlobalId {
    /// Allocates a new process-unique ID.
    #[must_use]
    pub fn next() -> Self {
        Self(GLOBAL_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an ID from a raw value (for deserialization).
    ///
    /// Bumps the allocator past `value` so freshly allocated IDs never
    /// collide with loaded ones.
    #[must_use]
    pub fn from_raw(value: u64) -> Self {
        GLOBAL_COUNTER.fetch_max(value.saturating_add(1), Ordering::Relaxed);
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Stable, human-readable content name such as `base:tile/grass`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Creates an identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Namespace before the colon (`base` in `base:tile/grass`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map_or("", |(namespace, _)| namespace)
    }

    /// Path after the colon (`tile/grass` in `base:tile/grass`).
    #[must_use]
    pub fn path(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, path)| path)
    }

    /// Returns the full name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parts() {
        let id = Identifier::from("base:tile/grass");
        assert_eq!(id.namespace(), "base");
        assert_eq!(id.path(), "tile/grass");

        let bare = Identifier::from("grass");
        assert_eq!(bare.namespace(), "");
        assert_eq!(bare.path(), "grass");
    }

    #[test]
    fn test_loaded_ids_advance_allocator() {
        let loaded = GlobalId::from_raw(1_000_000);
        assert!(GlobalId::next().raw() > loaded.raw());
    }
}
