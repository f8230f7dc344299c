//! Tile catalogs.
//!
//! A tileset assigns numeric IDs to tile identifiers. Chunks only store the
//! numeric IDs, so the catalog's content hash is saved next to every realm
//! and its name table is archived as a [`TilesetMeta`] for later migration.
//!
//! Catalogs are loaded from JSON content data:
//!
//! ```json
//! {
//!   "name": "base:tileset/overworld",
//!   "empty": "base:tile/empty",
//!   "tiles": {
//!     "0": { "identifier": "base:tile/empty" },
//!     "1": { "identifier": "base:tile/grass" },
//!     "2": { "identifier": "base:tile/stone_wall", "solid": true }
//!   }
//! }
//! ```

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use strata_common::{Identifier, TileId, WorldError, WorldResult};

/// Number of variants in an autotile family, one per cardinal neighbor mask.
pub const AUTOTILE_VARIANTS: usize = 16;

/// Category of tiles that open and close.
pub const DOOR_CATEGORY: &str = "base:category/doors";

/// Category of tiles that crops grow on.
pub const FARMLAND_CATEGORY: &str = "base:category/farmland";

/// Content definition of one tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDef {
    /// Stable tile name
    pub identifier: Identifier,
    /// Blocks movement
    #[serde(default)]
    pub solid: bool,
    /// Category memberships
    #[serde(default)]
    pub categories: Vec<Identifier>,
}

impl TileDef {
    /// A walkable tile with no categories.
    #[must_use]
    pub fn new(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: identifier.into(),
            solid: false,
            categories: Vec::new(),
        }
    }
}

/// Content definition of a whole tileset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilesetDef {
    /// Tileset name
    pub name: Identifier,
    /// Identifier of the empty tile
    pub empty: Identifier,
    /// Tiles keyed by numeric ID
    pub tiles: BTreeMap<TileId, TileDef>,
    /// Autotile families: family name to its 16 variants, indexed by
    /// neighbor mask (N=1, E=2, S=4, W=8)
    #[serde(default)]
    pub autotiles: BTreeMap<Identifier, Vec<Identifier>>,
}

/// Archived name tables of a tileset, keyed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetMeta {
    /// Content hash
    pub hash: String,
    /// Tileset name
    pub name: Identifier,
    /// Numeric ID of the empty tile
    pub empty: TileId,
    /// Numeric ID to identifier
    pub names: BTreeMap<TileId, Identifier>,
    /// Autotile family to variant identifiers
    #[serde(default)]
    pub autotiles: BTreeMap<Identifier, Vec<Identifier>>,
}

impl TilesetMeta {
    /// Finds the autotile family an identifier belonged to.
    #[must_use]
    pub fn family_of(&self, identifier: &Identifier) -> Option<&Identifier> {
        self.autotiles
            .iter()
            .find(|(_, variants)| variants.contains(identifier))
            .map(|(family, _)| family)
    }
}

/// A family of position-dependent tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutotileFamily {
    name: Identifier,
    variants: [TileId; AUTOTILE_VARIANTS],
}

impl AutotileFamily {
    /// Family name.
    #[must_use]
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Variant for a cardinal neighbor mask.
    #[must_use]
    pub fn variant(&self, mask: u8) -> TileId {
        self.variants[usize::from(mask) % AUTOTILE_VARIANTS]
    }

    /// Variant with no matching neighbors.
    #[must_use]
    pub fn base(&self) -> TileId {
        self.variants[0]
    }
}

/// A loaded tile catalog.
#[derive(Debug)]
pub struct Tileset {
    name: Identifier,
    empty_id: TileId,
    names: BTreeMap<TileId, Identifier>,
    ids: AHashMap<Identifier, TileId>,
    solid: AHashSet<TileId>,
    categories: AHashMap<Identifier, AHashSet<TileId>>,
    families: BTreeMap<Identifier, AutotileFamily>,
    family_of: AHashMap<TileId, Identifier>,
    family_defs: BTreeMap<Identifier, Vec<Identifier>>,
    hash: String,
}

impl Tileset {
    /// Builds a tileset from its content definition.
    pub fn from_def(def: TilesetDef) -> WorldResult<Self> {
        let mut names = BTreeMap::new();
        let mut ids = AHashMap::new();
        let mut solid = AHashSet::new();
        let mut categories: AHashMap<Identifier, AHashSet<TileId>> = AHashMap::new();

        for (id, tile) in def.tiles {
            if ids.insert(tile.identifier.clone(), id).is_some() {
                return Err(WorldError::InvalidTileset(format!(
                    "{} is assigned more than one ID",
                    tile.identifier
                )));
            }
            if tile.solid {
                solid.insert(id);
            }
            for category in tile.categories {
                categories.entry(category).or_default().insert(id);
            }
            names.insert(id, tile.identifier);
        }

        let empty_id = *ids
            .get(&def.empty)
            .ok_or_else(|| {
                WorldError::InvalidTileset(format!("empty tile {} missing", def.empty))
            })?;
        if solid.contains(&empty_id) {
            return Err(WorldError::InvalidTileset("empty tile cannot be solid".into()));
        }

        let mut families = BTreeMap::new();
        let mut family_of = AHashMap::new();
        for (family, members) in &def.autotiles {
            if members.len() != AUTOTILE_VARIANTS {
                return Err(WorldError::InvalidTileset(format!(
                    "autotile family {family} has {} variants, expected {AUTOTILE_VARIANTS}",
                    members.len()
                )));
            }
            let mut variants = [0; AUTOTILE_VARIANTS];
            for (slot, member) in variants.iter_mut().zip(members) {
                *slot = *ids
                    .get(member)
                    .ok_or_else(|| WorldError::UnknownTile(member.to_string()))?;
                family_of.insert(*slot, family.clone());
            }
            families.insert(
                family.clone(),
                AutotileFamily {
                    name: family.clone(),
                    variants,
                },
            );
        }

        let hash = hash_names(&names);
        Ok(Self {
            name: def.name,
            empty_id,
            names,
            ids,
            solid,
            categories,
            families,
            family_of,
            family_defs: def.autotiles,
            hash,
        })
    }

    /// Parses and builds a tileset from JSON content data.
    pub fn from_json(json: &str) -> WorldResult<Self> {
        let def: TilesetDef =
            serde_json::from_str(json).map_err(|e| WorldError::InvalidTileset(e.to_string()))?;
        Self::from_def(def)
    }

    /// Starts a tileset in code, with `base:tile/empty` at ID 0.
    #[must_use]
    pub fn builder(name: impl Into<Identifier>) -> TilesetBuilder {
        TilesetBuilder::new(name.into())
    }

    /// Tileset name.
    #[must_use]
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// Content hash over the full ID table.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Numeric ID of the empty tile.
    #[must_use]
    pub fn empty_id(&self) -> TileId {
        self.empty_id
    }

    /// Numeric ID to identifier.
    #[must_use]
    pub fn identifier(&self, id: TileId) -> Option<&Identifier> {
        self.names.get(&id)
    }

    /// Identifier to numeric ID.
    #[must_use]
    pub fn id(&self, identifier: &Identifier) -> Option<TileId> {
        self.ids.get(identifier).copied()
    }

    /// Identifier to numeric ID, failing on unknown tiles.
    pub fn require(&self, identifier: &str) -> WorldResult<TileId> {
        self.ids
            .get(&Identifier::from(identifier))
            .copied()
            .ok_or_else(|| WorldError::UnknownTile(identifier.to_owned()))
    }

    /// Number of tiles in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Checks if the catalog has no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Checks if a tile blocks movement.
    #[must_use]
    pub fn is_solid(&self, id: TileId) -> bool {
        self.solid.contains(&id)
    }

    /// Checks if a tile can be walked over.
    #[must_use]
    pub fn is_walkable(&self, id: TileId) -> bool {
        !self.is_solid(id)
    }

    /// Checks category membership.
    #[must_use]
    pub fn in_category(&self, id: TileId, category: &str) -> bool {
        self.categories
            .get(&Identifier::from(category))
            .is_some_and(|members| members.contains(&id))
    }

    /// Checks if a tile is a door.
    #[must_use]
    pub fn is_door(&self, id: TileId) -> bool {
        self.in_category(id, DOOR_CATEGORY)
    }

    /// Checks if a tile is farmland.
    #[must_use]
    pub fn is_farmland(&self, id: TileId) -> bool {
        self.in_category(id, FARMLAND_CATEGORY)
    }

    /// Autotile family containing a tile, if any.
    #[must_use]
    pub fn autotile_family(&self, id: TileId) -> Option<&AutotileFamily> {
        self.family_of.get(&id).and_then(|name| self.families.get(name))
    }

    /// Autotile family by name.
    #[must_use]
    pub fn family(&self, name: &Identifier) -> Option<&AutotileFamily> {
        self.families.get(name)
    }

    /// The archived form of this tileset.
    #[must_use]
    pub fn meta(&self) -> TilesetMeta {
        TilesetMeta {
            hash: self.hash.clone(),
            name: self.name.clone(),
            empty: self.empty_id,
            names: self.names.clone(),
            autotiles: self.family_defs.clone(),
        }
    }
}

/// SHA-256 over the ascending `id=identifier` lines, hex encoded.
fn hash_names(names: &BTreeMap<TileId, Identifier>) -> String {
    let mut hasher = Sha256::new();
    for (id, identifier) in names {
        hasher.update(format!("{id}={identifier}\n").as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Assembles a [`TilesetDef`] in code.
#[derive(Debug, Clone)]
pub struct TilesetBuilder {
    def: TilesetDef,
}

impl TilesetBuilder {
    fn new(name: Identifier) -> Self {
        let empty = Identifier::from("base:tile/empty");
        let mut tiles = BTreeMap::new();
        tiles.insert(0, TileDef::new(empty.clone()));
        Self {
            def: TilesetDef {
                name,
                empty,
                tiles,
                autotiles: BTreeMap::new(),
            },
        }
    }

    /// Adds a walkable tile.
    #[must_use]
    pub fn tile(mut self, id: TileId, identifier: &str) -> Self {
        self.def.tiles.insert(id, TileDef::new(identifier));
        self
    }

    /// Adds a solid tile.
    #[must_use]
    pub fn solid(mut self, id: TileId, identifier: &str) -> Self {
        let mut tile = TileDef::new(identifier);
        tile.solid = true;
        self.def.tiles.insert(id, tile);
        self
    }

    /// Puts an already added tile into a category.
    #[must_use]
    pub fn categorize(mut self, id: TileId, category: &str) -> Self {
        if let Some(tile) = self.def.tiles.get_mut(&id) {
            tile.categories.push(Identifier::from(category));
        }
        self
    }

    /// Declares an autotile family from its 16 variant identifiers.
    #[must_use]
    pub fn autotile(mut self, family: &str, variants: &[&str]) -> Self {
        self.def.autotiles.insert(
            Identifier::from(family),
            variants.iter().map(|&v| Identifier::from(v)).collect(),
        );
        self
    }

    /// Builds the tileset.
    pub fn build(self) -> WorldResult<Tileset> {
        Tileset::from_def(self.def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tileset {
        Tileset::builder("test:tileset")
            .tile(1, "base:tile/grass")
            .solid(2, "base:tile/stone_wall")
            .tile(3, "base:tile/door")
            .categorize(3, DOOR_CATEGORY)
            .build()
            .expect("valid tileset")
    }

    #[test]
    fn test_lookups() {
        let tileset = sample();
        let grass = Identifier::from("base:tile/grass");
        assert_eq!(tileset.id(&grass), Some(1));
        assert_eq!(tileset.identifier(1), Some(&grass));
        assert_eq!(tileset.empty_id(), 0);
        assert_eq!(tileset.len(), 4);
        assert!(tileset.is_solid(2));
        assert!(tileset.is_walkable(1));
        assert!(tileset.is_door(3));
        assert!(!tileset.is_farmland(3));
    }

    #[test]
    fn test_hash_depends_on_ids() {
        let a = sample();
        let b = sample();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);

        let shuffled = Tileset::builder("test:tileset")
            .tile(2, "base:tile/grass")
            .solid(1, "base:tile/stone_wall")
            .tile(3, "base:tile/door")
            .build()
            .expect("valid tileset");
        assert_ne!(a.hash(), shuffled.hash());
    }

    #[test]
    fn test_json_definition() {
        let json = r#"{
            "name": "base:tileset/overworld",
            "empty": "base:tile/empty",
            "tiles": {
                "0": { "identifier": "base:tile/empty" },
                "5": { "identifier": "base:tile/stone", "solid": true }
            }
        }"#;
        let tileset = Tileset::from_json(json).expect("parse");
        assert_eq!(tileset.require("base:tile/stone").expect("stone"), 5);
        assert!(tileset.is_solid(5));
        assert!(tileset.require("base:tile/lava").is_err());
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let result = Tileset::builder("test:tileset")
            .tile(1, "base:tile/grass")
            .tile(2, "base:tile/grass")
            .build();
        assert!(matches!(result, Err(WorldError::InvalidTileset(_))));
    }

    #[test]
    fn test_meta_round_trips_through_json() {
        let meta = sample().meta();
        let json = serde_json::to_string(&meta).expect("serialize");
        let back: TilesetMeta = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, meta);
        assert_eq!(back.names.get(&2), Some(&Identifier::from("base:tile/stone_wall")));
    }

    #[test]
    fn test_autotile_family_needs_sixteen_variants() {
        let result = Tileset::builder("test:tileset")
            .solid(1, "base:tile/wall_0")
            .autotile("base:autotile/wall", &["base:tile/wall_0"])
            .build();
        assert!(result.is_err());
    }
}
