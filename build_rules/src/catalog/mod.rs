//! Prefab catalog - canonical recipes and flags per prefab.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::pieces::PrefabKey;
use crate::recipes::Recipe;

/// Errors raised by catalog lookups and loading.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("no catalog entry for prefab '{0}'")]
    NotFound(PrefabKey),
    #[error("invalid catalog TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build menu categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PieceCategory {
    #[default]
    Misc,
    Crafting,
    Building,
    Furniture,
    Nature,
    /// Creative-mode pieces: only the creator (or an admin) may remove them.
    CreativeMode,
}

impl PieceCategory {
    pub fn is_creative(&self) -> bool {
        matches!(self, PieceCategory::CreativeMode)
    }
}

/// Per-prefab capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefabFlags {
    pub enabled: bool,
    pub category: PieceCategory,
}

/// Read-only view of canonical prefab data.
pub trait PieceCatalog: Send + Sync {
    /// The canonical recipe for a prefab under the current configuration.
    fn default_recipe(&self, prefab: &PrefabKey) -> Result<Recipe, CatalogError>;

    /// Flags for a prefab, if the catalog knows it.
    fn flags(&self, prefab: &PrefabKey) -> Option<PrefabFlags>;
}

/// One `[prefabs.<Key>]` table in a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefabEntry {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub category: PieceCategory,
    /// Requirements in config string form, e.g. `Wood,10;Iron,1`.
    #[serde(default)]
    pub requirements: String,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    prefabs: BTreeMap<PrefabKey, PrefabEntry>,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    flags: PrefabFlags,
    recipe: Recipe,
}

/// In-memory catalog, loadable from TOML or JSON.
///
/// ```toml
/// [prefabs.Chest]
/// category = "Furniture"
/// requirements = "Wood,10;Iron,1"
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrefabCatalog {
    entries: HashMap<PrefabKey, CatalogEntry>,
}

impl PrefabCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(source)?;
        Ok(Self::from_file(file))
    }

    /// Load a catalog from JSON with the same shape as the TOML form.
    pub fn from_json_str(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(source)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: CatalogFile) -> Self {
        let mut catalog = Self::new();
        for (prefab, entry) in file.prefabs {
            catalog.insert(prefab, entry);
        }
        catalog
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, prefab: impl Into<PrefabKey>, entry: PrefabEntry) {
        self.entries.insert(
            prefab.into(),
            CatalogEntry {
                flags: PrefabFlags {
                    enabled: entry.enabled,
                    category: entry.category,
                },
                recipe: Recipe::parse(&entry.requirements),
            },
        );
    }

    /// Change a prefab's configured recipe. Existing player-placed pieces
    /// keep the recipe they were built with.
    pub fn set_requirements(&mut self, prefab: impl Into<PrefabKey>, recipe: Recipe) {
        let prefab = prefab.into();
        match self.entries.get_mut(&prefab) {
            Some(entry) => entry.recipe = recipe,
            None => {
                self.entries.insert(
                    prefab,
                    CatalogEntry {
                        flags: PrefabFlags {
                            enabled: true,
                            category: PieceCategory::default(),
                        },
                        recipe,
                    },
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PieceCatalog for PrefabCatalog {
    fn default_recipe(&self, prefab: &PrefabKey) -> Result<Recipe, CatalogError> {
        self.entries
            .get(prefab)
            .map(|entry| entry.recipe.clone())
            .ok_or_else(|| CatalogError::NotFound(prefab.clone()))
    }

    fn flags(&self, prefab: &PrefabKey) -> Option<PrefabFlags> {
        self.entries.get(prefab).map(|entry| entry.flags)
    }
}
