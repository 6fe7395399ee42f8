//! The placed piece instance.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    ActorId, Capabilities, Destructible, Durable, ItemHolder, MineralCluster, Origin, Pickable,
    PieceId, PrefabKey, Transform,
};
use crate::catalog::{CatalogError, PieceCatalog, PieceCategory};
use crate::recipes::Recipe;

/// A placed object with an associated build recipe.
#[derive(Debug, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub prefab: PrefabKey,
    origin: Origin,

    /// Recipe recorded on this instance. For player-placed pieces this is the
    /// cost actually paid; it may drift from the catalog afterwards.
    pub recipe: Recipe,

    pub creator: Option<ActorId>,
    pub category: PieceCategory,
    pub can_be_removed: bool,
    pub transform: Transform,
    pub capabilities: Capabilities,

    destroyed: AtomicBool,
}

impl Piece {
    /// Create a piece with an explicit recipe.
    pub fn new(prefab: impl Into<PrefabKey>, origin: Origin, recipe: Recipe) -> Self {
        Self {
            id: PieceId::new(),
            prefab: prefab.into(),
            origin,
            recipe,
            creator: None,
            category: PieceCategory::default(),
            can_be_removed: true,
            transform: Transform::default(),
            capabilities: Capabilities::none(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Spawn a world-generated piece, taking recipe and category from the
    /// catalog as it is now.
    pub fn world_generated(
        prefab: impl Into<PrefabKey>,
        catalog: &dyn PieceCatalog,
    ) -> Result<Self, CatalogError> {
        Self::from_catalog(prefab.into(), Origin::WorldGenerated, catalog)
    }

    /// Build a player-placed piece, snapshotting the catalog's current recipe.
    pub fn player_placed(
        prefab: impl Into<PrefabKey>,
        creator: ActorId,
        catalog: &dyn PieceCatalog,
    ) -> Result<Self, CatalogError> {
        let mut piece = Self::from_catalog(prefab.into(), Origin::PlayerPlaced, catalog)?;
        piece.creator = Some(creator);
        Ok(piece)
    }

    fn from_catalog(
        prefab: PrefabKey,
        origin: Origin,
        catalog: &dyn PieceCatalog,
    ) -> Result<Self, CatalogError> {
        let recipe = catalog.default_recipe(&prefab)?;
        let category = catalog
            .flags(&prefab)
            .map(|flags| flags.category)
            .unwrap_or_default();
        let mut piece = Self::new(prefab, origin, recipe);
        piece.category = category;
        Ok(piece)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_creator(mut self, creator: ActorId) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_category(mut self, category: PieceCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_removable(mut self, can_be_removed: bool) -> Self {
        self.can_be_removed = can_be_removed;
        self
    }

    pub fn with_durable(mut self, durable: Durable) -> Self {
        self.capabilities.durable = Some(durable);
        self
    }

    pub fn with_destructible(mut self, destructible: Destructible) -> Self {
        self.capabilities.destructible = Some(destructible);
        self
    }

    pub fn with_mineral_cluster_legacy(mut self, cluster: MineralCluster) -> Self {
        self.capabilities.mineral_cluster_legacy = Some(cluster);
        self
    }

    pub fn with_mineral_cluster(mut self, cluster: MineralCluster) -> Self {
        self.capabilities.mineral_cluster = Some(cluster);
        self
    }

    pub fn with_pickable(mut self, pickable: Pickable) -> Self {
        self.capabilities.pickable = Some(pickable);
        self
    }

    pub fn with_item_holder(mut self, holder: ItemHolder) -> Self {
        self.capabilities.item_holder = Some(holder);
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_placed_by_player(&self) -> bool {
        self.origin == Origin::PlayerPlaced
    }

    /// Check if `actor` built this piece.
    pub fn is_creator(&self, actor: ActorId) -> bool {
        self.creator == Some(actor)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Flip the destroyed flag. Returns true only for the caller that
    /// performed the flip.
    pub fn mark_destroyed(&self) -> bool {
        self.destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
