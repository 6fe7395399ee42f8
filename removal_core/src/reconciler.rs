//! Resource reconciliation - the final, deduplicated refund for a piece.
//!
//! The steps run in a fixed order:
//! 1. **Commit**: flip the piece's destroyed flag; losers of the race get nothing
//! 2. **Base recipe**: catalog recipe for world-generated pieces, the
//!    snapshotted recipe for player-placed ones
//! 3. **Cluster yield**: subtract ore already mined out of the piece
//! 4. **Pickable**: force the harvest and drop its resource from the refund
//! 5. **Item holder**: eject the held item, which is never refunded
//! 6. **Refund**: recoverable, non-empty entries in recipe order
//!
//! Everything before the flip is read-only. Steps 4 and 5 go through the
//! gateway and re-check validity around each call.

use build_rules::{Origin, Piece, PieceCatalog, Recipe, ResourceList};
use std::sync::Arc;

use crate::error::{ReconciliationError, RemovalError};
use crate::gateway::{ReplicationGateway, Rpc};

/// A computed refund plus any non-fatal problems met on the way.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub refund: ResourceList,
    pub errors: Vec<ReconciliationError>,
    /// The object was invalidated by a side effect during reconciliation.
    pub invalidated: bool,
}

/// Computes refunds and performs the side effects they depend on.
pub struct ResourceReconciler {
    catalog: Arc<dyn PieceCatalog>,
    gateway: Arc<dyn ReplicationGateway>,
}

impl ResourceReconciler {
    pub fn new(catalog: Arc<dyn PieceCatalog>, gateway: Arc<dyn ReplicationGateway>) -> Self {
        Self { catalog, gateway }
    }

    /// Reconcile a piece, returning its refund.
    ///
    /// Runs at most once per piece; every later call returns an empty list.
    pub fn reconcile(&self, piece: &Piece) -> ResourceList {
        self.try_reconcile(piece)
            .map(|reconciliation| reconciliation.refund)
            .unwrap_or_default()
    }

    /// Reconcile a piece, telling a lost race apart from an empty refund.
    pub fn try_reconcile(&self, piece: &Piece) -> Result<Reconciliation, RemovalError> {
        if piece.is_destroyed() || !piece.mark_destroyed() {
            return Err(RemovalError::ConcurrentRemoval(piece.id));
        }

        let mut reconciliation = Reconciliation::default();
        let mut recipe = match self.base_recipe(piece) {
            Ok(recipe) => recipe,
            Err(err) => {
                tracing::warn!(piece = %piece.id, %err, "refunding nothing");
                reconciliation.errors.push(err);
                Recipe::new()
            }
        };

        for cluster in piece.capabilities.clusters() {
            for mined in cluster.yielded() {
                recipe.subtract_clamped(&mined.resource, mined.amount);
            }
        }

        if let Some(pickable) = &piece.capabilities.pickable {
            if !pickable.is_harvested() {
                if self.gateway.is_valid(piece.id) {
                    self.gateway.invoke(piece.id, Rpc::Pick);
                }
                // The harvest is the only emission of this resource.
                recipe.remove_resource(&pickable.item.resource);
            }
        }

        if let Some(holder) = &piece.capabilities.item_holder {
            if holder.is_holding() && self.gateway.is_valid(piece.id) {
                self.gateway.invoke(piece.id, Rpc::DropItem);
            }
        }

        reconciliation.invalidated = !self.gateway.is_valid(piece.id);
        if reconciliation.invalidated {
            tracing::debug!(piece = %piece.id, "object invalidated during reconciliation");
        }

        reconciliation.refund = recipe.refund();
        Ok(reconciliation)
    }

    fn base_recipe(&self, piece: &Piece) -> Result<Recipe, ReconciliationError> {
        match piece.origin() {
            Origin::PlayerPlaced => Ok(piece.recipe.clone()),
            Origin::WorldGenerated => self.catalog.default_recipe(&piece.prefab).map_err(|source| {
                ReconciliationError::MissingDefaultRecipe {
                    prefab: piece.prefab.clone(),
                    source,
                }
            }),
        }
    }
}
