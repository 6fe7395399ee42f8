//! Destruction dispatch - picks the one pathway that destroys a piece.

use build_rules::{Capabilities, MineralCluster, Piece, PieceId, ResourceList, ResourceStack};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::authorizer::Actor;
use crate::effects::EffectKind;
use crate::error::RemovalError;
use crate::gateway::{ClaimToken, ReplicationGateway};
use crate::reconciler::ResourceReconciler;

/// Destruction pathways, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pathway {
    MineralClusterLegacy,
    MineralCluster,
    Durable,
    Destructible,
    Generic,
}

impl Pathway {
    /// Match the capability set. Exactly one pathway applies.
    pub fn select(capabilities: &Capabilities) -> Pathway {
        match capabilities {
            Capabilities {
                mineral_cluster_legacy: Some(_),
                ..
            } => Pathway::MineralClusterLegacy,
            Capabilities {
                mineral_cluster: Some(_),
                ..
            } => Pathway::MineralCluster,
            Capabilities {
                durable: Some(_), ..
            } => Pathway::Durable,
            Capabilities {
                destructible: Some(_),
                ..
            } => Pathway::Destructible,
            _ => Pathway::Generic,
        }
    }

    /// Effects the host should play once the piece is gone.
    pub fn removal_effects(&self, piece: &Piece) -> Vec<EffectKind> {
        match self {
            Pathway::Generic => vec![EffectKind::Place, EffectKind::Remove],
            Pathway::Destructible => {
                let mut effects = Vec::new();
                if let Some(destructible) = &piece.capabilities.destructible {
                    if destructible.has_hit_effects {
                        effects.push(EffectKind::Hit);
                    }
                    if destructible.needs_removal_sfx() {
                        effects.push(EffectKind::RemovalSfx);
                    }
                }
                effects.push(EffectKind::Destroyed);
                effects
            }
            Pathway::MineralClusterLegacy | Pathway::MineralCluster | Pathway::Durable => {
                vec![EffectKind::Destroyed]
            }
        }
    }
}

/// A completed destruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub piece: PieceId,
    pub pathway: Pathway,
    pub refund: ResourceList,
    pub token: ClaimToken,
}

/// Outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Removed(Removal),
    NoOp,
}

/// Result of mining a single chunk of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMined {
    /// Ore the chunk yielded, if this call broke it.
    pub ore: Option<ResourceStack>,
    /// Whole-piece outcome; `Removed` only for the mining that emptied the
    /// cluster first.
    pub outcome: DispatchOutcome,
}

/// Result of a destructible piece breaking on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalDestruction {
    /// Whether the host should still spawn the piece's own destruction drops.
    pub natural_drops: bool,
    pub outcome: DispatchOutcome,
}

/// Entry point from authorization into destruction.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, actor: &Actor, piece: &Arc<Piece>) -> DispatchOutcome;
}

/// Default dispatcher: claims the object, runs its pathway, and reconciles
/// exactly once per physical destruction.
pub struct DestructionDispatcher {
    gateway: Arc<dyn ReplicationGateway>,
    reconciler: ResourceReconciler,
}

impl DestructionDispatcher {
    pub fn new(gateway: Arc<dyn ReplicationGateway>, reconciler: ResourceReconciler) -> Self {
        Self {
            gateway,
            reconciler,
        }
    }

    pub fn reconciler(&self) -> &ResourceReconciler {
        &self.reconciler
    }

    /// Natural mining of one chunk. Reconciles the piece when this call is
    /// the first to observe the cluster empty.
    pub fn mine_chunk(&self, actor: &Actor, piece: &Arc<Piece>, chunk: usize) -> ChunkMined {
        let Some((pathway, cluster)) = cluster_of(piece) else {
            return ChunkMined {
                ore: None,
                outcome: DispatchOutcome::NoOp,
            };
        };
        let ore = cluster.mine_chunk(chunk);
        if !cluster.all_chunks_destroyed() {
            return ChunkMined {
                ore,
                outcome: DispatchOutcome::NoOp,
            };
        }
        let outcome = self
            .claim(actor, piece)
            .and_then(|token| self.finish_cluster(piece, cluster, pathway, token))
            .map_or_else(no_op, DispatchOutcome::Removed);
        ChunkMined { ore, outcome }
    }

    /// Natural damage to a durable piece. Reconciles once health is gone.
    ///
    /// The claim is taken before health changes, so a refused claim leaves
    /// the piece untouched.
    pub fn apply_damage(&self, actor: &Actor, piece: &Arc<Piece>, amount: u32) -> DispatchOutcome {
        let Some(durable) = &piece.capabilities.durable else {
            return DispatchOutcome::NoOp;
        };
        if piece.is_destroyed() {
            return DispatchOutcome::NoOp;
        }
        let token = match self.claim(actor, piece) {
            Ok(token) => token,
            Err(err) => return no_op(err),
        };
        durable.apply_damage(amount);
        if !durable.is_broken() {
            return DispatchOutcome::NoOp;
        }
        self.cleanup(piece, Pathway::Durable, token)
            .map_or_else(no_op, DispatchOutcome::Removed)
    }

    /// Natural destruction of a destructible piece.
    ///
    /// Player-placed pieces are reconciled and lose their own destruction
    /// drops. World-generated pieces keep their drops and are retired
    /// without a refund.
    pub fn destroy_destructible(&self, actor: &Actor, piece: &Arc<Piece>) -> NaturalDestruction {
        let natural_drops = !piece.is_placed_by_player();
        let outcome = self
            .try_destroy_destructible(actor, piece)
            .map_or_else(no_op, DispatchOutcome::Removed);
        NaturalDestruction {
            natural_drops,
            outcome,
        }
    }

    fn try_destroy_destructible(
        &self,
        actor: &Actor,
        piece: &Arc<Piece>,
    ) -> Result<Removal, RemovalError> {
        let Some(destructible) = &piece.capabilities.destructible else {
            return Err(RemovalError::TargetInvalid(piece.id));
        };
        if piece.is_destroyed() {
            return Err(RemovalError::ConcurrentRemoval(piece.id));
        }
        let token = self.claim(actor, piece)?;
        destructible.destroy_now();

        if piece.is_placed_by_player() {
            return self.cleanup(piece, Pathway::Destructible, token);
        }
        if !piece.mark_destroyed() {
            return Err(RemovalError::ConcurrentRemoval(piece.id));
        }
        tracing::debug!(
            piece = %piece.id,
            prefab = %piece.prefab,
            "world piece destroyed naturally"
        );
        Ok(Removal {
            piece: piece.id,
            pathway: Pathway::Destructible,
            refund: ResourceList::new(),
            token,
        })
    }

    fn try_dispatch(&self, actor: &Actor, piece: &Arc<Piece>) -> Result<Removal, RemovalError> {
        if piece.is_destroyed() {
            return Err(RemovalError::ConcurrentRemoval(piece.id));
        }
        let token = self.claim(actor, piece)?;

        let pathway = Pathway::select(&piece.capabilities);
        tracing::debug!(piece = %piece.id, prefab = %piece.prefab, ?pathway, "dispatching removal");

        match pathway {
            Pathway::MineralClusterLegacy | Pathway::MineralCluster => {
                let (_, cluster) =
                    cluster_of(piece).ok_or(RemovalError::TargetInvalid(piece.id))?;
                cluster.clear_remaining();
                self.finish_cluster(piece, cluster, pathway, token)
            }
            // Component transitions may already have happened through natural
            // damage; the destroyed flip in cleanup decides the race.
            Pathway::Durable => {
                if let Some(durable) = &piece.capabilities.durable {
                    durable.remove();
                }
                self.cleanup(piece, pathway, token)
            }
            Pathway::Destructible => {
                if let Some(destructible) = &piece.capabilities.destructible {
                    destructible.destroy_now();
                }
                self.cleanup(piece, pathway, token)
            }
            Pathway::Generic => self.cleanup(piece, pathway, token),
        }
    }

    fn claim(&self, actor: &Actor, piece: &Piece) -> Result<ClaimToken, RemovalError> {
        self.gateway
            .claim(piece.id, actor.id)
            .map_err(|_| RemovalError::TargetInvalid(piece.id))
    }

    /// Reconcile only on the first transition to "all chunks destroyed".
    fn finish_cluster(
        &self,
        piece: &Piece,
        cluster: &MineralCluster,
        pathway: Pathway,
        token: ClaimToken,
    ) -> Result<Removal, RemovalError> {
        if !cluster.latch_all_destroyed() {
            return Err(RemovalError::ConcurrentRemoval(piece.id));
        }
        self.cleanup(piece, pathway, token)
    }

    /// Generic cleanup shared by every pathway.
    fn cleanup(
        &self,
        piece: &Piece,
        pathway: Pathway,
        token: ClaimToken,
    ) -> Result<Removal, RemovalError> {
        let reconciliation = self.reconciler.try_reconcile(piece)?;
        tracing::info!(
            piece = %piece.id,
            prefab = %piece.prefab,
            ?pathway,
            refund = reconciliation.refund.len(),
            "piece removed"
        );
        Ok(Removal {
            piece: piece.id,
            pathway,
            refund: reconciliation.refund,
            token,
        })
    }
}

impl Dispatch for DestructionDispatcher {
    fn dispatch(&self, actor: &Actor, piece: &Arc<Piece>) -> DispatchOutcome {
        self.try_dispatch(actor, piece)
            .map_or_else(no_op, DispatchOutcome::Removed)
    }
}

fn cluster_of(piece: &Piece) -> Option<(Pathway, &MineralCluster)> {
    let capabilities = &piece.capabilities;
    if let Some(cluster) = &capabilities.mineral_cluster_legacy {
        return Some((Pathway::MineralClusterLegacy, cluster));
    }
    capabilities
        .mineral_cluster
        .as_ref()
        .map(|cluster| (Pathway::MineralCluster, cluster))
}

fn no_op(err: RemovalError) -> DispatchOutcome {
    tracing::debug!(%err, "dispatch is a no-op");
    DispatchOutcome::NoOp
}
