//! Single-process gateway: an in-memory object table with RPCs applied
//! synchronously.

use build_rules::{ActorId, Piece, PieceId, ResourceStack};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ClaimToken, GatewayError, ReplicationGateway, Rpc};

/// Why a stack left an object outside of the refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmissionCause {
    Harvested,
    Ejected,
}

/// A resource stack dropped into the world by an RPC side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emission {
    pub source: PieceId,
    pub stack: ResourceStack,
    pub cause: EmissionCause,
}

#[derive(Debug)]
struct LocalObject {
    piece: Arc<Piece>,
    owner: Option<ActorId>,
}

/// In-memory replicated object table.
#[derive(Debug, Default)]
pub struct LocalGateway {
    objects: Mutex<HashMap<PieceId, LocalObject>>,
    emissions: Mutex<Vec<Emission>>,
}

impl LocalGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a piece in the object table.
    pub fn spawn(&self, piece: Piece) -> Arc<Piece> {
        let piece = Arc::new(piece);
        self.objects().insert(
            piece.id,
            LocalObject {
                piece: Arc::clone(&piece),
                owner: None,
            },
        );
        piece
    }

    /// Drop an object from the table without going through removal.
    pub fn invalidate(&self, target: PieceId) -> bool {
        self.objects().remove(&target).is_some()
    }

    /// Current claim owner of an object.
    pub fn owner(&self, target: PieceId) -> Option<ActorId> {
        self.objects().get(&target).and_then(|object| object.owner)
    }

    pub fn object_count(&self) -> usize {
        self.objects().len()
    }

    /// Everything dropped by RPC side effects so far.
    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<PieceId, LocalObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(
        &self,
        source: PieceId,
        stacks: impl IntoIterator<Item = ResourceStack>,
        cause: EmissionCause,
    ) {
        let mut emissions = self
            .emissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        emissions.extend(stacks.into_iter().map(|stack| Emission {
            source,
            stack,
            cause,
        }));
    }

    fn rpc_pick(&self, piece: &Piece) {
        let Some(pickable) = &piece.capabilities.pickable else {
            return;
        };
        // Player-built pickables never roll their random extra drops.
        let Some(harvest) = pickable.pick(piece.is_placed_by_player()) else {
            return;
        };
        self.emit(
            piece.id,
            std::iter::once(harvest.item).chain(harvest.extra),
            EmissionCause::Harvested,
        );
        if pickable.depletes_parent {
            self.invalidate(piece.id);
        }
    }

    fn rpc_drop_item(&self, piece: &Piece) {
        if let Some(item) = piece
            .capabilities
            .item_holder
            .as_ref()
            .and_then(|holder| holder.take())
        {
            self.emit(piece.id, Some(item), EmissionCause::Ejected);
        }
    }
}

impl ReplicationGateway for LocalGateway {
    fn resolve(&self, target: PieceId) -> Option<Arc<Piece>> {
        self.objects()
            .get(&target)
            .map(|object| Arc::clone(&object.piece))
    }

    fn claim(&self, target: PieceId, claimant: ActorId) -> Result<ClaimToken, GatewayError> {
        let mut objects = self.objects();
        let object = objects
            .get_mut(&target)
            .ok_or(GatewayError::Invalid(target))?;
        object.owner = Some(claimant);
        Ok(ClaimToken {
            target,
            owner: claimant,
        })
    }

    fn is_valid(&self, target: PieceId) -> bool {
        self.objects().contains_key(&target)
    }

    fn invoke(&self, target: PieceId, rpc: Rpc) {
        // Resolve first so the table lock is not held while the RPC runs.
        let Some(piece) = self.resolve(target) else {
            return;
        };
        match rpc {
            Rpc::Pick => self.rpc_pick(&piece),
            Rpc::DropItem => self.rpc_drop_item(&piece),
        }
    }

    fn destroy(&self, token: &ClaimToken) {
        self.objects().remove(&token.target);
    }
}
