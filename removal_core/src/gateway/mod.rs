//! Replication gateway - authority over replicated piece instances.
//!
//! The engine never trusts a single up-front validity check. Anything that
//! invokes an [`Rpc`] must call [`ReplicationGateway::is_valid`] again
//! afterwards, since the call may have destroyed the object out-of-band.

mod local;

pub use local::*;

use build_rules::{ActorId, Piece, PieceId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Gateway failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("replicated object {0} is not valid")]
    Invalid(PieceId),
}

/// Proof of an advisory exclusive claim on an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimToken {
    pub target: PieceId,
    pub owner: ActorId,
}

/// Remote calls the engine can invoke on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rpc {
    /// Harvest the object's pickable.
    Pick,
    /// Eject the item an item holder is holding.
    DropItem,
}

/// Abstract contract with the host's object replication.
pub trait ReplicationGateway: Send + Sync {
    /// Look up the piece behind a reference.
    fn resolve(&self, target: PieceId) -> Option<Arc<Piece>>;

    /// Take ownership of the object for the claimant.
    fn claim(&self, target: PieceId, claimant: ActorId) -> Result<ClaimToken, GatewayError>;

    /// Whether the reference still points at the same live object.
    fn is_valid(&self, target: PieceId) -> bool;

    /// Fire a remote call. Returns once the call has been issued, which may
    /// be before its effects are applied.
    fn invoke(&self, target: PieceId, rpc: Rpc);

    /// Remove the object from the replicated object table.
    fn destroy(&self, token: &ClaimToken);
}
