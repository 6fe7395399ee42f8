//! Removal authorization - decides whether an attempt may proceed at all.

use build_rules::{ActorId, Piece, PieceCatalog, PieceId};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::RemovalConfig;
use crate::error::{DenyReason, ZoneKind};
use crate::gateway::ReplicationGateway;

/// The actor attempting a removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub is_admin: bool,
    /// Name of the tool in the actor's hand.
    pub tool: Option<String>,
}

impl Actor {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            is_admin: false,
            tool: None,
        }
    }

    pub fn holding(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

/// Zone rules of the world.
pub trait ZonePolicy: Send + Sync {
    /// Whether building and removal are forbidden at `position`.
    fn is_no_build(&self, position: Vec3) -> bool;

    /// Whether `actor` has access to any private area covering `position`.
    fn has_access(&self, actor: &Actor, position: Vec3) -> bool;
}

/// A world without restricted zones.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenZones;

impl ZonePolicy for OpenZones {
    fn is_no_build(&self, _position: Vec3) -> bool {
        false
    }

    fn has_access(&self, _actor: &Actor, _position: Vec3) -> bool {
        true
    }
}

/// Result of an authorization check.
#[derive(Debug, Clone)]
pub enum Authorization {
    Allowed(Arc<Piece>),
    Denied(DenyReason),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed(_))
    }

    pub fn into_result(self) -> Result<Arc<Piece>, DenyReason> {
        match self {
            Authorization::Allowed(piece) => Ok(piece),
            Authorization::Denied(reason) => Err(reason),
        }
    }
}

/// Gates removal attempts. Has no side effects.
pub struct RemovalAuthorizer {
    gateway: Arc<dyn ReplicationGateway>,
    catalog: Arc<dyn PieceCatalog>,
    zones: Arc<dyn ZonePolicy>,
    config: RemovalConfig,
}

impl RemovalAuthorizer {
    pub fn new(
        gateway: Arc<dyn ReplicationGateway>,
        catalog: Arc<dyn PieceCatalog>,
        zones: Arc<dyn ZonePolicy>,
        config: RemovalConfig,
    ) -> Self {
        Self {
            gateway,
            catalog,
            zones,
            config,
        }
    }

    /// Run the checks in order, stopping at the first failure:
    /// target validity, zones, mutability, tool.
    pub fn authorize(&self, actor: &Actor, target: PieceId) -> Authorization {
        match self.check(actor, target) {
            Ok(piece) => Authorization::Allowed(piece),
            Err(reason) => {
                tracing::debug!(%target, actor = %actor.id, ?reason, "removal denied");
                Authorization::Denied(reason)
            }
        }
    }

    fn check(&self, actor: &Actor, target: PieceId) -> Result<Arc<Piece>, DenyReason> {
        let piece = self
            .gateway
            .resolve(target)
            .filter(|piece| !piece.is_destroyed() && self.gateway.is_valid(target))
            .ok_or(DenyReason::TargetInvalid)?;

        let position = piece.transform.position;
        if self.zones.is_no_build(position) {
            return Err(DenyReason::ZoneRestricted(ZoneKind::NoBuild));
        }
        if !self.zones.has_access(actor, position) {
            return Err(DenyReason::ZoneRestricted(ZoneKind::PrivateArea));
        }

        if !self.may_remove(actor, &piece) {
            return Err(DenyReason::NotPermitted);
        }

        let tool_ok = actor
            .tool
            .as_deref()
            .is_some_and(|tool| self.config.is_removal_tool(tool));
        if !tool_ok {
            return Err(DenyReason::WrongTool);
        }

        Ok(piece)
    }

    fn may_remove(&self, actor: &Actor, piece: &Piece) -> bool {
        let creative = self
            .catalog
            .flags(&piece.prefab)
            .is_some_and(|flags| flags.enabled && flags.category.is_creative());

        if creative && piece.is_placed_by_player() {
            return piece.is_creator(actor.id)
                || (actor.is_admin && self.config.admin_deconstruct_creative);
        }

        piece.can_be_removed
    }
}
