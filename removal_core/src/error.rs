//! Error taxonomy for removal requests.

use build_rules::{CatalogError, PieceId, PrefabKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Zone rule that blocked a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    NoBuild,
    PrivateArea,
}

/// Why a removal attempt was denied.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenyReason {
    #[error("target does not resolve to a live piece")]
    TargetInvalid,
    #[error("target is inside a restricted zone ({0:?})")]
    ZoneRestricted(ZoneKind),
    #[error("piece may not be removed by this actor")]
    NotPermitted,
    #[error("held tool cannot remove pieces")]
    WrongTool,
}

impl DenyReason {
    /// Localization key of the message shown to the actor.
    pub fn message_key(&self) -> &'static str {
        match self {
            DenyReason::TargetInvalid => "$msg_invalidtarget",
            DenyReason::ZoneRestricted(ZoneKind::NoBuild) => "$msg_nobuildzone",
            DenyReason::ZoneRestricted(ZoneKind::PrivateArea) => "$msg_privatezone",
            DenyReason::NotPermitted => "$msg_cantremovenow",
            DenyReason::WrongTool => "$msg_wrongtool",
        }
    }
}

/// Failures while computing a refund. Never blocks the removal itself.
#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("no default recipe for world-generated prefab '{prefab}'")]
    MissingDefaultRecipe {
        prefab: PrefabKey,
        #[source]
        source: CatalogError,
    },
}

/// Post-authorization failures. Both resolve to a no-op outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemovalError {
    #[error("piece {0} is gone or already destroyed")]
    TargetInvalid(PieceId),
    #[error("piece {0} was removed concurrently by another actor")]
    ConcurrentRemoval(PieceId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_keys() {
        assert_eq!(
            DenyReason::ZoneRestricted(ZoneKind::NoBuild).message_key(),
            "$msg_nobuildzone"
        );
        assert_eq!(
            DenyReason::ZoneRestricted(ZoneKind::PrivateArea).message_key(),
            "$msg_privatezone"
        );
        assert_eq!(DenyReason::NotPermitted.message_key(), "$msg_cantremovenow");
    }

    #[test]
    fn test_reconciliation_error_display() {
        let err = ReconciliationError::MissingDefaultRecipe {
            prefab: "Chest".into(),
            source: CatalogError::NotFound("Chest".into()),
        };
        assert!(err.to_string().contains("Chest"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
