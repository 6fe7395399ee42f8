//! Cosmetic effects played after a removal.

use build_rules::Transform;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Effect families the engine asks the host to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// The piece's own placement effect, replayed on removal.
    Place,
    /// The remover's removal effect.
    Remove,
    /// Hit effects of a destructible.
    Hit,
    /// Destroyed effect of the piece.
    Destroyed,
    /// Substitute deconstruction sound for pieces that have none.
    RemovalSfx,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("effect {0:?} is unavailable")]
    Unavailable(EffectKind),
}

/// Plays effects. Failures are reported but never undo a removal.
pub trait EffectNotifier: Send + Sync {
    fn play(&self, kind: EffectKind, transform: &Transform) -> Result<(), EffectError>;
}

/// Notifier for headless hosts: records effects in the trace log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl EffectNotifier for TracingNotifier {
    fn play(&self, kind: EffectKind, transform: &Transform) -> Result<(), EffectError> {
        tracing::trace!(?kind, position = ?transform.position, "effect");
        Ok(())
    }
}
