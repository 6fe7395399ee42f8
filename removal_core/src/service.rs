//! Removal service - the single entry point for removal requests.

use build_rules::{Piece, PieceCatalog, PieceId, ResourceList};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::authorizer::{Actor, Authorization, RemovalAuthorizer, ZonePolicy};
use crate::config::RemovalConfig;
use crate::dispatcher::{
    ChunkMined, DestructionDispatcher, Dispatch, DispatchOutcome, NaturalDestruction, Removal,
};
use crate::effects::EffectNotifier;
use crate::error::DenyReason;
use crate::gateway::ReplicationGateway;
use crate::reconciler::ResourceReconciler;

/// What happened to a removal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalOutcome {
    /// The piece is gone; hand the refund to the inventory/drop subsystem.
    Removed(ResourceList),
    /// Nothing changed; show the reason's message to the actor.
    Denied(DenyReason),
    /// Nothing changed; the target vanished or another actor got there first.
    NoOp,
}

impl RemovalOutcome {
    pub fn is_removed(&self) -> bool {
        matches!(self, RemovalOutcome::Removed(_))
    }
}

/// Wires authorization, dispatch, and effects together.
pub struct RemovalService<D: Dispatch = DestructionDispatcher> {
    authorizer: RemovalAuthorizer,
    dispatcher: D,
    gateway: Arc<dyn ReplicationGateway>,
    notifier: Arc<dyn EffectNotifier>,
}

impl RemovalService<DestructionDispatcher> {
    /// Build a service with the default dispatcher.
    pub fn new(
        catalog: Arc<dyn PieceCatalog>,
        gateway: Arc<dyn ReplicationGateway>,
        zones: Arc<dyn ZonePolicy>,
        notifier: Arc<dyn EffectNotifier>,
        config: RemovalConfig,
    ) -> Self {
        let authorizer =
            RemovalAuthorizer::new(gateway.clone(), catalog.clone(), zones, config);
        let reconciler = ResourceReconciler::new(catalog, gateway.clone());
        let dispatcher = DestructionDispatcher::new(gateway.clone(), reconciler);
        Self::with_dispatcher(authorizer, dispatcher, gateway, notifier)
    }

    /// Mine one chunk of a cluster. The mining that empties the cluster
    /// also settles the object.
    pub fn mine_chunk(&self, actor: &Actor, piece: &Arc<Piece>, chunk: usize) -> ChunkMined {
        let mined = self.dispatcher.mine_chunk(actor, piece, chunk);
        self.settle(piece, &mined.outcome);
        mined
    }

    /// Damage a durable piece, settling it on the hit that breaks it.
    pub fn apply_damage(&self, actor: &Actor, piece: &Arc<Piece>, amount: u32) -> DispatchOutcome {
        let outcome = self.dispatcher.apply_damage(actor, piece, amount);
        self.settle(piece, &outcome);
        outcome
    }

    /// Let a destructible piece break on its own and settle it.
    pub fn destroy_destructible(&self, actor: &Actor, piece: &Arc<Piece>) -> NaturalDestruction {
        let destroyed = self.dispatcher.destroy_destructible(actor, piece);
        self.settle(piece, &destroyed.outcome);
        destroyed
    }
}

impl<D: Dispatch> RemovalService<D> {
    pub fn with_dispatcher(
        authorizer: RemovalAuthorizer,
        dispatcher: D,
        gateway: Arc<dyn ReplicationGateway>,
        notifier: Arc<dyn EffectNotifier>,
    ) -> Self {
        Self {
            authorizer,
            dispatcher,
            gateway,
            notifier,
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Authorize, destroy, and refund a piece.
    ///
    /// A target that is already gone resolves to `NoOp`, not `Denied`.
    pub fn handle_removal_request(&self, actor: &Actor, target: PieceId) -> RemovalOutcome {
        let piece = match self.authorizer.authorize(actor, target) {
            Authorization::Allowed(piece) => piece,
            Authorization::Denied(DenyReason::TargetInvalid) => return RemovalOutcome::NoOp,
            Authorization::Denied(reason) => return RemovalOutcome::Denied(reason),
        };

        match self.dispatcher.dispatch(actor, &piece) {
            DispatchOutcome::Removed(removal) => {
                self.finish(&piece, &removal);
                RemovalOutcome::Removed(removal.refund)
            }
            DispatchOutcome::NoOp => RemovalOutcome::NoOp,
        }
    }

    fn settle(&self, piece: &Piece, outcome: &DispatchOutcome) {
        if let DispatchOutcome::Removed(removal) = outcome {
            self.finish(piece, removal);
        }
    }

    /// Play effects and drop the object from the table, if it is still there.
    fn finish(&self, piece: &Piece, removal: &Removal) {
        if !self.gateway.is_valid(piece.id) {
            tracing::debug!(piece = %piece.id, "object already gone, skipping effects");
            return;
        }
        for kind in removal.pathway.removal_effects(piece) {
            if let Err(err) = self.notifier.play(kind, &piece.transform) {
                tracing::warn!(piece = %piece.id, %err, "removal effect failed");
            }
        }
        self.gateway.destroy(&removal.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::OpenZones;
    use crate::effects::{EffectError, EffectKind};
    use crate::error::ZoneKind;
    use crate::gateway::{EmissionCause, LocalGateway};
    use build_rules::{
        ActorId, Destructible, Durable, MineralCluster, OreChunk, Origin, Pickable, PrefabCatalog,
        Recipe, ResourceStack, Transform,
    };
    use glam::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};

    const CATALOG: &str = r#"
        [prefabs.Chest]
        category = "Furniture"
        requirements = "Wood,10;Iron,1"

        [prefabs.Pickable_Flint]
        requirements = "Flint,5"
    "#;

    #[derive(Default)]
    struct RecordingNotifier {
        played: Mutex<Vec<EffectKind>>,
    }

    impl EffectNotifier for RecordingNotifier {
        fn play(&self, kind: EffectKind, _transform: &Transform) -> Result<(), EffectError> {
            self.played.lock().unwrap().push(kind);
            Ok(())
        }
    }

    struct BrokenNotifier;

    impl EffectNotifier for BrokenNotifier {
        fn play(&self, kind: EffectKind, _transform: &Transform) -> Result<(), EffectError> {
            Err(EffectError::Unavailable(kind))
        }
    }

    #[derive(Default)]
    struct SpyDispatcher {
        calls: AtomicUsize,
    }

    impl Dispatch for SpyDispatcher {
        fn dispatch(&self, _actor: &Actor, _piece: &Arc<Piece>) -> DispatchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DispatchOutcome::NoOp
        }
    }

    struct FixedZones {
        no_build: bool,
        private: bool,
    }

    impl ZonePolicy for FixedZones {
        fn is_no_build(&self, _position: Vec3) -> bool {
            self.no_build
        }

        fn has_access(&self, _actor: &Actor, _position: Vec3) -> bool {
            !self.private
        }
    }

    struct Fixture {
        catalog: Arc<PrefabCatalog>,
        gateway: Arc<LocalGateway>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: Arc::new(PrefabCatalog::from_toml_str(CATALOG).unwrap()),
                gateway: Arc::new(LocalGateway::new()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn service(&self) -> RemovalService {
            RemovalService::new(
                self.catalog.clone(),
                self.gateway.clone(),
                Arc::new(OpenZones),
                self.notifier.clone(),
                RemovalConfig::default(),
            )
        }

        fn spy_service(&self, zones: impl ZonePolicy + 'static) -> RemovalService<SpyDispatcher> {
            let authorizer = RemovalAuthorizer::new(
                self.gateway.clone(),
                self.catalog.clone(),
                Arc::new(zones),
                RemovalConfig::default(),
            );
            RemovalService::with_dispatcher(
                authorizer,
                SpyDispatcher::default(),
                self.gateway.clone(),
                self.notifier.clone(),
            )
        }

        fn played(&self) -> Vec<EffectKind> {
            self.notifier.played.lock().unwrap().clone()
        }
    }

    fn hammer() -> Actor {
        Actor::new(ActorId::new()).holding("$item_hammer")
    }

    #[test]
    fn test_remove_world_generated_chest_uses_catalog() {
        let fixture = Fixture::new();
        let piece = fixture.gateway.spawn(Piece::new(
            "Chest",
            Origin::WorldGenerated,
            Recipe::from_pairs([("Wood", 8)]),
        ));

        let outcome = fixture.service().handle_removal_request(&hammer(), piece.id);

        assert_eq!(
            outcome,
            RemovalOutcome::Removed(vec![
                ResourceStack::new("Wood", 10),
                ResourceStack::new("Iron", 1)
            ])
        );
        assert!(!fixture.gateway.is_valid(piece.id));
        assert_eq!(fixture.played(), vec![EffectKind::Place, EffectKind::Remove]);
    }

    #[test]
    fn test_pickable_exclusivity() {
        let fixture = Fixture::new();
        let piece = fixture.gateway.spawn(
            Piece::player_placed("Pickable_Flint", ActorId::new(), fixture.catalog.as_ref())
                .unwrap()
                .with_pickable(Pickable::new("Flint", 1).with_extra_drops(vec![
                    ResourceStack::new("Flint", 2),
                ])),
        );

        let outcome = fixture.service().handle_removal_request(&hammer(), piece.id);

        assert_eq!(outcome, RemovalOutcome::Removed(Vec::new()));
        let flint: Vec<_> = fixture
            .gateway
            .emissions()
            .into_iter()
            .filter(|e| e.stack.resource.as_str() == "Flint")
            .collect();
        assert_eq!(flint.len(), 1);
        assert_eq!(flint[0].cause, EmissionCause::Harvested);
        assert_eq!(flint[0].stack.amount, 1);
    }

    #[test]
    fn test_denied_never_reaches_dispatcher() {
        let fixture = Fixture::new();
        let piece = fixture
            .gateway
            .spawn(Piece::new("Chest", Origin::PlayerPlaced, Recipe::new()).with_removable(false));
        let service = fixture.spy_service(OpenZones);

        let not_permitted = service.handle_removal_request(&hammer(), piece.id);
        let empty_handed = service.handle_removal_request(&Actor::new(ActorId::new()), piece.id);
        let missing = service.handle_removal_request(&hammer(), PieceId::new());

        assert_eq!(not_permitted, RemovalOutcome::Denied(DenyReason::NotPermitted));
        // Mutability is checked before the tool.
        assert_eq!(empty_handed, RemovalOutcome::Denied(DenyReason::NotPermitted));
        assert_eq!(missing, RemovalOutcome::NoOp);
        assert_eq!(service.dispatcher().calls.load(Ordering::SeqCst), 0);
        assert!(fixture.gateway.is_valid(piece.id));
        assert!(fixture.played().is_empty());
    }

    #[test]
    fn test_every_denial_stops_before_dispatch() {
        let fixture = Fixture::new();
        let piece = fixture
            .gateway
            .spawn(Piece::new("Chest", Origin::PlayerPlaced, Recipe::from_pairs([("Wood", 1)])));

        let no_build = fixture.spy_service(FixedZones {
            no_build: true,
            private: false,
        });
        let private = fixture.spy_service(FixedZones {
            no_build: false,
            private: true,
        });
        let open = fixture.spy_service(OpenZones);

        assert_eq!(
            no_build.handle_removal_request(&hammer(), piece.id),
            RemovalOutcome::Denied(DenyReason::ZoneRestricted(ZoneKind::NoBuild))
        );
        assert_eq!(
            private.handle_removal_request(&hammer(), piece.id),
            RemovalOutcome::Denied(DenyReason::ZoneRestricted(ZoneKind::PrivateArea))
        );
        assert_eq!(
            open.handle_removal_request(&Actor::new(ActorId::new()), piece.id),
            RemovalOutcome::Denied(DenyReason::WrongTool)
        );

        for service in [&no_build, &private, &open] {
            assert_eq!(service.dispatcher().calls.load(Ordering::SeqCst), 0);
        }
        assert!(fixture.gateway.is_valid(piece.id));
        assert!(!piece.is_destroyed());
        assert!(fixture.played().is_empty());
    }

    #[test]
    fn test_natural_damage_settles_object() {
        let fixture = Fixture::new();
        let service = fixture.service();
        let piece = fixture.gateway.spawn(
            Piece::new("stone_wall", Origin::PlayerPlaced, Recipe::from_pairs([("Stone", 6)]))
                .with_durable(Durable::new(10)),
        );

        assert_eq!(service.apply_damage(&hammer(), &piece, 4), DispatchOutcome::NoOp);
        assert!(fixture.gateway.is_valid(piece.id));

        let outcome = service.apply_damage(&hammer(), &piece, 6);
        assert!(matches!(outcome, DispatchOutcome::Removed(_)));
        assert!(!fixture.gateway.is_valid(piece.id));
        assert_eq!(fixture.played(), vec![EffectKind::Destroyed]);
    }

    #[test]
    fn test_mined_out_cluster_settles_object() {
        let fixture = Fixture::new();
        let service = fixture.service();
        let piece = fixture.gateway.spawn(
            Piece::new("rock4_copper", Origin::PlayerPlaced, Recipe::from_pairs([("Stone", 4)]))
                .with_mineral_cluster(MineralCluster::new(vec![
                    OreChunk::new("CopperOre", 2),
                    OreChunk::new("CopperOre", 2),
                ])),
        );

        assert_eq!(service.mine_chunk(&hammer(), &piece, 0).outcome, DispatchOutcome::NoOp);
        assert!(fixture.gateway.is_valid(piece.id));

        let last = service.mine_chunk(&hammer(), &piece, 1);
        assert!(matches!(last.outcome, DispatchOutcome::Removed(_)));
        assert!(!fixture.gateway.is_valid(piece.id));
    }

    #[test]
    fn test_natural_destruction_settles_object() {
        let fixture = Fixture::new();
        let service = fixture.service();
        let piece = fixture.gateway.spawn(
            Piece::new("wood_crate", Origin::PlayerPlaced, Recipe::from_pairs([("Wood", 4)]))
                .with_destructible(Destructible::new().with_hit_effects(true)),
        );

        let destroyed = service.destroy_destructible(&hammer(), &piece);

        assert!(!destroyed.natural_drops);
        assert!(matches!(destroyed.outcome, DispatchOutcome::Removed(ref removal)
            if removal.refund == vec![ResourceStack::new("Wood", 4)]));
        assert!(!fixture.gateway.is_valid(piece.id));
        assert_eq!(fixture.played(), vec![EffectKind::Hit, EffectKind::Destroyed]);
        assert_eq!(
            service.handle_removal_request(&hammer(), piece.id),
            RemovalOutcome::NoOp
        );
    }

    #[test]
    fn test_second_request_is_noop() {
        let fixture = Fixture::new();
        let service = fixture.service();
        let piece = fixture.gateway.spawn(Piece::new(
            "Chest",
            Origin::PlayerPlaced,
            Recipe::from_pairs([("Wood", 10)]),
        ));

        assert!(service.handle_removal_request(&hammer(), piece.id).is_removed());
        assert_eq!(
            service.handle_removal_request(&hammer(), piece.id),
            RemovalOutcome::NoOp
        );
    }

    #[test]
    fn test_concurrent_removal_yields_single_refund() {
        let fixture = Fixture::new();
        let service = fixture.service();

        for _ in 0..64 {
            let piece = fixture.gateway.spawn(Piece::new(
                "Chest",
                Origin::PlayerPlaced,
                Recipe::from_pairs([("Wood", 10), ("Iron", 1)]),
            ));
            let barrier = Barrier::new(2);
            let actors = [hammer(), hammer()];

            let outcomes: Vec<RemovalOutcome> = std::thread::scope(|scope| {
                let handles: Vec<_> = actors
                    .iter()
                    .map(|actor| {
                        let service = &service;
                        let barrier = &barrier;
                        let target = piece.id;
                        scope.spawn(move || {
                            barrier.wait();
                            service.handle_removal_request(actor, target)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let removed = outcomes.iter().filter(|o| o.is_removed()).count();
            let no_ops = outcomes
                .iter()
                .filter(|o| **o == RemovalOutcome::NoOp)
                .count();
            assert_eq!(removed, 1, "outcomes: {:?}", outcomes);
            assert_eq!(no_ops, 1, "outcomes: {:?}", outcomes);
        }
        assert_eq!(fixture.gateway.object_count(), 0);
    }

    #[test]
    fn test_effect_failure_keeps_removal() {
        let fixture = Fixture::new();
        let service = RemovalService::new(
            fixture.catalog.clone(),
            fixture.gateway.clone(),
            Arc::new(OpenZones),
            Arc::new(BrokenNotifier),
            RemovalConfig::default(),
        );
        let piece = fixture.gateway.spawn(Piece::new(
            "Chest",
            Origin::PlayerPlaced,
            Recipe::from_pairs([("Wood", 1)]),
        ));

        assert_eq!(
            service.handle_removal_request(&hammer(), piece.id),
            RemovalOutcome::Removed(vec![ResourceStack::new("Wood", 1)])
        );
        assert!(!fixture.gateway.is_valid(piece.id));
    }

    #[test]
    fn test_invalidated_object_skips_effects() {
        let fixture = Fixture::new();
        let piece = fixture.gateway.spawn(
            Piece::new(
                "Pickable_Mushroom",
                Origin::PlayerPlaced,
                Recipe::from_pairs([("Mushroom", 1), ("Stone", 1)]),
            )
            .with_pickable(Pickable::new("Mushroom", 1).depleting_parent()),
        );

        let outcome = fixture.service().handle_removal_request(&hammer(), piece.id);

        assert_eq!(
            outcome,
            RemovalOutcome::Removed(vec![ResourceStack::new("Stone", 1)])
        );
        assert!(fixture.played().is_empty());
    }
}
