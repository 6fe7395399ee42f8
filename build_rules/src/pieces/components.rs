//! Capability components a piece may carry.
//!
//! Mutable component state uses atomics so that a piece can be shared across
//! actors; every transition that matters to removal reports whether the
//! caller was the one that made it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::recipes::{ResourceId, ResourceList, ResourceStack};

/// Health model. The piece is destroyed when health reaches zero.
#[derive(Debug, Serialize, Deserialize)]
pub struct Durable {
    max_health: u32,
    health: AtomicU32,
}

impl Durable {
    pub fn new(max_health: u32) -> Self {
        Self {
            max_health,
            health: AtomicU32::new(max_health),
        }
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn health(&self) -> u32 {
        self.health.load(Ordering::Acquire)
    }

    pub fn is_broken(&self) -> bool {
        self.health() == 0
    }

    /// Apply damage, saturating at zero.
    ///
    /// Returns true only for the hit that took health to zero.
    pub fn apply_damage(&self, amount: u32) -> bool {
        let previous = self
            .health
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |hp| {
                (hp > 0).then(|| hp.saturating_sub(amount))
            });
        matches!(previous, Ok(hp) if hp <= amount)
    }

    /// Terminal destruction: drop health straight to zero.
    ///
    /// Returns false if the piece was already broken.
    pub fn remove(&self) -> bool {
        self.health.swap(0, Ordering::AcqRel) > 0
    }
}

/// One-shot destruction model.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Destructible {
    /// Whether hit effects exist to play on removal.
    pub has_hit_effects: bool,
    /// Whether the hit effects include a sound.
    pub has_hit_sfx: bool,
    /// Whether the destroyed effect includes a sound.
    pub has_destroyed_sfx: bool,
    destroyed: AtomicBool,
}

impl Destructible {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hit_effects(mut self, with_sfx: bool) -> Self {
        self.has_hit_effects = true;
        self.has_hit_sfx = with_sfx;
        self
    }

    pub fn with_destroyed_sfx(mut self) -> Self {
        self.has_destroyed_sfx = true;
        self
    }

    /// Whether removal needs a substitute removal sound.
    pub fn needs_removal_sfx(&self) -> bool {
        !self.has_hit_sfx && !self.has_destroyed_sfx
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Destroy immediately. Returns false if already destroyed.
    pub fn destroy_now(&self) -> bool {
        self.destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// State of a single ore chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChunkState {
    Intact = 0,
    /// Broken by mining; its ore was yielded.
    Mined = 1,
    /// Broken without yield (whole-cluster removal).
    Cleared = 2,
}

impl ChunkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChunkState::Mined,
            2 => ChunkState::Cleared,
            _ => ChunkState::Intact,
        }
    }
}

/// A sub-harvestable chunk of a mineral cluster.
#[derive(Debug, Serialize, Deserialize)]
pub struct OreChunk {
    pub ore: ResourceStack,
    state: AtomicU8,
}

impl OreChunk {
    pub fn new(resource: impl Into<ResourceId>, amount: u32) -> Self {
        Self {
            ore: ResourceStack::new(resource, amount),
            state: AtomicU8::new(ChunkState::Intact as u8),
        }
    }

    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn break_as(&self, state: ChunkState) -> bool {
        self.state
            .compare_exchange(
                ChunkState::Intact as u8,
                state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// A piece made of independently depletable ore chunks.
///
/// Used for both the legacy and the current cluster kinds; which one a piece
/// has is decided by the slot it occupies in [`Capabilities`].
#[derive(Debug, Serialize, Deserialize)]
pub struct MineralCluster {
    chunks: Vec<OreChunk>,
    all_destroyed_fired: AtomicBool,
}

impl MineralCluster {
    pub fn new(chunks: Vec<OreChunk>) -> Self {
        Self {
            chunks,
            all_destroyed_fired: AtomicBool::new(false),
        }
    }

    pub fn chunks(&self) -> &[OreChunk] {
        &self.chunks
    }

    /// Mine one chunk. Returns the ore it yields, or `None` if the chunk
    /// does not exist or is already broken.
    pub fn mine_chunk(&self, index: usize) -> Option<ResourceStack> {
        let chunk = self.chunks.get(index)?;
        chunk.break_as(ChunkState::Mined).then(|| chunk.ore.clone())
    }

    /// Break every remaining chunk without yielding ore.
    ///
    /// Returns the number of chunks cleared by this call.
    pub fn clear_remaining(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| chunk.break_as(ChunkState::Cleared))
            .count()
    }

    /// Level predicate: no chunk is intact.
    pub fn all_chunks_destroyed(&self) -> bool {
        self.chunks
            .iter()
            .all(|chunk| chunk.state() != ChunkState::Intact)
    }

    /// Edge trigger: true exactly once, on the first call that observes
    /// every chunk destroyed.
    pub fn latch_all_destroyed(&self) -> bool {
        self.all_chunks_destroyed()
            && self
                .all_destroyed_fired
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Cumulative ore yielded so far, per resource, in first-seen order.
    pub fn yielded(&self) -> ResourceList {
        let mut totals: ResourceList = Vec::new();
        for chunk in self
            .chunks
            .iter()
            .filter(|chunk| chunk.state() == ChunkState::Mined)
        {
            match totals
                .iter_mut()
                .find(|stack| stack.resource == chunk.ore.resource)
            {
                Some(stack) => stack.amount += chunk.ore.amount,
                None => totals.push(chunk.ore.clone()),
            }
        }
        totals
    }
}

/// What a single pick produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvest {
    pub item: ResourceStack,
    pub extra: ResourceList,
}

/// A wrapped harvestable item.
#[derive(Debug, Serialize, Deserialize)]
pub struct Pickable {
    pub item: ResourceStack,
    #[serde(default)]
    pub extra_drops: ResourceList,
    /// Picking the item destroys the object it belongs to.
    #[serde(default)]
    pub depletes_parent: bool,
    harvested: AtomicBool,
}

impl Pickable {
    pub fn new(resource: impl Into<ResourceId>, amount: u32) -> Self {
        Self {
            item: ResourceStack::new(resource, amount),
            extra_drops: Vec::new(),
            depletes_parent: false,
            harvested: AtomicBool::new(false),
        }
    }

    pub fn with_extra_drops(mut self, extra_drops: ResourceList) -> Self {
        self.extra_drops = extra_drops;
        self
    }

    pub fn depleting_parent(mut self) -> Self {
        self.depletes_parent = true;
        self
    }

    pub fn is_harvested(&self) -> bool {
        self.harvested.load(Ordering::Acquire)
    }

    /// Pick the item. Returns `None` if it was already picked.
    pub fn pick(&self, suppress_extra_drops: bool) -> Option<Harvest> {
        self.harvested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let extra = if suppress_extra_drops {
            Vec::new()
        } else {
            self.extra_drops.clone()
        };
        Some(Harvest {
            item: self.item.clone(),
            extra,
        })
    }
}

/// Holds at most one item that must be ejected before removal.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ItemHolder {
    held: Mutex<Option<ResourceStack>>,
}

impl ItemHolder {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn holding(item: ResourceStack) -> Self {
        Self {
            held: Mutex::new(Some(item)),
        }
    }

    /// The item currently held, if any.
    pub fn held(&self) -> Option<ResourceStack> {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_holding(&self) -> bool {
        self.held().is_some()
    }

    /// Take the held item out of the holder.
    pub fn take(&self) -> Option<ResourceStack> {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Capability kinds, for logging and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    Durable,
    Destructible,
    MineralClusterLegacy,
    MineralCluster,
    Pickable,
    ItemHolder,
}

/// The capability set of a piece. One slot per kind, so no kind can be
/// attached twice.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub durable: Option<Durable>,
    pub destructible: Option<Destructible>,
    pub mineral_cluster_legacy: Option<MineralCluster>,
    pub mineral_cluster: Option<MineralCluster>,
    pub pickable: Option<Pickable>,
    pub item_holder: Option<ItemHolder>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    /// Kinds present, in dispatch priority order.
    pub fn kinds(&self) -> Vec<CapabilityKind> {
        let mut kinds = Vec::new();
        if self.mineral_cluster_legacy.is_some() {
            kinds.push(CapabilityKind::MineralClusterLegacy);
        }
        if self.mineral_cluster.is_some() {
            kinds.push(CapabilityKind::MineralCluster);
        }
        if self.durable.is_some() {
            kinds.push(CapabilityKind::Durable);
        }
        if self.destructible.is_some() {
            kinds.push(CapabilityKind::Destructible);
        }
        if self.pickable.is_some() {
            kinds.push(CapabilityKind::Pickable);
        }
        if self.item_holder.is_some() {
            kinds.push(CapabilityKind::ItemHolder);
        }
        kinds
    }

    /// Every mineral cluster present, legacy first.
    pub fn clusters(&self) -> impl Iterator<Item = &MineralCluster> {
        self.mineral_cluster_legacy
            .iter()
            .chain(self.mineral_cluster.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_reports_first_break_only() {
        let durable = Durable::new(10);
        assert!(!durable.apply_damage(4));
        assert_eq!(durable.health(), 6);
        assert!(durable.apply_damage(20));
        assert!(durable.is_broken());
        assert!(!durable.apply_damage(1));
        assert!(!durable.remove());
    }

    #[test]
    fn test_durable_remove() {
        let durable = Durable::new(5);
        assert!(durable.remove());
        assert!(!durable.remove());
    }

    #[test]
    fn test_destructible_flips_once() {
        let destructible = Destructible::new();
        assert!(destructible.destroy_now());
        assert!(!destructible.destroy_now());
        assert!(destructible.needs_removal_sfx());
        assert!(!Destructible::new().with_destroyed_sfx().needs_removal_sfx());
    }

    #[test]
    fn test_cluster_yield_tracking() {
        let cluster = MineralCluster::new(vec![
            OreChunk::new("CopperOre", 3),
            OreChunk::new("CopperOre", 3),
            OreChunk::new("CopperOre", 4),
        ]);

        assert_eq!(cluster.mine_chunk(0), Some(ResourceStack::new("CopperOre", 3)));
        assert_eq!(cluster.mine_chunk(0), None);
        assert_eq!(cluster.mine_chunk(9), None);
        cluster.mine_chunk(1);

        assert_eq!(cluster.yielded(), vec![ResourceStack::new("CopperOre", 6)]);
        assert!(!cluster.all_chunks_destroyed());

        assert_eq!(cluster.clear_remaining(), 1);
        assert_eq!(cluster.yielded(), vec![ResourceStack::new("CopperOre", 6)]);
        assert!(cluster.all_chunks_destroyed());
    }

    #[test]
    fn test_cluster_latch_is_edge_triggered() {
        let cluster =
            MineralCluster::new(vec![OreChunk::new("Stone", 1), OreChunk::new("Stone", 1)]);
        cluster.mine_chunk(0);
        assert!(!cluster.latch_all_destroyed());
        cluster.mine_chunk(1);
        assert!(cluster.latch_all_destroyed());
        assert!(!cluster.latch_all_destroyed());
    }

    #[test]
    fn test_pick_once_with_extra_drop_suppression() {
        let pickable =
            Pickable::new("Flint", 1).with_extra_drops(vec![ResourceStack::new("Flint", 2)]);
        let harvest = pickable.pick(true).unwrap();
        assert_eq!(harvest.item, ResourceStack::new("Flint", 1));
        assert!(harvest.extra.is_empty());
        assert!(pickable.is_harvested());
        assert!(pickable.pick(false).is_none());
    }

    #[test]
    fn test_item_holder_take() {
        let holder = ItemHolder::holding(ResourceStack::new("TrophyDeer", 1));
        assert!(holder.is_holding());
        assert_eq!(holder.take(), Some(ResourceStack::new("TrophyDeer", 1)));
        assert!(!holder.is_holding());
        assert_eq!(holder.take(), None);
    }

    #[test]
    fn test_capability_kinds_in_priority_order() {
        let caps = Capabilities {
            destructible: Some(Destructible::new()),
            durable: Some(Durable::new(1)),
            mineral_cluster: Some(MineralCluster::new(Vec::new())),
            ..Default::default()
        };
        assert_eq!(
            caps.kinds(),
            vec![
                CapabilityKind::MineralCluster,
                CapabilityKind::Durable,
                CapabilityKind::Destructible,
            ]
        );
    }
}
