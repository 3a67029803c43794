//! # Pose Registry
//!
//! Every entity that can be hit, with its pose history and the traits the
//! post-checks need.
//!
//! The capture tick is the only writer. Each tick it asks a [`CaptureFeed`]
//! for every tracked entity's current parts and pushes a snapshot. Entities
//! the feed reports as gone are unregistered after the walk, so the walk
//! itself always runs over a stable list of ids.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rewind_shared::{CallerId, EntityId, PartName, PartTransform, PoseSnapshot, TeamId};

use crate::history::{HistoryConfig, HistoryError, PoseHistory, PushOutcome};
use crate::rewind;

/// Registry shared between the capture tick (writer) and request handlers
/// (readers).
pub type SharedRegistry = Arc<RwLock<PoseRegistry>>;

/// What the feed reports for one entity on one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureOutcome {
    /// Current part boxes.
    Pose(BTreeMap<PartName, PartTransform>),
    /// Nothing this tick (e.g. not spawned yet); history untouched.
    Skip,
    /// Entity no longer exists; unregister it.
    Gone,
}

/// Source of current part transforms, queried once per entity per tick.
pub trait CaptureFeed {
    /// Current parts of `entity`.
    fn capture(&mut self, entity: EntityId) -> CaptureOutcome;
}

impl<F> CaptureFeed for F
where
    F: FnMut(EntityId) -> CaptureOutcome,
{
    fn capture(&mut self, entity: EntityId) -> CaptureOutcome {
        self(entity)
    }
}

/// Non-geometric facts about an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityTraits {
    /// Team, if the game has teams.
    pub team: Option<TeamId>,
    /// Caller that controls this entity (its own avatar).
    pub owner: Option<CallerId>,
    /// Whether the entity has a damageable representation.
    pub damageable: bool,
}

impl EntityTraits {
    /// Damageable entity with no team and no owner.
    #[must_use]
    pub const fn damageable() -> Self {
        Self { team: None, owner: None, damageable: true }
    }

    /// Sets the team.
    #[must_use]
    pub const fn with_team(mut self, team: TeamId) -> Self {
        self.team = Some(team);
        self
    }

    /// Sets the owning caller.
    #[must_use]
    pub const fn with_owner(mut self, owner: CallerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// One registered entity.
#[derive(Clone, Debug)]
pub struct TrackedEntity {
    id: EntityId,
    traits: EntityTraits,
    history: PoseHistory,
}

impl TrackedEntity {
    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Team, owner and damageability.
    #[must_use]
    pub const fn traits(&self) -> &EntityTraits {
        &self.traits
    }

    /// Recorded poses.
    #[must_use]
    pub const fn history(&self) -> &PoseHistory {
        &self.history
    }

    /// Pose at `time`, reconstructed from the history.
    #[must_use]
    pub fn sample(&self, time: f64) -> Option<PoseSnapshot> {
        rewind::sample(&self.history, time)
    }
}

/// Counts from one capture pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Snapshots stored.
    pub captured: usize,
    /// Entities the feed skipped.
    pub skipped: usize,
    /// Snapshots rejected as out of order.
    pub stale: usize,
    /// Entities unregistered because the feed reported them gone.
    pub removed: usize,
}

/// All tracked entities, in id order.
#[derive(Debug)]
pub struct PoseRegistry {
    config: HistoryConfig,
    entities: BTreeMap<EntityId, TrackedEntity>,
}

impl PoseRegistry {
    /// Empty registry whose rings are sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns the sizing error if `config` is invalid.
    pub fn new(config: HistoryConfig) -> Result<Self, HistoryError> {
        config.validate()?;
        Ok(Self { config, entities: BTreeMap::new() })
    }

    /// Wraps the registry for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// History sizing in use.
    #[must_use]
    pub const fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Starts tracking `id` with an empty history.
    ///
    /// Returns `false` if it was already tracked; its traits are updated and
    /// its history kept.
    pub fn register(&mut self, id: EntityId, traits: EntityTraits) -> bool {
        if let Some(existing) = self.entities.get_mut(&id) {
            existing.traits = traits;
            tracing::debug!(entity = %id, "entity already registered, traits updated");
            return false;
        }
        self.entities.insert(
            id,
            TrackedEntity { id, traits, history: PoseHistory::with_config(&self.config) },
        );
        tracing::debug!(entity = %id, capacity = self.config.capacity(), "entity registered");
        true
    }

    /// Stops tracking `id` and drops its history.
    pub fn unregister(&mut self, id: EntityId) -> Option<TrackedEntity> {
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            tracing::debug!(entity = %id, "entity unregistered");
        }
        removed
    }

    /// Replaces the traits of a tracked entity.
    pub fn set_traits(&mut self, id: EntityId, traits: EntityTraits) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.traits = traits;
                true
            }
            None => false,
        }
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&TrackedEntity> {
        self.entities.get(&id)
    }

    /// True if `id` is tracked.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Snapshot of the tracked ids, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Tracked entities, ascending id.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> + '_ {
        self.entities.values()
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity controlled by `caller`, lowest id first.
    #[must_use]
    pub fn owned_by(&self, caller: CallerId) -> Option<&TrackedEntity> {
        self.entities.values().find(|e| e.traits.owner == Some(caller))
    }

    /// Pushes one snapshot for `id`. `None` if `id` is not tracked.
    pub fn record(&mut self, id: EntityId, snapshot: PoseSnapshot) -> Option<PushOutcome> {
        let entity = self.entities.get_mut(&id)?;
        let outcome = entity.history.push(snapshot);
        if let PushOutcome::RejectedStale { newest_timestamp } = outcome {
            tracing::warn!(entity = %id, newest_timestamp, "stale snapshot rejected");
        }
        Some(outcome)
    }

    /// Runs one capture pass at `timestamp`.
    pub fn capture<F>(&mut self, timestamp: f64, feed: &mut F) -> CaptureReport
    where
        F: CaptureFeed + ?Sized,
    {
        let mut report = CaptureReport::default();
        let mut gone = Vec::new();

        for id in self.ids() {
            match feed.capture(id) {
                CaptureOutcome::Pose(parts) => {
                    let snapshot = PoseSnapshot { timestamp, parts };
                    match self.record(id, snapshot) {
                        Some(outcome) if outcome.is_stored() => report.captured += 1,
                        Some(_) => report.stale += 1,
                        None => {}
                    }
                }
                CaptureOutcome::Skip => report.skipped += 1,
                CaptureOutcome::Gone => gone.push(id),
            }
        }

        for id in gone {
            if self.unregister(id).is_some() {
                report.removed += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_shared::Vec3;

    fn parts(x: f32) -> BTreeMap<PartName, PartTransform> {
        let mut parts = BTreeMap::new();
        parts.insert("Torso".to_string(), PartTransform::at(Vec3::new(x, 0.0, 0.0), Vec3::ONE));
        parts
    }

    fn registry() -> PoseRegistry {
        PoseRegistry::new(HistoryConfig::default()).expect("default config is valid")
    }

    #[test]
    fn test_register_and_unregister() {
        let mut registry = registry();
        assert!(registry.register(EntityId(1), EntityTraits::damageable()));
        assert!(!registry.register(EntityId(1), EntityTraits::default()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(EntityId(1)).map(|e| e.traits().damageable), Some(false));

        let removed = registry.unregister(EntityId(1)).expect("was tracked");
        assert_eq!(removed.id(), EntityId(1));
        assert!(registry.is_empty());
        assert!(registry.unregister(EntityId(1)).is_none());
    }

    #[test]
    fn test_history_sized_from_config() {
        let mut registry = registry();
        registry.register(EntityId(7), EntityTraits::damageable());
        let capacity = registry.get(EntityId(7)).map(|e| e.history().capacity());
        assert_eq!(capacity, Some(HistoryConfig::default().capacity()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HistoryConfig { capture_hz: -5.0, ..HistoryConfig::default() };
        assert!(PoseRegistry::new(config).is_err());
    }

    #[test]
    fn test_capture_pass() {
        let mut registry = registry();
        for id in 1..=3 {
            registry.register(EntityId(id), EntityTraits::damageable());
        }

        let mut feed = |id: EntityId| match id.0 {
            1 => CaptureOutcome::Pose(parts(1.0)),
            2 => CaptureOutcome::Skip,
            _ => CaptureOutcome::Gone,
        };
        let report = registry.capture(0.5, &mut feed);

        assert_eq!(report, CaptureReport { captured: 1, skipped: 1, stale: 0, removed: 1 });
        assert_eq!(registry.ids(), vec![EntityId(1), EntityId(2)]);
        assert_eq!(registry.get(EntityId(1)).map(|e| e.history().len()), Some(1));
        assert_eq!(registry.get(EntityId(2)).map(|e| e.history().len()), Some(0));
    }

    #[test]
    fn test_capture_counts_stale() {
        let mut registry = registry();
        registry.register(EntityId(1), EntityTraits::damageable());
        let mut feed = |_: EntityId| CaptureOutcome::Pose(parts(0.0));
        registry.capture(2.0, &mut feed);
        let report = registry.capture(1.0, &mut feed);
        assert_eq!(report.stale, 1);
        assert_eq!(report.captured, 0);
    }

    #[test]
    fn test_owned_by() {
        let mut registry = registry();
        registry.register(EntityId(4), EntityTraits::damageable().with_owner(CallerId(9)));
        registry.register(EntityId(5), EntityTraits::damageable().with_team(TeamId(1)));
        assert_eq!(registry.owned_by(CallerId(9)).map(TrackedEntity::id), Some(EntityId(4)));
        assert!(registry.owned_by(CallerId(1)).is_none());
    }

    #[test]
    fn test_sample_through_entity() {
        let mut registry = registry();
        registry.register(EntityId(1), EntityTraits::damageable());
        registry.record(EntityId(1), PoseSnapshot { timestamp: 1.0, parts: parts(0.0) });
        registry.record(EntityId(1), PoseSnapshot { timestamp: 2.0, parts: parts(10.0) });

        let pose = registry.get(EntityId(1)).and_then(|e| e.sample(1.5)).expect("pose");
        let x = pose.part("Torso").map_or(f32::NAN, |p| p.transform.translation.x);
        assert!((x - 5.0).abs() < 1e-5);
    }
}
