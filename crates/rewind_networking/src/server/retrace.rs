//! # Ghost Re-trace
//!
//! Optional second opinion on where a ray-based hit touched the target.
//!
//! The analytic validator already decided hit or miss. A refiner may only
//! move the reported contact point and normal; it never turns a hit into a
//! miss or switches the part.
//!
//! ```text
//!  analytic PartHit ──► HitRefiner::refine ──► Some(Refinement) → replace point/normal
//!                                          └─► None            → keep analytic
//! ```

use rewind_security::{PartHit, ValidationContext};
use rewind_shared::{PoseSnapshot, RigidTransform, Vec3};

/// The ray that produced the analytic hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayQuery {
    /// Ray start.
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
    /// Travel after clamping.
    pub max_distance: f32,
}

/// Replacement contact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Refinement {
    /// World-space contact point.
    pub position: Vec3,
    /// World-space surface normal.
    pub normal: Vec3,
}

/// Strategy for refining a ray hit.
pub trait HitRefiner: Send + Sync {
    /// Better contact for `analytic`, or `None` to keep it.
    fn refine(
        &self,
        query: &RayQuery,
        pose: &PoseSnapshot,
        analytic: &PartHit,
        ctx: &ValidationContext,
    ) -> Option<Refinement>;
}

/// Keeps the analytic answer.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalyticRefiner;

impl HitRefiner for AnalyticRefiner {
    fn refine(&self, _: &RayQuery, _: &PoseSnapshot, _: &PartHit, _: &ValidationContext) -> Option<Refinement> {
        None
    }
}

/// Handle to temporary scene geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GhostId(pub u64);

/// Contact reported by the scene's raycaster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GhostHit {
    /// Geometry that was hit.
    pub ghost: GhostId,
    /// World-space contact point.
    pub position: Vec3,
    /// World-space surface normal.
    pub normal: Vec3,
}

/// Host physics scene able to hold temporary, non-colliding boxes.
///
/// Ghosts must never affect gameplay collision; only [`raycast`](Self::raycast)
/// may see them.
pub trait GhostScene: Send + Sync {
    /// Adds a box of `size` (full extents) at `transform`.
    fn spawn_box(&self, transform: &RigidTransform, size: Vec3) -> GhostId;

    /// Casts against the listed ghosts only. `direction` is unit length.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, only: &[GhostId]) -> Option<GhostHit>;

    /// Removes a ghost.
    fn despawn(&self, ghost: GhostId);
}

/// Re-casts the ray against the rewound pose materialized in a [`GhostScene`].
#[derive(Debug)]
pub struct GhostRetrace<S> {
    scene: S,
}

impl<S: GhostScene> GhostRetrace<S> {
    /// Refiner over `scene`.
    #[must_use]
    pub const fn new(scene: S) -> Self {
        Self { scene }
    }

    /// The underlying scene.
    #[must_use]
    pub const fn scene(&self) -> &S {
        &self.scene
    }
}

impl<S: GhostScene> HitRefiner for GhostRetrace<S> {
    fn refine(
        &self,
        query: &RayQuery,
        pose: &PoseSnapshot,
        analytic: &PartHit,
        ctx: &ValidationContext,
    ) -> Option<Refinement> {
        let part = pose.part(&analytic.part_name)?.expanded(ctx.forgiveness_for(&analytic.part_name));

        let ghost = self.scene.spawn_box(&part.transform, part.size);
        let hit = self.scene.raycast(query.origin, query.direction, query.max_distance, &[ghost]);
        self.scene.despawn(ghost);

        hit.filter(|h| h.ghost == ghost).map(|h| Refinement { position: h.position, normal: h.normal })
    }
}
