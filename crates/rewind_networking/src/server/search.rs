//! Target search: one resolved query against every rewound candidate.

use std::cmp::Ordering;

use rewind_core::PoseRegistry;
use rewind_security::{
    capsule_sweep_pose, cone_pose, fan_rays_pose, raycast_pose, sphere_pose, PartHit, ValidationContext,
};
use rewind_shared::{CallerId, EntityId, PoseSnapshot, QueryGeometry, Vec3};

use super::retrace::RayQuery;
use super::weapons::WeaponProfile;
use crate::protocol::AttackShape;

/// Best hit so far, with the pose it was found on.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    pub entity: EntityId,
    pub hit: PartHit,
    pub pose: PoseSnapshot,
}

/// Request tuning for one weapon on top of the server defaults.
pub(crate) fn weapon_context(base: &ValidationContext, weapon: &WeaponProfile) -> ValidationContext {
    let mut ctx = base.clone();
    ctx.max_ray_distance = ctx.max_ray_distance.min(weapon.max_distance);
    ctx.forgiveness += weapon.extra_forgiveness;
    for margin in ctx.part_forgiveness.values_mut() {
        *margin += weapon.extra_forgiveness;
    }
    ctx
}

/// Fills every unset knob from the weapon and caps the rest at the weapon's values.
///
/// The caller may narrow an attack, never widen it: reach, radius, angle and
/// sample counts above the weapon's are cut down to them.
pub(crate) fn resolve(shape: &AttackShape, weapon: &WeaponProfile, ctx: &ValidationContext) -> QueryGeometry {
    match *shape {
        AttackShape::Ray(ray) => QueryGeometry::Ray {
            origin: ray.origin,
            direction: ray.direction,
            max_distance: ray.direction.length().min(ctx.max_ray_distance),
        },
        AttackShape::Sphere(sphere) => {
            QueryGeometry::Sphere { center: sphere.center, radius: sphere.radius.min(ctx.max_ray_distance) }
        }
        AttackShape::Capsule(capsule) => QueryGeometry::Capsule {
            a: capsule.start,
            b: capsule.start + (capsule.end - capsule.start).clamp_length_max(ctx.max_ray_distance),
            radius: capped(capsule.radius, weapon.capsule_radius),
            steps: capped(capsule.steps, weapon.capsule_steps),
        },
        AttackShape::Cone(cone) => QueryGeometry::Cone {
            origin: cone.origin,
            range: capped(cone.range, weapon.melee_range),
            half_angle_deg: capped(cone.half_angle_deg, weapon.melee_angle * 0.5),
        },
        AttackShape::Fan(fan) => QueryGeometry::Fan {
            origin: fan.origin,
            range: capped(fan.range, weapon.melee_range),
            angle_deg: capped(fan.angle_deg, weapon.melee_angle),
            ray_count: capped(fan.ray_count, weapon.melee_rays).max(1),
        },
    }
}

/// The requested value, or the weapon's when absent or larger.
fn capped<T: PartialOrd + Copy>(requested: Option<T>, weapon: T) -> T {
    match requested {
        Some(value) if value < weapon => value,
        _ => weapon,
    }
}

/// Runs the mode's validator against one pose.
pub(crate) fn test_pose(query: &QueryGeometry, pose: &PoseSnapshot, ctx: &ValidationContext) -> Option<PartHit> {
    match *query {
        QueryGeometry::Ray { origin, direction, .. } => raycast_pose(origin, direction, pose, ctx),
        QueryGeometry::Sphere { center, radius } => sphere_pose(center, radius, pose, ctx),
        QueryGeometry::Capsule { a, b, radius, steps } => capsule_sweep_pose(a, b, radius, pose, ctx, steps),
        QueryGeometry::Cone { origin, range, half_angle_deg } => cone_pose(&origin, range, half_angle_deg, pose, ctx),
        QueryGeometry::Fan { origin, range, angle_deg, ray_count } => {
            fan_rays_pose(&origin, range, angle_deg, ray_count, pose, ctx)
        }
    }
}

/// Ordering key: smaller is better.
fn rank(query: &QueryGeometry, hit: &PartHit) -> (f32, f32) {
    match query {
        QueryGeometry::Ray { .. } | QueryGeometry::Fan { .. } => (hit.t, 0.0),
        QueryGeometry::Sphere { .. } | QueryGeometry::Cone { .. } => (hit.distance, 0.0),
        QueryGeometry::Capsule { .. } => (hit.fraction, hit.distance),
    }
}

fn better(query: &QueryGeometry, candidate: &PartHit, current: &PartHit) -> bool {
    let (a0, a1) = rank(query, candidate);
    let (b0, b1) = rank(query, current);
    a0.total_cmp(&b0).then_with(|| a1.total_cmp(&b1)) == Ordering::Less
}

/// Where the query starts.
pub(crate) const fn query_origin(query: &QueryGeometry) -> Vec3 {
    match query {
        QueryGeometry::Ray { origin, .. } => *origin,
        QueryGeometry::Sphere { center, .. } => *center,
        QueryGeometry::Capsule { a, .. } => *a,
        QueryGeometry::Cone { origin, .. } | QueryGeometry::Fan { origin, .. } => origin.translation,
    }
}

/// The ray that produced `hit`, for ray-based modes.
pub(crate) fn ray_query(query: &QueryGeometry, hit: &PartHit) -> Option<RayQuery> {
    match *query {
        QueryGeometry::Ray { origin, direction, max_distance } => {
            Some(RayQuery { origin, direction: direction.try_normalize()?, max_distance })
        }
        QueryGeometry::Fan { origin, range, .. } => Some(RayQuery {
            origin: origin.translation,
            direction: (hit.position - origin.translation).try_normalize()?,
            max_distance: range,
        }),
        _ => None,
    }
}

/// Samples every tracked entity except the caller's own at `rewind_to`.
///
/// Returns the best candidate and how many entities were sampled. Iteration
/// is in ascending id order and only a strictly better hit replaces the
/// current best, so exact ties go to the lower id.
pub(crate) fn search(
    registry: &PoseRegistry,
    caller: CallerId,
    query: &QueryGeometry,
    ctx: &ValidationContext,
    rewind_to: f64,
    scale: f32,
) -> (Option<Candidate>, u32) {
    let mut best: Option<Candidate> = None;
    let mut sampled = 0u32;

    for id in registry.ids() {
        let Some(entity) = registry.get(id) else {
            continue;
        };
        if entity.traits().owner == Some(caller) {
            continue;
        }
        let Some(mut pose) = entity.sample(rewind_to) else {
            continue;
        };
        sampled += 1;
        if (scale - 1.0).abs() > f32::EPSILON {
            pose = pose.scaled(scale);
        }

        let Some(hit) = test_pose(query, &pose, ctx) else {
            continue;
        };
        if best.as_ref().map_or(true, |current| better(query, &hit, &current.hit)) {
            best = Some(Candidate { entity: id, hit, pose });
        }
    }

    (best, sampled)
}

/// Newest-pose centroid of the entity `caller` controls.
pub(crate) fn owned_position(registry: &PoseRegistry, caller: CallerId) -> Option<Vec3> {
    let pose = registry.owned_by(caller)?.history().last()?;
    if pose.is_empty() {
        return None;
    }
    let sum = pose.iter().fold(Vec3::ZERO, |acc, (_, part)| acc + part.transform.translation);
    #[allow(clippy::cast_precision_loss)]
    let count = pose.len() as f32;
    Some(sum / count)
}
