//! # Hit Validation
//!
//! Geometric tests of one attack against one reconstructed pose.
//!
//! ## Philosophy
//!
//! NEVER trust the client. The client says "I hit them". We check:
//! 1. Where was the target when the client fired? (the rewinder answers)
//! 2. Does the claimed query actually touch one of its parts?
//! 3. Which part, exactly, and where?
//!
//! Every function returns the single best [`PartHit`] or `None`. Exact ties
//! on the metric go to the part whose name sorts first, so the answer never
//! depends on how a pose was assembled.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rewind_core::geometry::{self, DEGENERATE_EPSILON};
use rewind_shared::constants::{DEFAULT_HEAD_PART, DEFAULT_MAX_RAY_DISTANCE};
use rewind_shared::{PartName, PartTransform, PoseSnapshot, RigidTransform, Vec3};

/// Tuning shared by all validators for one request.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationContext {
    /// Absolute limit on ray travel.
    pub max_ray_distance: f32,
    /// Margin added to every part's size.
    pub forgiveness: f32,
    /// Per-part margins replacing `forgiveness`.
    pub part_forgiveness: BTreeMap<PartName, f32>,
    /// If false, the head part is not a candidate at all.
    pub allow_headshots: bool,
    /// Name of the head part.
    pub head_part: PartName,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            max_ray_distance: DEFAULT_MAX_RAY_DISTANCE,
            forgiveness: 0.0,
            part_forgiveness: BTreeMap::new(),
            allow_headshots: true,
            head_part: DEFAULT_HEAD_PART.to_string(),
        }
    }
}

impl ValidationContext {
    /// Default context with a different ray limit.
    #[must_use]
    pub fn with_max_ray_distance(mut self, distance: f32) -> Self {
        self.max_ray_distance = distance;
        self
    }

    /// Sets the uniform forgiveness margin.
    #[must_use]
    pub fn with_forgiveness(mut self, margin: f32) -> Self {
        self.forgiveness = margin;
        self
    }

    /// Overrides the margin of one part.
    #[must_use]
    pub fn with_part_forgiveness(mut self, part: impl Into<PartName>, margin: f32) -> Self {
        self.part_forgiveness.insert(part.into(), margin);
        self
    }

    /// Enables or disables headshots.
    #[must_use]
    pub fn with_headshots(mut self, allowed: bool) -> Self {
        self.allow_headshots = allowed;
        self
    }

    /// Margin applied to `part`.
    #[must_use]
    pub fn forgiveness_for(&self, part: &str) -> f32 {
        self.part_forgiveness.get(part).copied().unwrap_or(self.forgiveness)
    }

    /// True if `part` is the head.
    #[inline]
    #[must_use]
    pub fn is_head(&self, part: &str) -> bool {
        part == self.head_part
    }

    /// Parts of `pose` that may be hit, with forgiveness applied.
    fn candidates<'a>(&'a self, pose: &'a PoseSnapshot) -> impl Iterator<Item = (&'a str, PartTransform)> + 'a {
        pose.iter()
            .filter(move |(name, _)| self.allow_headshots || !self.is_head(name))
            .map(move |(name, part)| (name, part.expanded(self.forgiveness_for(name))))
    }
}

/// Best part touched by a query.
#[derive(Clone, Debug, PartialEq)]
pub struct PartHit {
    /// Part that was hit.
    pub part_name: PartName,
    /// World-space contact point.
    pub position: Vec3,
    /// World-space surface normal at the contact.
    pub normal: Vec3,
    /// Distance from the query origin (ray/sphere center/cone apex) to the contact.
    pub distance: f32,
    /// Ray parameter (ray and fan); equals `distance` for unit rays.
    pub t: f32,
    /// Position along a capsule sweep in `[0, 1]`; zero for other modes.
    pub fraction: f32,
    /// Whether the part is the head.
    pub is_headshot: bool,
}

/// Keeps whichever of `best` and `candidate` has the smaller metric.
///
/// Exact ties go to the part name that sorts first.
fn keep_better(best: &mut Option<PartHit>, candidate: PartHit, metric: fn(&PartHit) -> f32) {
    let replace = match best.as_ref() {
        None => true,
        Some(current) => {
            metric(&candidate)
                .total_cmp(&metric(current))
                .then_with(|| candidate.part_name.cmp(&current.part_name))
                == Ordering::Less
        }
    };
    if replace {
        *best = Some(candidate);
    }
}

fn by_t(hit: &PartHit) -> f32 {
    hit.t
}

fn by_distance(hit: &PartHit) -> f32 {
    hit.distance
}

/// Hitscan ray. `direction`'s length is the requested travel.
#[must_use]
pub fn raycast_pose(origin: Vec3, direction: Vec3, pose: &PoseSnapshot, ctx: &ValidationContext) -> Option<PartHit> {
    let length = direction.length();
    if length < DEGENERATE_EPSILON {
        return None;
    }
    let unit = direction / length;
    let travel = length.min(ctx.max_ray_distance);

    let mut best = None;
    for (name, part) in ctx.candidates(pose) {
        if let Some(hit) = geometry::ray_vs_box(origin, unit, travel, &part.transform, part.size) {
            keep_better(
                &mut best,
                PartHit {
                    part_name: name.to_string(),
                    position: origin + unit * hit.t,
                    normal: hit.normal,
                    distance: hit.t,
                    t: hit.t,
                    fraction: 0.0,
                    is_headshot: ctx.is_head(name),
                },
                by_t,
            );
        }
    }
    best
}

/// Area burst: the part whose closest point is nearest `center`.
#[must_use]
pub fn sphere_pose(center: Vec3, radius: f32, pose: &PoseSnapshot, ctx: &ValidationContext) -> Option<PartHit> {
    let mut best = None;
    for (name, part) in ctx.candidates(pose) {
        if let Some(closest) = geometry::sphere_vs_box(center, radius, &part.transform, part.size) {
            let distance = closest.distance(center);
            keep_better(
                &mut best,
                PartHit {
                    part_name: name.to_string(),
                    position: closest,
                    normal: outward_normal(center, closest, &part),
                    distance,
                    t: distance,
                    fraction: 0.0,
                    is_headshot: ctx.is_head(name),
                },
                by_distance,
            );
        }
    }
    best
}

/// Thick sweep from `a` to `b`, sampled as `steps + 1` spheres.
///
/// The earliest sphere along the sweep that touches anything wins.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn capsule_sweep_pose(
    a: Vec3,
    b: Vec3,
    radius: f32,
    pose: &PoseSnapshot,
    ctx: &ValidationContext,
    steps: u32,
) -> Option<PartHit> {
    if a.distance(b) < DEGENERATE_EPSILON {
        return sphere_pose(a, radius, pose, ctx);
    }

    let steps = steps.max(1);
    (0..=steps).find_map(|i| {
        let fraction = i as f32 / steps as f32;
        sphere_pose(a.lerp(b, fraction), radius, pose, ctx).map(|hit| PartHit { fraction, ..hit })
    })
}

/// Melee cone from `origin` along its forward axis (`-Z`).
#[must_use]
pub fn cone_pose(
    origin: &RigidTransform,
    range: f32,
    half_angle_deg: f32,
    pose: &PoseSnapshot,
    ctx: &ValidationContext,
) -> Option<PartHit> {
    let apex = origin.translation;
    let forward = origin.forward();
    let half_angle = half_angle_deg.to_radians();
    let range_sq = range * range;

    let mut best = None;
    for (name, part) in ctx.candidates(pose) {
        let closest = geometry::closest_point_on_box(apex, &part.transform, part.size);
        let to_part = closest - apex;
        let distance_sq = to_part.length_squared();
        if distance_sq > range_sq {
            continue;
        }
        if geometry::angle_between(forward, to_part) > half_angle {
            continue;
        }
        let distance = distance_sq.sqrt();
        keep_better(
            &mut best,
            PartHit {
                part_name: name.to_string(),
                position: closest,
                normal: outward_normal(apex, closest, &part),
                distance,
                t: distance,
                fraction: 0.0,
                is_headshot: ctx.is_head(name),
            },
            by_distance,
        );
    }
    best
}

/// Melee fan: `ray_count` rays of length `range` spread evenly over
/// `angle_deg` of yaw, centred on forward.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fan_rays_pose(
    origin: &RigidTransform,
    range: f32,
    angle_deg: f32,
    ray_count: u32,
    pose: &PoseSnapshot,
    ctx: &ValidationContext,
) -> Option<PartHit> {
    if ray_count <= 1 {
        return raycast_pose(origin.translation, origin.forward() * range, pose, ctx);
    }

    let spread = angle_deg.to_radians();
    let step = spread / (ray_count - 1) as f32;

    let mut best = None;
    for i in 0..ray_count {
        let yaw = -spread * 0.5 + step * i as f32;
        let direction = origin.yawed(yaw).forward() * range;
        if let Some(hit) = raycast_pose(origin.translation, direction, pose, ctx) {
            keep_better(&mut best, hit, by_t);
        }
    }
    best
}

/// Normal pointing from the box surface toward `from`.
///
/// Falls back to box-center → `from`, then to world up, when `from` is
/// inside the box.
fn outward_normal(from: Vec3, surface: Vec3, part: &PartTransform) -> Vec3 {
    (from - surface)
        .try_normalize()
        .or_else(|| (from - part.transform.translation).try_normalize())
        .unwrap_or(Vec3::Y)
}
