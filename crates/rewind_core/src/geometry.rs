//! # Geometry Kernel
//!
//! Pure intersection math against oriented boxes.
//!
//! Every function here is allocation-free and deterministic: identical inputs
//! always produce identical outputs, which is what makes recorded fights
//! replayable.
//!
//! ```text
//!          world                         box-local
//!   origin ●──────▶ dir        ==>   ●──────▶   ┌──────┐
//!                ┌──────┐  rotate⁻¹, translate⁻¹ │ ±half│
//!               ╱      ╱│                         └──────┘
//! ```
//!
//! Queries are moved into the box's local frame, where the box is an AABB
//! of `±size/2`, then results are moved back.

use rewind_shared::{RigidTransform, Vec3};

/// Directions shorter than this are degenerate.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

/// Local direction components below this are treated as parallel to a slab.
const PARALLEL_EPSILON: f32 = 1e-8;

/// Ray/box intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayBoxHit {
    /// Distance along the (unit) ray to the entry point.
    pub t: f32,
    /// World-space normal of the entry face.
    pub normal: Vec3,
}

/// Slab test of a ray against an oriented box.
///
/// `unit_dir` must be normalized; callers reject degenerate directions before
/// getting here. A ray that starts inside the box hits at `t = 0` and reports
/// the reversed ray direction as its normal.
#[must_use]
pub fn ray_vs_box(
    origin: Vec3,
    unit_dir: Vec3,
    max_dist: f32,
    box_transform: &RigidTransform,
    box_size: Vec3,
) -> Option<RayBoxHit> {
    let local_origin = box_transform.inverse_transform_point(origin);
    let local_dir = box_transform.inverse_transform_vector(unit_dir);
    let half = box_size.abs() * 0.5;

    let mut t_entry = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut entry_normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = local_origin[axis];
        let d = local_dir[axis];
        let h = half[axis];

        if d.abs() < PARALLEL_EPSILON {
            if o < -h || o > h {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut near = (-h - o) * inv;
        let mut far = (h - o) * inv;
        // Travelling +axis enters through the -half face.
        let mut face = -1.0;
        if near > far {
            std::mem::swap(&mut near, &mut far);
            face = 1.0;
        }

        if near > t_entry {
            t_entry = near;
            entry_normal = Vec3::ZERO;
            entry_normal[axis] = face;
        }
        t_exit = t_exit.min(far);

        if t_entry > t_exit {
            return None;
        }
    }

    if t_exit < 0.0 || !t_entry.is_finite() {
        return None;
    }

    let t = t_entry.max(0.0);
    if t > max_dist {
        return None;
    }

    let normal = if t_entry < 0.0 {
        -unit_dir
    } else {
        box_transform.transform_vector(entry_normal)
    };

    Some(RayBoxHit { t, normal })
}

/// Closest point on (or in) an oriented box to `point`.
#[must_use]
pub fn closest_point_on_box(point: Vec3, box_transform: &RigidTransform, box_size: Vec3) -> Vec3 {
    let half = box_size.abs() * 0.5;
    let local = box_transform.inverse_transform_point(point);
    box_transform.transform_point(local.clamp(-half, half))
}

/// Sphere/box overlap. Returns the closest point on the box when overlapping.
#[must_use]
pub fn sphere_vs_box(
    center: Vec3,
    radius: f32,
    box_transform: &RigidTransform,
    box_size: Vec3,
) -> Option<Vec3> {
    let closest = closest_point_on_box(center, box_transform, box_size);
    if closest.distance_squared(center) <= radius * radius {
        Some(closest)
    } else {
        None
    }
}

/// Angle between two vectors in `[0, π]`.
///
/// Zero if either input has zero length.
#[must_use]
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    let la = a.length();
    let lb = b.length();
    if la < DEGENERATE_EPSILON || lb < DEGENERATE_EPSILON {
        return 0.0;
    }
    (a.dot(b) / (la * lb)).clamp(-1.0, 1.0).acos()
}
