//! Telemetry events published after every validation request.
//!
//! Strictly best-effort: nothing in the server waits on, or depends on, a
//! consumer of these events. The debug payload exists for external
//! visualization tools.

use serde::{Deserialize, Serialize};

use crate::ids::{CallerId, EntityId};
use crate::math::{RigidTransform, Vec3};
use crate::pose::PoseSnapshot;
use crate::protocol::{AttackMode, HitResult};

/// Query geometry exactly as the server evaluated it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryGeometry {
    /// Hitscan ray.
    Ray {
        /// Ray start.
        origin: Vec3,
        /// Direction; its length is the requested travel.
        direction: Vec3,
        /// Travel after clamping.
        max_distance: f32,
    },
    /// Area burst.
    Sphere {
        /// Sphere center.
        center: Vec3,
        /// Sphere radius.
        radius: f32,
    },
    /// Thick sweep from `a` to `b`.
    Capsule {
        /// Sweep start.
        a: Vec3,
        /// Sweep end.
        b: Vec3,
        /// Sweep radius.
        radius: f32,
        /// Number of sphere steps.
        steps: u32,
    },
    /// Melee cone.
    Cone {
        /// Apex transform (forward is `-Z`).
        origin: RigidTransform,
        /// Reach.
        range: f32,
        /// Half-angle in degrees.
        half_angle_deg: f32,
    },
    /// Melee ray fan.
    Fan {
        /// Fan origin (forward is `-Z`).
        origin: RigidTransform,
        /// Ray length.
        range: f32,
        /// Full spread in degrees.
        angle_deg: f32,
        /// Number of rays.
        ray_count: u32,
    },
}

/// Verbose payload attached when debug telemetry is enabled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugPayload {
    /// Query geometry used.
    pub geometry: QueryGeometry,
    /// Rewound pose of the winning candidate, if any.
    pub rewound_pose: Option<(EntityId, PoseSnapshot)>,
    /// Number of candidates sampled.
    pub candidates_sampled: u32,
}

/// One validation request, as observed by telemetry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    /// Who attacked.
    pub caller: CallerId,
    /// Query family.
    pub mode: AttackMode,
    /// Weapon profile id.
    pub weapon_id: String,
    /// Final outcome.
    pub result: HitResult,
    /// Verbose payload.
    pub debug: Option<DebugPayload>,
}
