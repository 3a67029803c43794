//! Request outcome types.
//!
//! Everything a remote caller gets back from a validation request. These are
//! expected, frequent outcomes of untrusted input, so they are plain values,
//! never panics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::EntityId;
use crate::math::Vec3;

/// Geometric query family of an attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AttackMode {
    /// Hitscan ray.
    Ray = 0,
    /// Area burst.
    Sphere = 1,
    /// Thick projectile sweep.
    Capsule = 2,
    /// Melee arc (volume test).
    Cone = 3,
    /// Melee arc (ray spread).
    Fan = 4,
}

impl AttackMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ray => "ray",
            Self::Sphere => "sphere",
            Self::Capsule => "capsule",
            Self::Cone => "cone",
            Self::Fan => "fan",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ray" => Some(Self::Ray),
            "sphere" => Some(Self::Sphere),
            "capsule" => Some(Self::Capsule),
            "cone" => Some(Self::Cone),
            "fan" => Some(Self::Fan),
            _ => None,
        }
    }
}

/// Why a request did not produce a hit.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Caller exceeded its token bucket.
    #[error("rate_limited")]
    RateLimited,
    /// Shot id already seen inside the dedup window.
    #[error("duplicate_shot")]
    DuplicateShot,
    /// Nothing was hit.
    #[error("no_hit")]
    NoHit,
    /// Best candidate has no damageable representation.
    #[error("no_humanoid")]
    NoHumanoid,
    /// Best candidate is on the caller's team.
    #[error("friendly_fire")]
    FriendlyFire,
    /// Claimed origin is implausibly far from the caller.
    #[error("out_of_range")]
    OutOfRange,
    /// Malformed request.
    #[error("invalid_params")]
    InvalidParams,
    /// Entry point invoked outside the authoritative process.
    #[error("not_server")]
    NotServer,
}

impl RejectReason {
    /// Stable wire code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::DuplicateShot => "duplicate_shot",
            Self::NoHit => "no_hit",
            Self::NoHumanoid => "no_humanoid",
            Self::FriendlyFire => "friendly_fire",
            Self::OutOfRange => "out_of_range",
            Self::InvalidParams => "invalid_params",
            Self::NotServer => "not_server",
        }
    }
}

/// Outcome of one validation request.
///
/// Produced once per request and not retained by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// Did the attack land?
    pub hit: bool,
    /// Entity that was hit.
    pub target_id: Option<EntityId>,
    /// Part that was hit.
    pub part_name: Option<String>,
    /// World-space point of contact.
    pub hit_position: Option<Vec3>,
    /// World-space surface normal at the contact.
    pub hit_normal: Option<Vec3>,
    /// Whether the head part was hit.
    pub is_headshot: Option<bool>,
    /// Authority time the world was rewound to (seconds).
    pub rewind_to: f64,
    /// How far back that is, in milliseconds.
    pub used_rewind_ms: f64,
    /// Rejection reason when `hit` is false.
    pub reason: Option<RejectReason>,
}

impl HitResult {
    /// Rejected request.
    #[must_use]
    pub const fn rejected(reason: RejectReason, rewind_to: f64, used_rewind_ms: f64) -> Self {
        Self {
            hit: false,
            target_id: None,
            part_name: None,
            hit_position: None,
            hit_normal: None,
            is_headshot: None,
            rewind_to,
            used_rewind_ms,
            reason: Some(reason),
        }
    }

    /// Successful hit.
    #[must_use]
    pub fn landed(
        target_id: EntityId,
        part_name: String,
        hit_position: Vec3,
        hit_normal: Vec3,
        is_headshot: bool,
        rewind_to: f64,
        used_rewind_ms: f64,
    ) -> Self {
        Self {
            hit: true,
            target_id: Some(target_id),
            part_name: Some(part_name),
            hit_position: Some(hit_position),
            hit_normal: Some(hit_normal),
            is_headshot: Some(is_headshot),
            rewind_to,
            used_rewind_ms,
            reason: None,
        }
    }
}
