//! # Attack Requests
//!
//! What a caller claims when it attacks.
//!
//! Typed requests come in through the per-mode entry points. The generic
//! entry point takes a mode tag plus an [`AttackParams`] bag holding the
//! union of every mode's fields, and converts it here.

use rewind_security::ShotId;
use rewind_shared::{AttackMode, Quat, RigidTransform, Vec3};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Fields shared by every attack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Weapon profile id.
    pub weapon_id: String,
    /// Authority time at which the caller fired, as the caller estimated it.
    pub client_time: Option<f64>,
    /// Caller-chosen shot id for duplicate suppression; required for
    /// non-melee weapons.
    pub shot_id: Option<ShotId>,
}

impl RequestMeta {
    /// Meta for `weapon_id` with no timestamp and no shot id.
    #[must_use]
    pub fn new(weapon_id: impl Into<String>) -> Self {
        Self { weapon_id: weapon_id.into(), client_time: None, shot_id: None }
    }

    /// Sets the client timestamp.
    #[must_use]
    pub const fn at(mut self, client_time: f64) -> Self {
        self.client_time = Some(client_time);
        self
    }

    /// Sets the shot id.
    #[must_use]
    pub const fn shot(mut self, shot_id: ShotId) -> Self {
        self.shot_id = Some(shot_id);
        self
    }
}

/// Hitscan ray; `direction`'s length is the requested travel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RayAttack {
    /// Muzzle position.
    pub origin: Vec3,
    /// Direction scaled by travel.
    pub direction: Vec3,
}

/// Area burst.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SphereAttack {
    /// Burst center.
    pub center: Vec3,
    /// Burst radius, capped by the weapon's distance.
    pub radius: f32,
}

/// Thick projectile sweep. Missing tuning comes from the weapon; larger
/// values are cut down to it and the sweep to the weapon's distance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapsuleAttack {
    /// Sweep start.
    pub start: Vec3,
    /// Sweep end.
    pub end: Vec3,
    /// Sweep radius override.
    pub radius: Option<f32>,
    /// Step count override.
    pub steps: Option<u32>,
}

/// Melee cone. Missing tuning comes from the weapon; larger values are cut
/// down to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConeAttack {
    /// Apex; forward is `-Z`.
    pub origin: RigidTransform,
    /// Reach, capped by the weapon's melee range.
    pub range: Option<f32>,
    /// Half-angle in degrees.
    pub half_angle_deg: Option<f32>,
}

/// Melee ray fan. Missing tuning comes from the weapon; larger values are
/// cut down to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FanAttack {
    /// Fan origin; forward is `-Z`.
    pub origin: RigidTransform,
    /// Ray length, capped by the weapon's melee range.
    pub range: Option<f32>,
    /// Full spread in degrees.
    pub angle_deg: Option<f32>,
    /// Ray count.
    pub ray_count: Option<u32>,
}

/// The geometric part of an attack.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttackShape {
    /// Hitscan ray.
    Ray(RayAttack),
    /// Area burst.
    Sphere(SphereAttack),
    /// Projectile sweep.
    Capsule(CapsuleAttack),
    /// Melee cone.
    Cone(ConeAttack),
    /// Melee fan.
    Fan(FanAttack),
}

impl AttackShape {
    /// Query family.
    #[must_use]
    pub const fn mode(&self) -> AttackMode {
        match self {
            Self::Ray(_) => AttackMode::Ray,
            Self::Sphere(_) => AttackMode::Sphere,
            Self::Capsule(_) => AttackMode::Capsule,
            Self::Cone(_) => AttackMode::Cone,
            Self::Fan(_) => AttackMode::Fan,
        }
    }

    /// Where the query starts; checked against the caller's position.
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        match self {
            Self::Ray(ray) => ray.origin,
            Self::Sphere(sphere) => sphere.center,
            Self::Capsule(capsule) => capsule.start,
            Self::Cone(cone) => cone.origin.translation,
            Self::Fan(fan) => fan.origin.translation,
        }
    }

    /// Rejects NaN/infinite geometry and negative sizes.
    ///
    /// # Errors
    ///
    /// The first offending field.
    pub fn check(&self) -> Result<(), ProtocolError> {
        match self {
            Self::Ray(ray) => {
                finite_vec("origin", ray.origin)?;
                finite_vec("direction", ray.direction)
            }
            Self::Sphere(sphere) => {
                finite_vec("center", sphere.center)?;
                non_negative("radius", sphere.radius)
            }
            Self::Capsule(capsule) => {
                finite_vec("origin", capsule.start)?;
                finite_vec("end", capsule.end)?;
                capsule.radius.map_or(Ok(()), |r| non_negative("radius", r))
            }
            Self::Cone(cone) => {
                finite_transform(&cone.origin)?;
                cone.range.map_or(Ok(()), |r| non_negative("range", r))?;
                cone.half_angle_deg.map_or(Ok(()), |a| non_negative("angle_deg", a))
            }
            Self::Fan(fan) => {
                finite_transform(&fan.origin)?;
                fan.range.map_or(Ok(()), |r| non_negative("range", r))?;
                fan.angle_deg.map_or(Ok(()), |a| non_negative("angle_deg", a))
            }
        }
    }
}

/// One attack claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackRequest {
    /// Weapon, timestamp, shot id.
    pub meta: RequestMeta,
    /// Query geometry.
    pub shape: AttackShape,
}

impl AttackRequest {
    /// Builds a request.
    #[must_use]
    pub const fn new(meta: RequestMeta, shape: AttackShape) -> Self {
        Self { meta, shape }
    }

    /// Query family.
    #[must_use]
    pub const fn mode(&self) -> AttackMode {
        self.shape.mode()
    }

    /// Rejects malformed fields.
    ///
    /// # Errors
    ///
    /// The first offending field.
    pub fn check(&self) -> Result<(), ProtocolError> {
        if self.meta.weapon_id.is_empty() {
            return Err(ProtocolError::MissingField("weapon_id"));
        }
        if let Some(t) = self.meta.client_time {
            if !t.is_finite() {
                return Err(ProtocolError::NonFinite("client_time"));
            }
        }
        self.shape.check()
    }
}

/// Superset parameter bag for the generic entry point.
///
/// Which fields are required depends on the mode:
///
/// | mode    | required                         | optional                         |
/// |---------|----------------------------------|----------------------------------|
/// | ray     | origin, direction                |                                  |
/// | sphere  | origin (center), radius          |                                  |
/// | capsule | origin, end                      | radius, steps                    |
/// | cone    | origin, rotation or direction    | range, angle_deg (half-angle)    |
/// | fan     | origin, rotation or direction    | range, angle_deg, ray_count      |
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackParams {
    /// Weapon profile id.
    pub weapon_id: Option<String>,
    /// Client timestamp.
    pub client_time: Option<f64>,
    /// Shot id.
    pub shot_id: Option<ShotId>,
    /// Ray origin, sphere center, sweep start or melee apex.
    pub origin: Option<Vec3>,
    /// Ray direction (scaled by travel), or melee facing.
    pub direction: Option<Vec3>,
    /// Sweep end.
    pub end: Option<Vec3>,
    /// Melee orientation; wins over `direction`.
    pub rotation: Option<Quat>,
    /// Sphere or sweep radius.
    pub radius: Option<f32>,
    /// Melee reach.
    pub range: Option<f32>,
    /// Cone half-angle or fan spread, in degrees.
    pub angle_deg: Option<f32>,
    /// Fan ray count.
    pub ray_count: Option<u32>,
    /// Sweep step count.
    pub steps: Option<u32>,
}

impl AttackParams {
    /// Converts the bag into a typed request for `mode`.
    ///
    /// # Errors
    ///
    /// A required field is missing or a field is not finite.
    pub fn into_request(self, mode: AttackMode) -> Result<AttackRequest, ProtocolError> {
        let weapon_id = self.weapon_id.clone().ok_or(ProtocolError::MissingField("weapon_id"))?;
        let origin = self.origin.ok_or(ProtocolError::MissingField("origin"))?;

        let shape = match mode {
            AttackMode::Ray => AttackShape::Ray(RayAttack {
                origin,
                direction: self.direction.ok_or(ProtocolError::MissingField("direction"))?,
            }),
            AttackMode::Sphere => AttackShape::Sphere(SphereAttack {
                center: origin,
                radius: self.radius.ok_or(ProtocolError::MissingField("radius"))?,
            }),
            AttackMode::Capsule => AttackShape::Capsule(CapsuleAttack {
                start: origin,
                end: self.end.ok_or(ProtocolError::MissingField("end"))?,
                radius: self.radius,
                steps: self.steps,
            }),
            AttackMode::Cone => AttackShape::Cone(ConeAttack {
                origin: self.melee_origin(origin)?,
                range: self.range,
                half_angle_deg: self.angle_deg,
            }),
            AttackMode::Fan => AttackShape::Fan(FanAttack {
                origin: self.melee_origin(origin)?,
                range: self.range,
                angle_deg: self.angle_deg,
                ray_count: self.ray_count,
            }),
        };

        let request = AttackRequest::new(
            RequestMeta { weapon_id, client_time: self.client_time, shot_id: self.shot_id },
            shape,
        );
        request.check()?;
        Ok(request)
    }

    fn melee_origin(&self, origin: Vec3) -> Result<RigidTransform, ProtocolError> {
        if let Some(rotation) = self.rotation {
            if !rotation.is_finite() {
                return Err(ProtocolError::NonFinite("rotation"));
            }
            return Ok(RigidTransform::new(rotation.normalize(), origin));
        }
        let facing = self.direction.ok_or(ProtocolError::MissingField("rotation"))?;
        finite_vec("direction", facing)?;
        Ok(RigidTransform::looking_along(origin, facing))
    }
}

fn finite_vec(field: &'static str, v: Vec3) -> Result<(), ProtocolError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFinite(field))
    }
}

fn finite_transform(t: &RigidTransform) -> Result<(), ProtocolError> {
    if !t.rotation.is_finite() {
        return Err(ProtocolError::NonFinite("rotation"));
    }
    finite_vec("origin", t.translation)
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ProtocolError> {
    if !value.is_finite() {
        Err(ProtocolError::NonFinite(field))
    } else if value < 0.0 {
        Err(ProtocolError::Negative(field))
    } else {
        Ok(())
    }
}
