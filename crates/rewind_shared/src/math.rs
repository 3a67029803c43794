//! Mathematical types shared between the capture feed and the server.
//!
//! Vectors and quaternions come from `glam`. This module adds the rigid
//! transform every hit volume and query origin is expressed in.
//!
//! ## Conventions
//!
//! - Right-handed, `+Y` up.
//! - "Forward" is `-Z` of a transform's rotation.

use serde::{Deserialize, Serialize};

pub use glam::{Quat, Vec3};

/// Rotation + translation, no scale.
///
/// Scale lives in the part size instead, so a transform can always be
/// inverted exactly by conjugating its rotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Orientation (unit quaternion).
    pub rotation: Quat,
    /// World position of the local origin.
    pub translation: Vec3,
}

impl RigidTransform {
    /// Identity transform.
    pub const IDENTITY: Self = Self::new(Quat::IDENTITY, Vec3::ZERO);

    /// Creates a new transform.
    #[must_use]
    pub const fn new(rotation: Quat, translation: Vec3) -> Self {
        Self { rotation, translation }
    }

    /// Pure translation.
    #[must_use]
    pub const fn from_translation(translation: Vec3) -> Self {
        Self::new(Quat::IDENTITY, translation)
    }

    /// Transform at `translation` whose forward axis (`-Z`) points along `forward`.
    ///
    /// A zero-length `forward` yields an unrotated transform.
    #[must_use]
    pub fn looking_along(translation: Vec3, forward: Vec3) -> Self {
        let rotation = match forward.try_normalize() {
            Some(dir) => Quat::from_rotation_arc(Vec3::NEG_Z, dir),
            None => Quat::IDENTITY,
        };
        Self::new(rotation, translation)
    }

    /// Forward axis in world space.
    #[inline]
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Up axis in world space.
    #[inline]
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Local point → world point.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// World point → local point.
    #[inline]
    #[must_use]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.translation)
    }

    /// Local direction → world direction.
    #[inline]
    #[must_use]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// World direction → local direction.
    #[inline]
    #[must_use]
    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.inverse() * vector
    }

    /// Blends toward `other`: translation lerp, rotation slerp.
    #[must_use]
    pub fn interpolate(&self, other: &Self, alpha: f32) -> Self {
        Self {
            rotation: self.rotation.slerp(other.rotation, alpha).normalize(),
            translation: self.translation.lerp(other.translation, alpha),
        }
    }

    /// Same position, rotated by `yaw` radians about the local up axis.
    #[must_use]
    pub fn yawed(&self, yaw: f32) -> Self {
        Self {
            rotation: (self.rotation * Quat::from_rotation_y(yaw)).normalize(),
            translation: self.translation,
        }
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
