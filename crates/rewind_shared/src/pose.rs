//! Pose types: one entity's named part boxes at one instant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::math::{RigidTransform, Vec3};

/// Name of a skeletal part ("Head", "Torso", "LeftArm", ...).
pub type PartName = String;

/// One part's oriented bounding box at an instant.
///
/// Immutable once captured.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartTransform {
    /// Box center and orientation.
    pub transform: RigidTransform,
    /// Full extent along each local axis.
    pub size: Vec3,
}

impl PartTransform {
    /// Creates a new part transform.
    #[must_use]
    pub const fn new(transform: RigidTransform, size: Vec3) -> Self {
        Self { transform, size }
    }

    /// Axis-aligned (unrotated) box centered at `center`.
    #[must_use]
    pub const fn at(center: Vec3, size: Vec3) -> Self {
        Self::new(RigidTransform::from_translation(center), size)
    }

    /// Half of `size`.
    #[inline]
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        self.size * 0.5
    }

    /// Same box, size multiplied by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self { size: self.size * factor, ..self }
    }

    /// Same box, `margin` added to every axis of the size.
    #[must_use]
    pub fn expanded(self, margin: f32) -> Self {
        Self { size: self.size + Vec3::splat(margin), ..self }
    }
}

/// Time-stamped set of part boxes for one entity.
///
/// Parts are kept in name order so that every walk over a pose visits them
/// the same way.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    /// Capture (or reconstruction) time, seconds on the authority clock.
    pub timestamp: f64,
    /// Part boxes by name.
    pub parts: BTreeMap<PartName, PartTransform>,
}

impl PoseSnapshot {
    /// Empty pose at `timestamp`.
    #[must_use]
    pub fn new(timestamp: f64) -> Self {
        Self { timestamp, parts: BTreeMap::new() }
    }

    /// Builder-style part insertion.
    #[must_use]
    pub fn with_part(mut self, name: impl Into<PartName>, part: PartTransform) -> Self {
        self.parts.insert(name.into(), part);
        self
    }

    /// Inserts or replaces a part.
    pub fn insert(&mut self, name: impl Into<PartName>, part: PartTransform) {
        self.parts.insert(name.into(), part);
    }

    /// Looks up a part by name.
    #[must_use]
    pub fn part(&self, name: &str) -> Option<&PartTransform> {
        self.parts.get(name)
    }

    /// Number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True if the pose has no parts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Parts in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PartTransform)> {
        self.parts.iter().map(|(name, part)| (name.as_str(), part))
    }

    /// Copy of this pose with every part size multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            timestamp: self.timestamp,
            parts: self
                .parts
                .iter()
                .map(|(name, part)| (name.clone(), part.scaled(factor)))
                .collect(),
        }
    }
}
