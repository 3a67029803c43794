//! Weapon profiles.
//!
//! A profile is an immutable value. Updating a weapon swaps in a new value;
//! requests already holding the old `Arc` finish with it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rewind_shared::constants::{DEFAULT_MAX_RAY_DISTANCE, GLOBAL_MAX_REWIND_MS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid weapon tuning.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum WeaponError {
    /// Profiles need a non-empty id.
    #[error("weapon id must not be empty")]
    EmptyId,

    /// A numeric field is negative or not finite.
    #[error("weapon `{id}`: {field} must be finite and non-negative, got {value}")]
    BadValue {
        /// Weapon id.
        id: String,
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Part sizes must stay positive.
    #[error("weapon `{id}`: scale_multiplier must be positive, got {value}")]
    BadScale {
        /// Weapon id.
        id: String,
        /// Offending value.
        value: f32,
    },
}

/// Tuning for one weapon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponProfile {
    /// Lookup key.
    pub id: String,
    /// Ray travel limit and origin sanity range for ranged weapons.
    pub max_distance: f32,
    /// Per-weapon rewind cap, further capped by the global one.
    pub max_rewind_ms: f64,
    /// Melee reach and origin sanity range for melee weapons.
    pub melee_range: f32,
    /// Widest melee arc in degrees.
    pub melee_angle: f32,
    /// Default and largest ray count of a melee fan.
    pub melee_rays: u32,
    /// Default and largest sweep radius.
    pub capsule_radius: f32,
    /// Default and largest sweep step count.
    pub capsule_steps: u32,
    /// Extra margin on every part.
    pub extra_forgiveness: f32,
    /// Melee weapons skip duplicate suppression.
    pub is_melee: bool,
    /// Multiplier on target part sizes.
    pub scale_multiplier: f32,
}

impl Default for WeaponProfile {
    fn default() -> Self {
        Self {
            id: String::new(),
            max_distance: DEFAULT_MAX_RAY_DISTANCE,
            max_rewind_ms: GLOBAL_MAX_REWIND_MS,
            melee_range: 3.0,
            melee_angle: 90.0,
            melee_rays: 5,
            capsule_radius: 0.25,
            capsule_steps: 16,
            extra_forgiveness: 0.0,
            is_melee: false,
            scale_multiplier: 1.0,
        }
    }
}

impl WeaponProfile {
    /// Ranged weapon with default tuning.
    #[must_use]
    pub fn ranged(id: impl Into<String>, max_distance: f32) -> Self {
        Self { id: id.into(), max_distance, ..Self::default() }
    }

    /// Melee weapon with default tuning.
    #[must_use]
    pub fn melee(id: impl Into<String>, melee_range: f32, melee_angle: f32) -> Self {
        Self { id: id.into(), melee_range, melee_angle, is_melee: true, ..Self::default() }
    }

    /// Range used by the origin sanity check.
    #[must_use]
    pub const fn reach(&self) -> f32 {
        if self.is_melee {
            self.melee_range
        } else {
            self.max_distance
        }
    }

    /// Checks the tuning.
    ///
    /// # Errors
    ///
    /// Empty id, negative or non-finite numbers, or a non-positive scale.
    pub fn validate(&self) -> Result<(), WeaponError> {
        if self.id.is_empty() {
            return Err(WeaponError::EmptyId);
        }
        let fields = [
            ("max_distance", f64::from(self.max_distance)),
            ("max_rewind_ms", self.max_rewind_ms),
            ("melee_range", f64::from(self.melee_range)),
            ("melee_angle", f64::from(self.melee_angle)),
            ("capsule_radius", f64::from(self.capsule_radius)),
            ("extra_forgiveness", f64::from(self.extra_forgiveness)),
        ];
        for (field, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                return Err(WeaponError::BadValue { id: self.id.clone(), field, value });
            }
        }
        if !(self.scale_multiplier.is_finite() && self.scale_multiplier > 0.0) {
            return Err(WeaponError::BadScale { id: self.id.clone(), value: self.scale_multiplier });
        }
        Ok(())
    }
}

/// Profiles by id. Last write wins.
#[derive(Debug, Default)]
pub struct WeaponRegistry {
    profiles: RwLock<HashMap<String, Arc<WeaponProfile>>>,
}

impl WeaponRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a profile. Returns the replaced one.
    ///
    /// # Errors
    ///
    /// Invalid tuning; the registry is unchanged.
    pub fn define(&self, profile: WeaponProfile) -> Result<Option<Arc<WeaponProfile>>, WeaponError> {
        profile.validate()?;
        let previous = self.profiles.write().insert(profile.id.clone(), Arc::new(profile));
        Ok(previous)
    }

    /// Looks up a profile.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<WeaponProfile>> {
        self.profiles.read().get(id).cloned()
    }

    /// Rewrites an existing profile in place of the old value.
    ///
    /// Returns `Ok(false)` if `id` is unknown.
    ///
    /// # Errors
    ///
    /// The edited profile is invalid; the old one stays.
    pub fn update(&self, id: &str, edit: impl FnOnce(&mut WeaponProfile)) -> Result<bool, WeaponError> {
        let mut profiles = self.profiles.write();
        let Some(current) = profiles.get(id) else {
            return Ok(false);
        };
        let mut next = WeaponProfile::clone(current);
        edit(&mut next);
        next.id = id.to_string();
        next.validate()?;
        profiles.insert(next.id.clone(), Arc::new(next));
        Ok(true)
    }

    /// Number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// True if no profiles are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}
