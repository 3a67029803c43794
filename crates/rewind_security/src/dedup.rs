//! Duplicate shot suppression.
//!
//! Remembers which shot ids a caller used recently. An id seen again inside
//! the window is a replay of the same shot.

use std::collections::HashMap;

/// Caller-chosen identifier of one shot.
pub type ShotId = u64;

/// Recently seen shot ids of one caller.
#[derive(Clone, Debug)]
pub struct ShotLedger {
    window: f64,
    seen: HashMap<ShotId, f64>,
}

impl ShotLedger {
    /// Ledger forgetting ids after `window` seconds.
    #[must_use]
    pub fn new(window: f64) -> Self {
        Self { window: window.max(0.0), seen: HashMap::new() }
    }

    /// Records `shot` at `now`.
    ///
    /// Returns `false` if the id was already seen inside the window.
    pub fn check_and_record(&mut self, shot: ShotId, now: f64) -> bool {
        self.prune(now);
        if self.seen.contains_key(&shot) {
            return false;
        }
        self.seen.insert(shot, now);
        true
    }

    /// Drops entries older than the window.
    pub fn prune(&mut self, now: f64) {
        let window = self.window;
        self.seen.retain(|_, seen_at| now - *seen_at <= window);
    }

    /// Ids currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
