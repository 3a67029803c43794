//! Per-caller state.
//!
//! Two tables with different access patterns:
//!
//! - defenses (token bucket + shot ledger) change on every request and sit
//!   behind one mutex
//! - profiles (position, team, clock estimate) are written by the host and
//!   read by every request, so they sit behind a read-write lock

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use rewind_core::TimeSource;
use rewind_security::{RateLimit, ShotId, ShotLedger, TokenBucket};
use rewind_shared::{CallerId, RejectReason, TeamId, Vec3};

use crate::clock::ClockState;

struct Defenses {
    bucket: TokenBucket,
    ledger: ShotLedger,
}

/// What the host last told us about a caller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CallerProfile {
    /// Last authoritative position.
    pub position: Option<Vec3>,
    /// Team membership.
    pub team: Option<TeamId>,
    /// Latest clock estimate reported for the caller's connection.
    pub clock: ClockState,
}

/// All callers known to one orchestrator.
pub struct CallerTable {
    limit: RateLimit,
    dedup_window: f64,
    defenses: Mutex<HashMap<CallerId, Defenses>>,
    profiles: RwLock<HashMap<CallerId, CallerProfile>>,
}

impl CallerTable {
    /// Empty table.
    #[must_use]
    pub fn new(limit: RateLimit, dedup_window: f64) -> Self {
        Self {
            limit,
            dedup_window,
            defenses: Mutex::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
        }
    }

    /// Spends one token from the caller's bucket.
    ///
    /// State is created on first use.
    ///
    /// # Errors
    ///
    /// [`RejectReason::RateLimited`] when the bucket is empty.
    pub fn throttle(&self, caller: CallerId, now: f64) -> Result<(), RejectReason> {
        let mut defenses = self.defenses.lock();
        let entry = defenses.entry(caller).or_insert_with(|| self.fresh(now));
        if entry.bucket.try_acquire(now) {
            Ok(())
        } else {
            Err(RejectReason::RateLimited)
        }
    }

    /// Records `shot` in the caller's ledger.
    ///
    /// # Errors
    ///
    /// [`RejectReason::DuplicateShot`] when the id was seen inside the window.
    pub fn record_shot(&self, caller: CallerId, shot: ShotId, now: f64) -> Result<(), RejectReason> {
        let mut defenses = self.defenses.lock();
        let entry = defenses.entry(caller).or_insert_with(|| self.fresh(now));
        if entry.ledger.check_and_record(shot, now) {
            Ok(())
        } else {
            Err(RejectReason::DuplicateShot)
        }
    }

    fn fresh(&self, now: f64) -> Defenses {
        Defenses { bucket: TokenBucket::new(self.limit, now), ledger: ShotLedger::new(self.dedup_window) }
    }

    /// Snapshot of a caller's profile; default if unknown.
    #[must_use]
    pub fn profile(&self, caller: CallerId) -> CallerProfile {
        self.profiles.read().get(&caller).copied().unwrap_or_default()
    }

    /// Records a caller's authoritative position.
    pub fn set_position(&self, caller: CallerId, position: Vec3) {
        self.profiles.write().entry(caller).or_default().position = Some(position);
    }

    /// Records a caller's team.
    pub fn set_team(&self, caller: CallerId, team: Option<TeamId>) {
        self.profiles.write().entry(caller).or_default().team = team;
    }

    /// Records a caller's clock estimate.
    pub fn set_clock(&self, caller: CallerId, clock: ClockState) {
        self.profiles.write().entry(caller).or_default().clock = clock;
    }

    /// Drops everything known about `caller`. Returns whether anything existed.
    pub fn remove(&self, caller: CallerId) -> bool {
        let had_defenses = self.defenses.lock().remove(&caller).is_some();
        let had_profile = self.profiles.write().remove(&caller).is_some();
        had_defenses || had_profile
    }

    /// Drops shot ids older than the window for every caller.
    pub fn prune(&self, clock: &dyn TimeSource) {
        let now = clock.now();
        for defenses in self.defenses.lock().values_mut() {
            defenses.ledger.prune(now);
        }
    }

    /// Callers with request state.
    #[must_use]
    pub fn active(&self) -> usize {
        self.defenses.lock().len()
    }
}

impl std::fmt::Debug for CallerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerTable")
            .field("limit", &self.limit)
            .field("dedup_window", &self.dedup_window)
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}
