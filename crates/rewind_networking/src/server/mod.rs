//! # Lag Compensator
//!
//! The authoritative judge of attack requests.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LAG COMPENSATOR                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  request ─► RoleCheck ─► RateCheck ─► Params ─► Dedup       │
//! │                                                    │        │
//! │        ┌───────────────────────────────────────────┘        │
//! │        ▼                                                    │
//! │  RewindEstimate ─► DistanceSanity ─► TargetSearch           │
//! │                                          │                  │
//! │                     PostChecks ◄─────────┘                  │
//! │                         │                                   │
//! │                      HitResult ─► telemetry (best-effort)   │
//! └─────────────────────────────────────────────────────────────┘
//!          ▲ read lock                       ▲ write lock
//!     PoseRegistry ◄──────────────────── CaptureTick (fixed rate)
//! ```
//!
//! Any stage may stop the request with one [`RejectReason`]. Nothing is
//! retried and nothing is an `Err`: untrusted input produces values.

mod callers;
mod search;

pub mod retrace;
pub mod telemetry;
pub mod tick;
pub mod weapons;

pub use callers::{CallerProfile, CallerTable};
pub use retrace::{AnalyticRefiner, GhostHit, GhostId, GhostRetrace, GhostScene, HitRefiner, RayQuery, Refinement};
pub use telemetry::{TelemetrySink, DEFAULT_TELEMETRY_CAPACITY};
pub use tick::{CaptureTick, TickStats};
pub use weapons::{WeaponError, WeaponProfile, WeaponRegistry};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rewind_core::{CaptureFeed, CaptureReport, EntityTraits, SharedRegistry, TimeSource};
use rewind_security::{RateLimit, ValidationContext};
use rewind_shared::constants::{
    DEFAULT_DEDUP_WINDOW_SECONDS, DEFAULT_ORIGIN_MARGIN, DEFAULT_RATE_BURST, DEFAULT_RATE_PER_SECOND,
    GLOBAL_MAX_REWIND_MS,
};
use rewind_shared::{
    AttackMode, CallerId, DebugPayload, EntityId, HitEvent, HitResult, RejectReason, TeamId, Vec3,
};
use serde::{Deserialize, Serialize};

use crate::clock::ClockState;
use crate::protocol::{
    AttackParams, AttackRequest, AttackShape, CapsuleAttack, ConeAttack, FanAttack, RayAttack, RequestMeta,
    SphereAttack,
};

/// Whether this process may judge attacks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Authoritative server.
    #[default]
    Authority,
    /// Non-authoritative copy; every request answers `not_server`.
    Replica,
}

/// Orchestrator tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct CompensatorSettings {
    /// Authority or replica.
    pub role: Role,
    /// Hard cap on rewind for every weapon.
    pub global_max_rewind_ms: f64,
    /// Per-caller request budget.
    pub rate_limit: RateLimit,
    /// How long shot ids are remembered.
    pub dedup_window: f64,
    /// Slack on the origin sanity check.
    pub origin_margin: f32,
    /// Whether same-team hits land.
    pub friendly_fire: bool,
    /// Base validator tuning; weapons add to it.
    pub validation: ValidationContext,
}

impl Default for CompensatorSettings {
    fn default() -> Self {
        Self {
            role: Role::Authority,
            global_max_rewind_ms: GLOBAL_MAX_REWIND_MS,
            rate_limit: RateLimit { rate: DEFAULT_RATE_PER_SECOND, burst: DEFAULT_RATE_BURST },
            dedup_window: DEFAULT_DEDUP_WINDOW_SECONDS,
            origin_margin: DEFAULT_ORIGIN_MARGIN,
            friendly_fire: false,
            validation: ValidationContext::default(),
        }
    }
}

/// Request counters for one mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeStats {
    /// Requests received.
    pub requests: u64,
    /// Requests that landed.
    pub hits: u64,
}

#[derive(Debug, Default)]
struct ModeCounters {
    requests: AtomicU64,
    hits: AtomicU64,
}

const MODE_COUNT: usize = 5;

/// Rewind bookkeeping carried by every result.
struct Rewind {
    to: f64,
    used_ms: f64,
}

impl Rewind {
    const fn none(now: f64) -> Self {
        Self { to: now, used_ms: 0.0 }
    }

    fn reject(&self, reason: RejectReason) -> HitResult {
        HitResult::rejected(reason, self.to, self.used_ms)
    }
}

/// Judges attack requests against rewound poses.
pub struct LagCompensator {
    settings: CompensatorSettings,
    registry: SharedRegistry,
    clock: Arc<dyn TimeSource>,
    weapons: WeaponRegistry,
    callers: CallerTable,
    refiner: Box<dyn HitRefiner>,
    telemetry: TelemetrySink,
    counters: [ModeCounters; MODE_COUNT],
}

impl LagCompensator {
    /// Orchestrator over `registry`, reading authority time from `clock`.
    #[must_use]
    pub fn new(settings: CompensatorSettings, registry: SharedRegistry, clock: Arc<dyn TimeSource>) -> Self {
        let callers = CallerTable::new(settings.rate_limit, settings.dedup_window);
        Self {
            settings,
            registry,
            clock,
            weapons: WeaponRegistry::new(),
            callers,
            refiner: Box::new(AnalyticRefiner),
            telemetry: TelemetrySink::disabled(),
            counters: Default::default(),
        }
    }

    /// Replaces the ray-hit refiner.
    #[must_use]
    pub fn with_refiner(mut self, refiner: impl HitRefiner + 'static) -> Self {
        self.refiner = Box::new(refiner);
        self
    }

    /// Attaches a telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Active tuning.
    #[must_use]
    pub const fn settings(&self) -> &CompensatorSettings {
        &self.settings
    }

    /// Authority time now.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Shared pose registry.
    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Telemetry sink.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    /// Counters for one mode.
    #[must_use]
    pub fn stats(&self, mode: AttackMode) -> ModeStats {
        let counters = &self.counters[mode as usize];
        ModeStats {
            requests: counters.requests.load(Ordering::Relaxed),
            hits: counters.hits.load(Ordering::Relaxed),
        }
    }

    // =========================================================================
    // WEAPONS
    // =========================================================================

    /// Adds or replaces a weapon profile.
    ///
    /// # Errors
    ///
    /// Invalid tuning.
    pub fn define_weapon(&self, profile: WeaponProfile) -> Result<(), WeaponError> {
        let id = profile.id.clone();
        if self.weapons.define(profile)?.is_some() {
            tracing::debug!(weapon = %id, "weapon profile replaced");
        }
        Ok(())
    }

    /// Looks up a weapon profile.
    #[must_use]
    pub fn weapon(&self, id: &str) -> Option<Arc<WeaponProfile>> {
        self.weapons.get(id)
    }

    /// Edits an existing weapon profile. `Ok(false)` if unknown.
    ///
    /// # Errors
    ///
    /// The edit produced invalid tuning; the old profile stays.
    pub fn update_weapon(&self, id: &str, edit: impl FnOnce(&mut WeaponProfile)) -> Result<bool, WeaponError> {
        self.weapons.update(id, edit)
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Starts tracking an entity.
    pub fn register_entity(&self, id: EntityId, traits: EntityTraits) -> bool {
        self.registry.write().register(id, traits)
    }

    /// Stops tracking an entity.
    pub fn unregister_entity(&self, id: EntityId) -> bool {
        self.registry.write().unregister(id).is_some()
    }

    /// One capture pass stamped `timestamp`.
    pub fn capture<F>(&self, timestamp: f64, feed: &mut F) -> CaptureReport
    where
        F: CaptureFeed + ?Sized,
    {
        self.registry.write().capture(timestamp, feed)
    }

    // =========================================================================
    // CALLERS
    // =========================================================================

    /// Records where the caller's avatar is, authoritatively.
    pub fn update_caller_position(&self, caller: CallerId, position: Vec3) {
        self.callers.set_position(caller, position);
    }

    /// Records the caller's team.
    pub fn set_caller_team(&self, caller: CallerId, team: Option<TeamId>) {
        self.callers.set_team(caller, team);
    }

    /// Records the caller connection's clock estimate.
    pub fn record_caller_clock(&self, caller: CallerId, clock: ClockState) {
        self.callers.set_clock(caller, clock);
    }

    /// Forgets the caller's bucket, shot ledger and profile.
    pub fn disconnect_caller(&self, caller: CallerId) -> bool {
        let existed = self.callers.remove(caller);
        if existed {
            tracing::debug!(caller = %caller, "caller state dropped");
        }
        existed
    }

    /// Forgets expired shot ids for every caller.
    pub fn prune(&self) {
        self.callers.prune(self.clock.as_ref());
    }

    // =========================================================================
    // ENTRY POINTS
    // =========================================================================

    /// Hitscan ray.
    pub fn validate_ray(&self, caller: CallerId, meta: RequestMeta, ray: RayAttack) -> HitResult {
        self.submit(caller, AttackRequest::new(meta, AttackShape::Ray(ray)))
    }

    /// Area burst.
    pub fn validate_sphere(&self, caller: CallerId, meta: RequestMeta, sphere: SphereAttack) -> HitResult {
        self.submit(caller, AttackRequest::new(meta, AttackShape::Sphere(sphere)))
    }

    /// Projectile sweep.
    pub fn validate_capsule(&self, caller: CallerId, meta: RequestMeta, capsule: CapsuleAttack) -> HitResult {
        self.submit(caller, AttackRequest::new(meta, AttackShape::Capsule(capsule)))
    }

    /// Melee cone.
    pub fn validate_cone(&self, caller: CallerId, meta: RequestMeta, cone: ConeAttack) -> HitResult {
        self.submit(caller, AttackRequest::new(meta, AttackShape::Cone(cone)))
    }

    /// Melee fan.
    pub fn validate_fan(&self, caller: CallerId, meta: RequestMeta, fan: FanAttack) -> HitResult {
        self.submit(caller, AttackRequest::new(meta, AttackShape::Fan(fan)))
    }

    /// Generic entry point: a mode plus a superset parameter bag.
    pub fn validate(&self, caller: CallerId, mode: AttackMode, params: AttackParams) -> HitResult {
        if self.settings.role == Role::Replica {
            return self.finish_early(caller, mode, params.weapon_id.unwrap_or_default(), RejectReason::NotServer);
        }
        let weapon_id = params.weapon_id.clone().unwrap_or_default();
        match params.into_request(mode) {
            Ok(request) => self.submit(caller, request),
            Err(err) => {
                // A malformed bag still spends a token.
                let reason = match self.callers.throttle(caller, self.clock.now()) {
                    Ok(()) => {
                        tracing::debug!(caller = %caller, mode = mode.as_str(), error = %err, "malformed attack");
                        RejectReason::InvalidParams
                    }
                    Err(reason) => reason,
                };
                self.finish_early(caller, mode, weapon_id, reason)
            }
        }
    }

    /// Runs a typed request through the whole pipeline.
    pub fn submit(&self, caller: CallerId, request: AttackRequest) -> HitResult {
        let mode = request.mode();
        let mut debug = self.telemetry.verbose().then_some(None);
        let result = self.judge(caller, &request, &mut debug);
        self.finish(caller, mode, request.meta.weapon_id, result, debug.flatten())
    }

    fn finish_early(&self, caller: CallerId, mode: AttackMode, weapon_id: String, reason: RejectReason) -> HitResult {
        let result = Rewind::none(self.clock.now()).reject(reason);
        self.finish(caller, mode, weapon_id, result, None)
    }

    fn finish(
        &self,
        caller: CallerId,
        mode: AttackMode,
        weapon_id: String,
        result: HitResult,
        debug: Option<DebugPayload>,
    ) -> HitResult {
        let counters = &self.counters[mode as usize];
        counters.requests.fetch_add(1, Ordering::Relaxed);
        if result.hit {
            counters.hits.fetch_add(1, Ordering::Relaxed);
        }

        match result.reason {
            Some(reason) => tracing::debug!(
                caller = %caller,
                mode = mode.as_str(),
                weapon = %weapon_id,
                reason = reason.code(),
                rewind_ms = result.used_rewind_ms,
                "attack rejected"
            ),
            None => tracing::debug!(
                caller = %caller,
                mode = mode.as_str(),
                weapon = %weapon_id,
                target = ?result.target_id,
                part = ?result.part_name,
                headshot = ?result.is_headshot,
                rewind_ms = result.used_rewind_ms,
                "attack landed"
            ),
        }

        if self.telemetry.enabled() {
            self.telemetry.publish(HitEvent { caller, mode, weapon_id, result: result.clone(), debug });
        }
        result
    }

    /// The pipeline proper. `debug` is `Some` only when verbose telemetry wants a payload.
    fn judge(&self, caller: CallerId, request: &AttackRequest, debug: &mut Option<Option<DebugPayload>>) -> HitResult {
        let now = self.clock.now();
        let early = Rewind::none(now);

        // RoleCheck
        if self.settings.role == Role::Replica {
            return early.reject(RejectReason::NotServer);
        }

        // RateCheck
        if let Err(reason) = self.callers.throttle(caller, now) {
            return early.reject(reason);
        }

        // Params
        if let Err(err) = request.check() {
            tracing::debug!(caller = %caller, error = %err, "malformed attack");
            return early.reject(RejectReason::InvalidParams);
        }
        let Some(weapon) = self.weapons.get(&request.meta.weapon_id) else {
            tracing::debug!(caller = %caller, weapon = %request.meta.weapon_id, "unknown weapon");
            return early.reject(RejectReason::InvalidParams);
        };

        // DuplicateCheck
        if !weapon.is_melee {
            let Some(shot) = request.meta.shot_id else {
                tracing::debug!(caller = %caller, weapon = %weapon.id, "ranged attack without shot id");
                return early.reject(RejectReason::InvalidParams);
            };
            if let Err(reason) = self.callers.record_shot(caller, shot, now) {
                return early.reject(reason);
            }
        }

        // RewindEstimate
        let profile = self.callers.profile(caller);
        let rewind = self.estimate_rewind(now, request.meta.client_time, &profile.clock, &weapon);

        let ctx = search::weapon_context(&self.settings.validation, &weapon);
        let query = search::resolve(&request.shape, &weapon, &ctx);

        let registry = self.registry.read();

        // DistanceSanity
        let Some(position) = profile.position.or_else(|| search::owned_position(&registry, caller)) else {
            return rewind.reject(RejectReason::OutOfRange);
        };
        let origin = search::query_origin(&query);
        if origin.distance(position) > weapon.reach() + self.settings.origin_margin {
            return rewind.reject(RejectReason::OutOfRange);
        }

        // TargetSearch
        let (best, sampled) =
            search::search(&registry, caller, &query, &ctx, rewind.to, weapon.scale_multiplier);
        if let Some(slot) = debug.as_mut() {
            *slot = Some(DebugPayload {
                geometry: query.clone(),
                rewound_pose: best.as_ref().map(|c| (c.entity, c.pose.clone())),
                candidates_sampled: sampled,
            });
        }
        let Some(best) = best else {
            return rewind.reject(RejectReason::NoHit);
        };

        // PostChecks
        let Some(target) = registry.get(best.entity) else {
            return rewind.reject(RejectReason::NoHit);
        };
        let traits = *target.traits();
        if !traits.damageable {
            return rewind.reject(RejectReason::NoHumanoid);
        }
        let caller_team = profile.team.or_else(|| registry.owned_by(caller).and_then(|e| e.traits().team));
        if !self.settings.friendly_fire && caller_team.is_some() && caller_team == traits.team {
            return rewind.reject(RejectReason::FriendlyFire);
        }
        drop(registry);

        // Result
        let mut hit = best.hit;
        if let Some(ray) = search::ray_query(&query, &hit) {
            if let Some(refined) = self.refiner.refine(&ray, &best.pose, &hit, &ctx) {
                hit.position = refined.position;
                hit.normal = refined.normal;
            }
        }

        HitResult::landed(best.entity, hit.part_name, hit.position, hit.normal, hit.is_headshot, rewind.to, rewind.used_ms)
    }

    fn estimate_rewind(&self, now: f64, client_time: Option<f64>, clock: &ClockState, weapon: &WeaponProfile) -> Rewind {
        let latency = client_time.map_or_else(|| if clock.locked { clock.rtt * 0.5 } else { 0.0 }, |t| now - t);
        let cap_seconds = self.settings.global_max_rewind_ms.min(weapon.max_rewind_ms) / 1000.0;
        let rewind_seconds = latency.clamp(0.0, cap_seconds.max(0.0));
        Rewind { to: now - rewind_seconds, used_ms: rewind_seconds * 1000.0 }
    }
}

impl std::fmt::Debug for LagCompensator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LagCompensator")
            .field("settings", &self.settings)
            .field("weapons", &self.weapons.len())
            .field("callers", &self.callers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_core::{HistoryConfig, ManualClock, PoseRegistry};
    use rewind_shared::{PartTransform, PoseSnapshot};

    struct Fixture {
        clock: Arc<ManualClock>,
        server: LagCompensator,
    }

    fn fixture(settings: CompensatorSettings) -> Fixture {
        let clock = Arc::new(ManualClock::new(10.0));
        let registry = PoseRegistry::new(HistoryConfig::default()).expect("valid").into_shared();
        let server = LagCompensator::new(settings, registry, clock.clone());
        server.define_weapon(WeaponProfile::ranged("rifle", 500.0)).expect("valid");
        server.register_entity(EntityId(1), EntityTraits::damageable().with_team(TeamId(2)));
        // Target at z = 10 for all of t in [9, 10].
        for t in [9.0, 10.0] {
            server.registry().write().record(
                EntityId(1),
                PoseSnapshot::new(t).with_part("Torso", PartTransform::at(Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0))),
            );
        }
        server.update_caller_position(CallerId(7), Vec3::ZERO);
        Fixture { clock, server }
    }

    fn shot() -> RayAttack {
        RayAttack { origin: Vec3::ZERO, direction: Vec3::Z * 100.0 }
    }

    #[test]
    fn test_ray_lands() {
        let f = fixture(CompensatorSettings::default());
        let result = f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").at(9.9).shot(101), shot());
        assert!(result.hit);
        assert_eq!(result.target_id, Some(EntityId(1)));
        assert!((result.used_rewind_ms - 100.0).abs() < 1e-6);
        assert!((result.rewind_to - 9.9).abs() < 1e-9);
        assert_eq!(f.server.stats(AttackMode::Ray), ModeStats { requests: 1, hits: 1 });
    }

    #[test]
    fn test_rewind_clamped_to_weapon_cap() {
        let f = fixture(CompensatorSettings::default());
        f.server.update_weapon("rifle", |w| w.max_rewind_ms = 150.0).expect("valid");
        let result = f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").at(5.0).shot(102), shot());
        assert!((result.used_rewind_ms - 150.0).abs() < 1e-6);
        assert!((result.rewind_to - 9.85).abs() < 1e-9);
    }

    #[test]
    fn test_future_timestamp_is_no_rewind() {
        let f = fixture(CompensatorSettings::default());
        let result = f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").at(12.0).shot(103), shot());
        assert_eq!(result.used_rewind_ms, 0.0);
        assert_eq!(result.rewind_to, 10.0);
    }

    #[test]
    fn test_missing_timestamp_uses_half_rtt() {
        let f = fixture(CompensatorSettings::default());
        f.server.record_caller_clock(CallerId(7), ClockState { offset: 0.0, rtt: 0.08, locked: true });
        let result = f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").shot(104), shot());
        assert!((result.used_rewind_ms - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_replica_refuses() {
        let f = fixture(CompensatorSettings { role: Role::Replica, ..CompensatorSettings::default() });
        let result = f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").shot(105), shot());
        assert_eq!(result.reason, Some(RejectReason::NotServer));
        let generic = f.server.validate(CallerId(7), AttackMode::Ray, AttackParams::default());
        assert_eq!(generic.reason, Some(RejectReason::NotServer));
    }

    #[test]
    fn test_unknown_weapon_is_invalid() {
        let f = fixture(CompensatorSettings::default());
        let result = f.server.validate_ray(CallerId(7), RequestMeta::new("bow"), shot());
        assert_eq!(result.reason, Some(RejectReason::InvalidParams));
        assert_eq!(result.used_rewind_ms, 0.0);
    }

    #[test]
    fn test_ranged_attack_needs_shot_id() {
        let f = fixture(CompensatorSettings::default());
        let result = f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").at(9.9), shot());
        assert_eq!(result.reason, Some(RejectReason::InvalidParams));
        assert_eq!(result.used_rewind_ms, 0.0);
    }

    #[test]
    fn test_malformed_requests_spend_tokens() {
        let f = fixture(CompensatorSettings {
            rate_limit: RateLimit::new(1.0, 2.0).expect("valid"),
            ..CompensatorSettings::default()
        });
        let me = CallerId(7);
        assert_eq!(f.server.validate_ray(me, RequestMeta::new("bow"), shot()).reason, Some(RejectReason::InvalidParams));
        assert_eq!(f.server.validate(me, AttackMode::Ray, AttackParams::default()).reason, Some(RejectReason::InvalidParams));
        // Both tokens are gone; a well-formed shot is now limited.
        let limited = f.server.validate_ray(me, RequestMeta::new("rifle").shot(1), shot());
        assert_eq!(limited.reason, Some(RejectReason::RateLimited));
        assert_eq!(f.server.validate(me, AttackMode::Ray, AttackParams::default()).reason, Some(RejectReason::RateLimited));
    }

    #[test]
    fn test_unknown_position_is_out_of_range() {
        let f = fixture(CompensatorSettings::default());
        let result = f.server.validate_ray(CallerId(8), RequestMeta::new("rifle").shot(106), shot());
        assert_eq!(result.reason, Some(RejectReason::OutOfRange));
    }

    #[test]
    fn test_friendly_fire_toggle() {
        let f = fixture(CompensatorSettings::default());
        f.server.set_caller_team(CallerId(7), Some(TeamId(2)));
        let blocked = f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").shot(107), shot());
        assert_eq!(blocked.reason, Some(RejectReason::FriendlyFire));

        let f = fixture(CompensatorSettings { friendly_fire: true, ..CompensatorSettings::default() });
        f.server.set_caller_team(CallerId(7), Some(TeamId(2)));
        assert!(f.server.validate_ray(CallerId(7), RequestMeta::new("rifle").shot(108), shot()).hit);
    }

    #[test]
    fn test_disconnect_resets_dedup() {
        let f = fixture(CompensatorSettings::default());
        let meta = RequestMeta::new("rifle").shot(3);
        assert!(f.server.validate_ray(CallerId(7), meta.clone(), shot()).hit);
        assert_eq!(
            f.server.validate_ray(CallerId(7), meta.clone(), shot()).reason,
            Some(RejectReason::DuplicateShot)
        );
        assert!(f.server.disconnect_caller(CallerId(7)));
        f.server.update_caller_position(CallerId(7), Vec3::ZERO);
        f.clock.advance(0.001);
        assert!(f.server.validate_ray(CallerId(7), meta, shot()).hit);
    }

    #[test]
    fn test_verbose_telemetry_carries_pose() {
        let f = fixture(CompensatorSettings::default());
        let (sink, rx) = TelemetrySink::bounded(8, true);
        let server = f.server.with_telemetry(sink);
        server.validate_ray(CallerId(7), RequestMeta::new("rifle").at(9.95).shot(109), shot());

        let event = rx.try_recv().expect("published");
        let debug = event.debug.expect("verbose payload");
        assert_eq!(debug.candidates_sampled, 1);
        let (id, pose) = debug.rewound_pose.expect("winner");
        assert_eq!(id, EntityId(1));
        assert!((pose.timestamp - 9.95).abs() < 1e-9);
    }
}
