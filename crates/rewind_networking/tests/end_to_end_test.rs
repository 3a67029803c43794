//! # End-to-End Tests
//!
//! Whole requests through the lag compensator: capture, clock, rewind,
//! search, post-checks and telemetry together.
//!
//! Run with: cargo test -p rewind_networking --test end_to_end_test

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rewind_core::{
    CaptureOutcome, EntityTraits, HistoryConfig, ManualClock, OffsetClock, PoseRegistry, TimeSource,
};
use rewind_networking::clock::ClockSyncConfig;
use rewind_networking::server::{GhostHit, GhostId, GhostScene};
use rewind_networking::{
    AttackParams, CapsuleAttack, ClockSync, CompensatorSettings, ConeAttack, FanAttack, GhostRetrace, LagCompensator,
    NetworkConditions, RayAttack, RequestMeta, RewindConfig, Role, SimulatedLink, SimulatedScene, SmoothingPolicy,
    SphereAttack, TokioClock, WeaponProfile,
};
use rewind_security::{RateLimit, ValidationContext};
use rewind_shared::{
    AttackMode, CallerId, EntityId, PartName, PartTransform, PoseSnapshot, RejectReason, RigidTransform, TeamId,
    Vec3,
};

const SHOOTER: CallerId = CallerId(7);
const NOW: f64 = 50.0;

struct World {
    clock: Arc<ManualClock>,
    server: LagCompensator,
}

fn world(settings: CompensatorSettings) -> World {
    let clock = Arc::new(ManualClock::new(NOW));
    let registry = PoseRegistry::new(HistoryConfig::default()).expect("valid").into_shared();
    let server = LagCompensator::new(settings, registry, clock.clone());
    server.define_weapon(WeaponProfile::ranged("rifle", 1000.0)).expect("valid");
    server.define_weapon(WeaponProfile::ranged("grenade", 50.0)).expect("valid");
    server.define_weapon(WeaponProfile::melee("sword", 3.0, 90.0)).expect("valid");
    server.update_caller_position(SHOOTER, Vec3::ZERO);
    World { clock, server }
}

/// Registers static boxes and captures them twice, ending at `NOW`.
fn place(world: &World, boxes: &[(EntityId, EntityTraits, Vec3, Vec3)]) {
    let mut parts: BTreeMap<EntityId, BTreeMap<PartName, PartTransform>> = BTreeMap::new();
    for (id, traits, center, size) in boxes {
        world.server.register_entity(*id, *traits);
        parts.entry(*id).or_default().insert("Body".to_string(), PartTransform::at(*center, *size));
    }
    let mut feed = |id: EntityId| parts.get(&id).map_or(CaptureOutcome::Skip, |p| CaptureOutcome::Pose(p.clone()));
    for t in [NOW - 0.5, NOW] {
        world.server.capture(t, &mut feed);
    }
}

fn ray(direction: Vec3) -> RayAttack {
    RayAttack { origin: Vec3::ZERO, direction }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn verify_scenario_a_ray_hits_entry_face() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::new(4.0, 6.0, 2.0))]);

    let result = w.server.validate_ray(SHOOTER, RequestMeta::new("rifle").shot(1), ray(Vec3::new(0.0, 0.0, 100.0)));
    assert!(result.hit);
    assert_eq!(result.part_name.as_deref(), Some("Body"));
    assert_eq!(result.target_id, Some(EntityId(1)));
    let position = result.hit_position.expect("landed");
    assert!((position.z - 9.0).abs() < 1e-4);
    assert!((result.hit_normal.expect("landed") - Vec3::NEG_Z).length() < 1e-4);
}

#[test]
fn verify_scenario_b_distance_clamp() {
    let settings = CompensatorSettings {
        validation: ValidationContext { max_ray_distance: 100.0, ..ValidationContext::default() },
        ..CompensatorSettings::default()
    };
    let w = world(settings);
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 500.0), Vec3::new(4.0, 6.0, 2.0))]);

    let result = w.server.validate_ray(SHOOTER, RequestMeta::new("rifle").shot(1), ray(Vec3::new(0.0, 0.0, 1000.0)));
    assert_eq!(result.reason, Some(RejectReason::NoHit));
}

#[test]
fn verify_scenario_c_sphere_overlap() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 5.0), Vec3::new(4.0, 6.0, 2.0))]);

    let result =
        w.server.validate_sphere(SHOOTER, RequestMeta::new("grenade").shot(1), SphereAttack { center: Vec3::ZERO, radius: 5.0 });
    assert!(result.hit);
    let closest = result.hit_position.expect("landed");
    assert!((closest - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-4);
}

#[tokio::test(start_paused = true)]
async fn verify_scenario_d_clock_converges_under_fixed_delay() {
    let authority = TokioClock::starting_at(100.0);
    let local = Arc::new(OffsetClock::new(TokioClock::starting_at(100.0), -2.5));

    for policy in [SmoothingPolicy::default(), SmoothingPolicy::min_rtt(), SmoothingPolicy::EverySample { alpha: 0.3 }] {
        let config = ClockSyncConfig { policy, ..ClockSyncConfig::default() };
        let link = SimulatedLink::new(authority, NetworkConditions::fixed(40), 11);
        let mut sync = ClockSync::new(link, local.clone(), config).expect("valid");
        sync.run_burst().await;

        let state = sync.state();
        assert!(state.locked, "{policy:?} should lock after one clean burst");
        assert!((state.offset - 2.5).abs() < 1e-6, "{policy:?}: offset {}", state.offset);
        assert!((state.rtt - 0.08).abs() < 1e-6, "{policy:?}: rtt {}", state.rtt);
        assert!((sync.clock().now() - authority.now()).abs() < 1e-6);
    }
}

#[tokio::test(start_paused = true)]
async fn verify_spawned_sync_keeps_clock_locked() {
    let authority = TokioClock::starting_at(100.0);
    let local = Arc::new(OffsetClock::new(TokioClock::starting_at(100.0), 4.0));
    let config = ClockSyncConfig { interval: Duration::from_secs(1), ..ClockSyncConfig::default() };
    let sync = ClockSync::new(SimulatedLink::new(authority, NetworkConditions::fixed(25), 5), local, config)
        .expect("valid");

    let handle = sync.spawn();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let clock = handle.clock();
    assert!(clock.state().locked);
    assert!((clock.now() - authority.now()).abs() < 1e-6);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn verify_reconciled_clock_drives_rewind() {
    let authority = TokioClock::starting_at(100.0);
    let local = Arc::new(OffsetClock::new(TokioClock::starting_at(100.0), -2.5));
    let mut sync =
        ClockSync::new(SimulatedLink::new(authority, NetworkConditions::fixed(30), 3), local, ClockSyncConfig::default())
            .expect("valid");
    sync.run_burst().await;
    let client = sync.clock();

    let registry = PoseRegistry::new(HistoryConfig::default()).expect("valid").into_shared();
    let server = LagCompensator::new(CompensatorSettings::default(), registry, Arc::new(authority));
    server.define_weapon(WeaponProfile::ranged("rifle", 1000.0)).expect("valid");
    server.register_entity(EntityId(1), EntityTraits::damageable());
    server.update_caller_position(SHOOTER, Vec3::ZERO);

    // Target strafing along +X at 20 units/s, 10 units down +Z; x = 0 now.
    let now = authority.now();
    for step in 0..=30 {
        let t = now - 0.5 + f64::from(step) / 60.0;
        #[allow(clippy::cast_possible_truncation)]
        let x = ((t - now) * 20.0) as f32;
        server.registry().write().record(
            EntityId(1),
            PoseSnapshot::new(t).with_part("Torso", PartTransform::at(Vec3::new(x, 0.0, 10.0), Vec3::new(1.0, 2.0, 1.0))),
        );
    }

    // The shooter saw the target 100 ms ago, at x = -2.
    let aim = ray(Vec3::new(-2.0, 0.0, 10.0).normalize() * 50.0);
    let landed = server.validate_ray(SHOOTER, RequestMeta::new("rifle").at(client.now() - 0.1).shot(1), aim);
    assert!(landed.hit, "{landed:?}");
    assert!((landed.used_rewind_ms - 100.0).abs() < 1e-3);

    // The same shot stamped with the uncorrected clock rewinds to the cap.
    let skewed = server.validate_ray(SHOOTER, RequestMeta::new("rifle").at(client.local_now() - 0.1).shot(2), aim);
    assert_eq!(skewed.reason, Some(RejectReason::NoHit));
    assert!((skewed.used_rewind_ms - 400.0).abs() < 1e-3);
}

// =============================================================================
// DUPLICATES, LIMITS, PARAMETERS
// =============================================================================

#[test]
fn verify_duplicate_ray_suppressed() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0))]);

    let meta = RequestMeta::new("rifle").shot(41);
    assert!(w.server.validate_ray(SHOOTER, meta.clone(), ray(Vec3::Z * 100.0)).hit);
    let again = w.server.validate_ray(SHOOTER, meta.clone(), ray(Vec3::Z * 100.0));
    assert_eq!(again.reason, Some(RejectReason::DuplicateShot));

    // A miss still consumes the id.
    let miss_meta = RequestMeta::new("rifle").shot(42);
    assert_eq!(w.server.validate_ray(SHOOTER, miss_meta.clone(), ray(Vec3::X * 100.0)).reason, Some(RejectReason::NoHit));
    assert_eq!(
        w.server.validate_ray(SHOOTER, miss_meta, ray(Vec3::Z * 100.0)).reason,
        Some(RejectReason::DuplicateShot)
    );

    // Outside the window the id is fresh again.
    w.clock.advance(3.5);
    assert_ne!(w.server.validate_ray(SHOOTER, meta, ray(Vec3::Z * 100.0)).reason, Some(RejectReason::DuplicateShot));
}

#[test]
fn verify_ranged_replay_without_shot_id_refused() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0))]);

    for _ in 0..3 {
        let result = w.server.validate_ray(SHOOTER, RequestMeta::new("rifle"), ray(Vec3::Z * 100.0));
        assert_eq!(result.reason, Some(RejectReason::InvalidParams));
    }
    let bag = AttackParams {
        weapon_id: Some("rifle".to_string()),
        origin: Some(Vec3::ZERO),
        direction: Some(Vec3::Z * 100.0),
        ..AttackParams::default()
    };
    assert_eq!(w.server.validate(SHOOTER, AttackMode::Ray, bag.clone()).reason, Some(RejectReason::InvalidParams));
    assert_eq!(w.server.stats(AttackMode::Ray).hits, 0);

    let tagged = AttackParams { shot_id: Some(77), ..bag };
    assert!(w.server.validate(SHOOTER, AttackMode::Ray, tagged.clone()).hit);
    assert_eq!(w.server.validate(SHOOTER, AttackMode::Ray, tagged).reason, Some(RejectReason::DuplicateShot));
}

#[test]
fn verify_melee_never_deduplicated() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, -2.0), Vec3::new(1.0, 2.0, 1.0))]);

    let swing = FanAttack { origin: RigidTransform::from_translation(Vec3::ZERO), range: None, angle_deg: None, ray_count: None };
    let meta = RequestMeta::new("sword").shot(5);
    assert!(w.server.validate_fan(SHOOTER, meta.clone(), swing).hit);
    assert!(w.server.validate_fan(SHOOTER, meta.clone(), swing).hit);

    let stab = ConeAttack { origin: RigidTransform::from_translation(Vec3::ZERO), range: None, half_angle_deg: None };
    assert!(w.server.validate_cone(SHOOTER, meta.clone(), stab).hit);
    assert!(w.server.validate_cone(SHOOTER, meta, stab).hit);
    assert_eq!(w.server.stats(AttackMode::Fan).hits, 2);
}

#[test]
fn verify_rate_limit_costs_no_rewind() {
    let settings = CompensatorSettings {
        rate_limit: RateLimit::new(1.0, 2.0).expect("valid"),
        ..CompensatorSettings::default()
    };
    let w = world(settings);
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0))]);

    let meta = RequestMeta::new("rifle").at(NOW - 0.2);
    assert!(w.server.validate_ray(SHOOTER, meta.clone().shot(1), ray(Vec3::Z * 100.0)).hit);
    assert!(w.server.validate_ray(SHOOTER, meta.clone().shot(2), ray(Vec3::Z * 100.0)).hit);
    let limited = w.server.validate_ray(SHOOTER, meta.clone().shot(3), ray(Vec3::Z * 100.0));
    assert_eq!(limited.reason, Some(RejectReason::RateLimited));
    assert_eq!(limited.used_rewind_ms, 0.0);

    // Another caller has its own bucket.
    w.server.update_caller_position(CallerId(8), Vec3::ZERO);
    assert!(w.server.validate_ray(CallerId(8), meta.clone().shot(1), ray(Vec3::Z * 100.0)).hit);

    // The limited shot never reached the ledger.
    w.clock.advance(1.0);
    assert!(w.server.validate_ray(SHOOTER, meta.shot(3), ray(Vec3::Z * 100.0)).hit);
}

#[test]
fn verify_parameter_bag_dispatch() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, -2.0), Vec3::new(1.0, 2.0, 1.0))]);

    let cone = AttackParams {
        weapon_id: Some("sword".to_string()),
        origin: Some(Vec3::ZERO),
        direction: Some(Vec3::NEG_Z),
        ..AttackParams::default()
    };
    let result = w.server.validate(SHOOTER, AttackMode::Cone, cone.clone());
    assert!(result.hit);
    assert_eq!(result.target_id, Some(EntityId(1)));

    // Facing away: the cone finds nothing.
    let away = AttackParams { direction: Some(Vec3::Z), ..cone.clone() };
    assert_eq!(w.server.validate(SHOOTER, AttackMode::Cone, away).reason, Some(RejectReason::NoHit));

    let missing = AttackParams { direction: None, ..cone.clone() };
    assert_eq!(w.server.validate(SHOOTER, AttackMode::Ray, missing).reason, Some(RejectReason::InvalidParams));

    let no_weapon = AttackParams { weapon_id: None, ..cone.clone() };
    assert_eq!(w.server.validate(SHOOTER, AttackMode::Cone, no_weapon).reason, Some(RejectReason::InvalidParams));

    let bad_time = AttackParams { client_time: Some(f64::NAN), ..cone };
    assert_eq!(w.server.validate(SHOOTER, AttackMode::Cone, bad_time).reason, Some(RejectReason::InvalidParams));

    let unknown = RequestMeta::new("railgun").shot(1);
    assert_eq!(
        w.server.validate_ray(SHOOTER, unknown, ray(Vec3::Z * 100.0)).reason,
        Some(RejectReason::InvalidParams)
    );
}

#[test]
fn verify_origin_far_from_caller_is_out_of_range() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, -2.0), Vec3::new(1.0, 2.0, 1.0))]);

    // Sword reach 3 plus the default margin of 12.
    let far = FanAttack {
        origin: RigidTransform::from_translation(Vec3::new(0.0, 0.0, 20.0)),
        range: None,
        angle_deg: None,
        ray_count: None,
    };
    assert_eq!(w.server.validate_fan(SHOOTER, RequestMeta::new("sword"), far).reason, Some(RejectReason::OutOfRange));
}

// =============================================================================
// WEAPON CAPS
// =============================================================================

#[test]
fn verify_melee_arc_cannot_be_widened() {
    let w = world(CompensatorSettings::default());
    // Behind an attacker facing -Z.
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 2.0, 1.0))]);
    let facing = RigidTransform::from_translation(Vec3::ZERO);

    let stab = ConeAttack { origin: facing, range: None, half_angle_deg: Some(180.0) };
    assert_eq!(w.server.validate_cone(SHOOTER, RequestMeta::new("sword"), stab).reason, Some(RejectReason::NoHit));

    let sweep = FanAttack { origin: facing, range: None, angle_deg: Some(360.0), ray_count: Some(64) };
    assert_eq!(w.server.validate_fan(SHOOTER, RequestMeta::new("sword"), sweep).reason, Some(RejectReason::NoHit));

    // Turned around, the weapon's own arc reaches.
    let turned = RigidTransform::looking_along(Vec3::ZERO, Vec3::Z);
    let stab = ConeAttack { origin: turned, range: None, half_angle_deg: Some(180.0) };
    assert!(w.server.validate_cone(SHOOTER, RequestMeta::new("sword"), stab).hit);
}

#[test]
fn verify_sample_counts_capped_by_weapon() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, -2.0), Vec3::new(1.0, 2.0, 1.0))]);

    let swing = FanAttack {
        origin: RigidTransform::from_translation(Vec3::ZERO),
        range: None,
        angle_deg: None,
        ray_count: Some(u32::MAX),
    };
    assert!(w.server.validate_fan(SHOOTER, RequestMeta::new("sword"), swing).hit);

    let sweep = CapsuleAttack { start: Vec3::ZERO, end: Vec3::NEG_Z * 2.0, radius: None, steps: Some(u32::MAX) };
    assert!(w.server.validate_capsule(SHOOTER, RequestMeta::new("rifle").shot(1), sweep).hit);
}

#[test]
fn verify_capsule_radius_cannot_be_inflated() {
    let w = world(CompensatorSettings::default());
    // 40 units to the side of a straight sweep down -Z.
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(40.0, 0.0, -50.0), Vec3::splat(2.0))]);

    let fat = CapsuleAttack { start: Vec3::ZERO, end: Vec3::NEG_Z * 100.0, radius: Some(50.0), steps: None };
    assert_eq!(w.server.validate_capsule(SHOOTER, RequestMeta::new("rifle").shot(1), fat).reason, Some(RejectReason::NoHit));

    let aimed = CapsuleAttack { end: Vec3::new(80.0, 0.0, -100.0), radius: Some(50.0), ..fat };
    assert!(w.server.validate_capsule(SHOOTER, RequestMeta::new("rifle").shot(2), aimed).hit);
}

#[test]
fn verify_capsule_sweep_limited_to_weapon_distance() {
    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, -5000.0), Vec3::splat(2.0))]);
    let long = CapsuleAttack { start: Vec3::ZERO, end: Vec3::NEG_Z * 6000.0, radius: None, steps: Some(6000) };
    assert_eq!(w.server.validate_capsule(SHOOTER, RequestMeta::new("rifle").shot(1), long).reason, Some(RejectReason::NoHit));

    let w = world(CompensatorSettings::default());
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, -1000.0), Vec3::splat(2.0))]);
    let reach = CapsuleAttack { end: Vec3::NEG_Z * 1000.0, ..long };
    assert!(w.server.validate_capsule(SHOOTER, RequestMeta::new("rifle").shot(1), reach).hit);
}

// =============================================================================
// POST-CHECKS
// =============================================================================

#[test]
fn verify_team_and_ownership_checks() {
    let w = world(CompensatorSettings::default());
    let caller = CallerId(20);
    place(
        &w,
        &[
            // The caller's own avatar, in the line of fire.
            (EntityId(5), EntityTraits::damageable().with_team(TeamId(3)).with_owner(caller), Vec3::new(0.0, 0.0, 5.0), Vec3::splat(1.0)),
            // A teammate behind it.
            (EntityId(6), EntityTraits::damageable().with_team(TeamId(3)), Vec3::new(0.0, 0.0, 10.0), Vec3::splat(1.0)),
            // Scenery with no damageable body.
            (EntityId(9), EntityTraits::default(), Vec3::new(10.0, 0.0, 0.0), Vec3::splat(1.0)),
        ],
    );

    // No reported position or team: both come from the owned avatar.
    let shot = RayAttack { origin: Vec3::new(0.0, 0.0, 5.0), direction: Vec3::Z * 50.0 };
    let blocked = w.server.validate_ray(caller, RequestMeta::new("rifle").shot(1), shot);
    assert_eq!(blocked.reason, Some(RejectReason::FriendlyFire));

    w.server.set_caller_team(caller, Some(TeamId(4)));
    let landed = w.server.validate_ray(caller, RequestMeta::new("rifle").shot(2), shot);
    assert_eq!(landed.target_id, Some(EntityId(6)));

    let scenery = RayAttack { origin: Vec3::new(0.0, 0.0, 5.0), direction: Vec3::new(10.0, 0.0, -5.0) * 10.0 };
    assert_eq!(w.server.validate_ray(caller, RequestMeta::new("rifle").shot(3), scenery).reason, Some(RejectReason::NoHumanoid));
}

#[test]
fn verify_closest_target_wins() {
    let w = world(CompensatorSettings::default());
    place(
        &w,
        &[
            (EntityId(3), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 20.0), Vec3::splat(2.0)),
            (EntityId(4), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0)),
            // Exact tie with entity 4: the lower id wins.
            (EntityId(8), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0)),
        ],
    );
    let result = w.server.validate_ray(SHOOTER, RequestMeta::new("rifle").shot(1), ray(Vec3::Z * 100.0));
    assert_eq!(result.target_id, Some(EntityId(4)));
}

#[test]
fn verify_replica_refuses_everything() {
    let w = world(CompensatorSettings { role: Role::Replica, ..CompensatorSettings::default() });
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0))]);
    let result = w.server.validate_ray(SHOOTER, RequestMeta::new("rifle").shot(1), ray(Vec3::Z * 100.0));
    assert_eq!(result.reason, Some(RejectReason::NotServer));
}

// =============================================================================
// RETRACE
// =============================================================================

struct SharedScene(Arc<SimulatedScene>);

impl GhostScene for SharedScene {
    fn spawn_box(&self, transform: &RigidTransform, size: Vec3) -> GhostId {
        self.0.spawn_box(transform, size)
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, only: &[GhostId]) -> Option<GhostHit> {
        self.0.raycast(origin, direction, max_distance, only)
    }

    fn despawn(&self, ghost: GhostId) {
        self.0.despawn(ghost);
    }
}

#[test]
fn verify_ghost_retrace_agrees_and_cleans_up() {
    let scene = Arc::new(SimulatedScene::new());
    let mut w = world(CompensatorSettings::default());
    w.server = w.server.with_refiner(GhostRetrace::new(SharedScene(scene.clone())));
    place(&w, &[(EntityId(1), EntityTraits::damageable(), Vec3::new(0.0, 0.0, 10.0), Vec3::new(4.0, 6.0, 2.0))]);

    let result = w.server.validate_ray(SHOOTER, RequestMeta::new("rifle").shot(1), ray(Vec3::Z * 100.0));
    assert!(result.hit);
    assert!((result.hit_position.expect("landed") - Vec3::new(0.0, 0.0, 9.0)).length() < 1e-4);
    assert_eq!(scene.spawned_total(), 1);
    assert_eq!(scene.live_ghosts(), 0);

    // Non-ray modes are never re-traced.
    w.server.validate_sphere(SHOOTER, RequestMeta::new("grenade").shot(2), SphereAttack { center: Vec3::ZERO, radius: 20.0 });
    assert_eq!(scene.spawned_total(), 1);
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn verify_configured_server_publishes_events() {
    let config = RewindConfig::from_toml_str(
        r#"
        [rate_limit]
        rate = 5.0
        burst = 5.0

        [telemetry]
        capacity = 4
        verbose = true

        [[weapons]]
        id = "rifle"
        max_distance = 200.0
        max_rewind_ms = 250.0
        "#,
    )
    .expect("valid config");

    let clock = Arc::new(ManualClock::new(NOW));
    let (server, events) = config.build(clock).expect("builds");
    let events = events.expect("telemetry enabled");

    server.register_entity(EntityId(1), EntityTraits::damageable());
    let mut feed = |_: EntityId| {
        let mut parts = BTreeMap::new();
        parts.insert("Body".to_string(), PartTransform::at(Vec3::new(0.0, 0.0, 10.0), Vec3::splat(2.0)));
        CaptureOutcome::Pose(parts)
    };
    server.capture(NOW - 0.5, &mut feed);
    server.capture(NOW, &mut feed);
    server.update_caller_position(SHOOTER, Vec3::ZERO);

    let result = server.validate_ray(SHOOTER, RequestMeta::new("rifle").at(NOW - 1.0).shot(1), ray(Vec3::Z * 100.0));
    assert!(result.hit);
    assert!((result.used_rewind_ms - 250.0).abs() < 1e-6);

    let event = events.try_recv().expect("published");
    assert_eq!(event.caller, SHOOTER);
    assert_eq!(event.weapon_id, "rifle");
    assert_eq!(event.mode, AttackMode::Ray);
    assert_eq!(event.debug.map(|d| d.candidates_sampled), Some(1));

    // Nobody drains the channel: overflow is dropped, requests still answer.
    for id in 2..7 {
        server.validate_ray(SHOOTER, RequestMeta::new("rifle").shot(id), ray(Vec3::Z * 100.0));
    }
    assert_eq!(server.telemetry().dropped(), 1);
}

#[test]
fn verify_config_rejects_bad_weapon() {
    let err = RewindConfig::from_toml_str("[[weapons]]\nid = \"\"\n");
    assert!(err.is_err());
    let err = RewindConfig::from_toml_str("[[weapons]]\nid = \"rifle\"\nscale_multiplier = 0.0\n");
    assert!(err.is_err());
}
