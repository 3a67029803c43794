//! # Orchestrator Benchmark
//!
//! Cost of one full request against a populated arena:
//! 1. Hitscan ray through 32 humanoids, rewound 100 ms
//! 2. Melee fan at the edge of the crowd
//! 3. A request rejected at the rate check

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rewind_core::{EntityTraits, HistoryConfig, ManualClock, PoseRegistry, TimeSource};
use rewind_networking::{
    BotArena, CompensatorSettings, FanAttack, LagCompensator, RayAttack, RequestMeta, WeaponProfile,
};
use rewind_security::RateLimit;
use rewind_shared::{CallerId, RigidTransform, Vec3};

const BOTS: u32 = 32;
const NOW: f64 = 100.0;

fn populated(settings: CompensatorSettings) -> (LagCompensator, BotArena, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW - 1.0));
    let config = HistoryConfig::default();
    let registry = PoseRegistry::new(config.clone()).expect("valid").into_shared();
    let server = LagCompensator::new(settings, registry, clock.clone());
    server.define_weapon(WeaponProfile::ranged("rifle", 500.0)).expect("valid");
    server.define_weapon(WeaponProfile { melee_rays: 9, ..WeaponProfile::melee("sword", 3.0, 120.0) }).expect("valid");

    let mut arena = BotArena::new(BOTS, 1, 40.0, 17);
    for bot in arena.bots() {
        server.register_entity(bot.id, EntityTraits::damageable());
    }

    // Fill every history.
    let dt = 1.0 / config.capture_hz;
    for _ in 0..config.capacity() {
        arena.step(dt as f32);
        server.capture(clock.now(), &mut arena);
        clock.advance(dt);
    }
    server.update_caller_position(CallerId(1), Vec3::ZERO);
    (server, arena, clock)
}

fn bench_ray(c: &mut Criterion) {
    // Every shot needs a fresh id; a zero window keeps the ledger at one entry.
    let (server, arena, clock) = populated(CompensatorSettings {
        rate_limit: RateLimit::new(1.0e9, 1.0e9).expect("valid"),
        dedup_window: 0.0,
        ..CompensatorSettings::default()
    });
    let target = arena.bots()[0].position + Vec3::Y * 1.2;
    let shot = RayAttack { origin: Vec3::Y * 1.6, direction: (target - Vec3::Y * 1.6).normalize() * 200.0 };
    let mut next_shot = 0u64;

    c.bench_function("orchestrator_ray_32_bots", |b| {
        b.iter(|| {
            next_shot += 1;
            clock.advance(1.0e-6);
            let meta = RequestMeta::new("rifle").at(clock.now() - 0.1).shot(next_shot);
            black_box(server.validate_ray(CallerId(1), meta, black_box(shot)))
        });
    });
}

fn bench_fan(c: &mut Criterion) {
    let (server, arena, _clock) = populated(CompensatorSettings {
        rate_limit: RateLimit::new(1.0e9, 1.0e9).expect("valid"),
        ..CompensatorSettings::default()
    });
    let bot = &arena.bots()[0];
    let stance = bot.position + Vec3::X * 1.5;
    server.update_caller_position(CallerId(2), stance);
    let swing = FanAttack {
        origin: RigidTransform::looking_along(stance + Vec3::Y * 1.2, Vec3::NEG_X),
        range: None,
        angle_deg: None,
        ray_count: None,
    };
    let now = server.now();

    c.bench_function("orchestrator_fan_9_rays", |b| {
        b.iter(|| black_box(server.validate_fan(CallerId(2), RequestMeta::new("sword").at(now - 0.05), black_box(swing))));
    });
}

fn bench_rate_limited(c: &mut Criterion) {
    let (server, _arena, _clock) = populated(CompensatorSettings {
        rate_limit: RateLimit::new(0.0, 1.0).expect("valid"),
        ..CompensatorSettings::default()
    });
    let shot = RayAttack { origin: Vec3::ZERO, direction: Vec3::Z * 100.0 };
    let _ = server.validate_ray(CallerId(1), RequestMeta::new("rifle").shot(0), shot);

    c.bench_function("orchestrator_rate_limited", |b| {
        b.iter(|| black_box(server.validate_ray(CallerId(1), RequestMeta::new("rifle").shot(1), black_box(shot))));
    });
}

criterion_group!(benches, bench_ray, bench_fan, bench_rate_limited);
criterion_main!(benches);
