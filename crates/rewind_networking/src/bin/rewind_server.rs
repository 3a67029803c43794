//! # Rewind Demo Server
//!
//! An authority judging synthetic attacks against wandering bots.
//!
//! ## Usage
//!
//! ```bash
//! rewind_server --config rewind.toml --tick-rate 60 --bots 32 --duration 30
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rewind_core::{EntityTraits, MonotonicClock, OffsetClock, TimeSource};
use rewind_networking::config::RetraceKind;
use rewind_networking::{
    BotArena, CaptureTick, ClockState, ClockSync, FanAttack, GhostRetrace, LagCompensator, NetworkConditions, RayAttack,
    RequestMeta, RewindConfig, SimulatedLink, SimulatedScene, WeaponProfile,
};
use rewind_shared::{AttackMode, CallerId, RejectReason, RigidTransform, TeamId, Vec3};

/// Shooter standing at the arena center.
const SHOOTER: CallerId = CallerId(1000);
/// Melee caller that walks up to its targets.
const BRAWLER: CallerId = CallerId(1001);
/// How stale the shooter's view of the world is.
const INTERPOLATION_DELAY: f64 = 0.1;
/// Skew between the shooter's clock and the authority's.
const CLIENT_SKEW: f64 = -2.5;
/// Torso height above the feet.
const TORSO_HEIGHT: f32 = 1.2;

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         REWIND DEMO SERVER                                       ║");
    println!("║         JUDGING THE PAST                                         ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut tick_rate = 60u32;
    let mut bot_count = 32u32;
    let mut duration_secs: Option<u32> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--tick-rate" | "-t" => {
                if i + 1 < args.len() {
                    tick_rate = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--bots" | "-b" => {
                if i + 1 < args.len() {
                    bot_count = args[i + 1].parse().unwrap_or(32);
                    i += 1;
                }
            }
            "--duration" | "-d" => {
                if i + 1 < args.len() {
                    duration_secs = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: rewind_server [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>        TOML configuration (default: built-in)");
                println!("  -t, --tick-rate <RATE>     Capture rate in Hz (default: 60)");
                println!("  -b, --bots <NUM>           Simulated bots (default: 32)");
                println!("  -d, --duration <SECS>      Run for N seconds then exit");
                println!("  -h, --help                 Show this help");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    if let Err(err) = run(config_path.as_deref(), tick_rate.max(1), bot_count, duration_secs) {
        eprintln!("rewind_server: {err}");
        std::process::exit(1);
    }
}

fn run(
    config_path: Option<&str>,
    tick_rate: u32,
    bot_count: u32,
    duration_secs: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => RewindConfig::load(path)?,
        None => demo_config(),
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Config:             {}", config_path.unwrap_or("built-in"));
    println!("│ Role:               {:?}", config.role);
    println!("│ Tick Rate:          {tick_rate} Hz");
    println!("│ Bots:               {bot_count}");
    println!("│ Weapons:            {}", config.weapons.len());
    println!("│ Retrace:            {:?}", config.validation.retrace);
    match duration_secs {
        Some(d) => println!("│ Duration:           {d} seconds"),
        None => println!("│ Duration:           infinite"),
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let authority = Arc::new(MonotonicClock::starting_at(1000.0));
    let server_clock: Arc<dyn TimeSource> = authority.clone();
    let (server, events) = config.build(Arc::clone(&server_clock))?;
    let server = match config.validation.retrace {
        RetraceKind::Ghost => server.with_refiner(GhostRetrace::new(SimulatedScene::new())),
        RetraceKind::Analytic => server,
    };

    let mut arena = BotArena::new(bot_count, 1, 60.0, 0x5EED);
    for bot in arena.bots() {
        let team = TeamId(1 + u16::try_from(bot.id.0 % 2).unwrap_or(0));
        server.register_entity(bot.id, EntityTraits::damageable().with_team(team));
    }
    server.update_caller_position(SHOOTER, Vec3::ZERO);
    server.set_caller_team(BRAWLER, Some(TeamId(1)));

    let runtime = tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_time().build()?;
    let client_local: Arc<dyn TimeSource> = Arc::new(OffsetClock::new(Arc::clone(&authority), CLIENT_SKEW));
    let link = SimulatedLink::new(Arc::clone(&authority), NetworkConditions::AVERAGE, 7);
    let clock_sync = ClockSync::new(link, client_local, config.clock_sync_config()?)?;
    let clock_task = {
        let _guard = runtime.enter();
        clock_sync.spawn()
    };
    let client_clock = clock_task.clock();

    let mut tick = CaptureTick::new(tick_rate, server.registry(), server_clock);
    let mut rng = StdRng::seed_from_u64(42);
    let mut outcomes: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut next_shot = 0u64;

    println!("Starting server...");
    println!();

    let dt = 1.0 / tick_rate as f32;
    let attack_every = u64::from((tick_rate / 10).max(1));
    let stats_interval = u64::from(tick_rate) * 5; // Every 5 seconds
    let start = Instant::now();
    let mut last_stats_tick = 0u64;

    loop {
        if let Some(duration) = duration_secs {
            if start.elapsed().as_secs() >= u64::from(duration) {
                break;
            }
        }

        tick.wait_for_next_tick();

        while tick.should_tick() {
            arena.step(dt);
            tick.run_once(&mut arena);

            let current_tick = tick.tick_count();
            if current_tick % attack_every == 0 {
                server.record_caller_clock(SHOOTER, client_clock.state());
                let client_time = client_clock.now() - INTERPOLATION_DELAY;
                fire(&server, &arena, &mut rng, &mut next_shot, client_time, current_tick / attack_every);
            }

            if let Some(rx) = &events {
                for event in rx.try_iter() {
                    *outcomes.entry(event.result.reason.map_or("hit", RejectReason::code)).or_default() += 1;
                }
            }

            if current_tick - last_stats_tick >= stats_interval {
                last_stats_tick = current_tick;
                print_status(&server, &tick, &client_clock.state(), start, current_tick);
            }
        }
    }

    runtime.block_on(clock_task.stop());

    let final_stats = tick.stats();
    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    SERVER SHUTDOWN                               ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║ Total Ticks:        {:>10}                                 ║", final_stats.total_ticks);
    println!("║ Snapshots:          {:>10}                                 ║", final_stats.snapshots);
    println!("║ Avg Tick Time:      {:>10} μs                             ║", final_stats.avg_tick_us);
    println!("║ Max Tick Time:      {:>10} μs                             ║", final_stats.max_tick_us);
    println!("║ Late Ticks:         {:>10}                                 ║", final_stats.late_ticks);
    println!("╠══════════════════════════════════════════════════════════════════╣");
    for (code, count) in &outcomes {
        println!("║ {code:<19} {count:>10}                                 ║");
    }
    println!("║ Telemetry Dropped:  {:>10}                                 ║", server.telemetry().dropped());
    println!("╚══════════════════════════════════════════════════════════════════╝");
    Ok(())
}

/// Built-in configuration: defaults plus a rifle and a sword.
fn demo_config() -> RewindConfig {
    let mut config = RewindConfig::default();
    config.weapons.push(WeaponProfile::ranged("rifle", 300.0));
    config.weapons.push(WeaponProfile::melee("sword", 2.5, 120.0));
    config
}

/// Fires one rifle shot from the center and, every fifth volley, one sword fan.
fn fire(
    server: &LagCompensator,
    arena: &BotArena,
    rng: &mut StdRng,
    next_shot: &mut u64,
    client_time: f64,
    volley: u64,
) {
    let living: Vec<_> = arena.bots().iter().filter(|b| b.alive).collect();
    if living.is_empty() {
        return;
    }
    let target = living[rng.gen_range(0..living.len())];

    // The shooter sees the target where it was one interpolation delay ago.
    let seen = target.position - target.velocity * INTERPOLATION_DELAY as f32 + Vec3::Y * TORSO_HEIGHT;
    let muzzle = Vec3::Y * 1.6;
    let direction = (seen - muzzle).normalize_or_zero() * 300.0;

    // Every tenth shot is a resend of the previous one.
    if volley % 10 != 0 {
        *next_shot += 1;
    }
    server.validate_ray(
        SHOOTER,
        RequestMeta::new("rifle").at(client_time).shot(*next_shot),
        RayAttack { origin: muzzle, direction },
    );

    if volley % 5 == 0 {
        let facing = target.position.normalize_or(Vec3::NEG_Z);
        let stance = target.position - facing * 1.5;
        server.update_caller_position(BRAWLER, stance);
        server.validate_fan(
            BRAWLER,
            RequestMeta::new("sword").at(client_time),
            FanAttack {
                origin: RigidTransform::looking_along(stance + Vec3::Y * TORSO_HEIGHT, facing),
                range: None,
                angle_deg: None,
                ray_count: None,
            },
        );
    }
}

fn print_status(
    server: &LagCompensator,
    tick: &CaptureTick,
    clock: &ClockState,
    start: Instant,
    current_tick: u64,
) {
    let stats = tick.stats();
    let ray = server.stats(AttackMode::Ray);
    let fan = server.stats(AttackMode::Fan);

    println!("┌─ SERVER STATUS (Tick {current_tick}) ────────────────────────────────────");
    println!("│ Uptime:             {:.1}s", start.elapsed().as_secs_f64());
    println!("│ Entities:           {}", server.registry().read().len());
    println!(
        "│ Client Clock:       {} (offset {:+.4}s, rtt {:.1} ms)",
        if clock.locked { "LOCKED" } else { "SEARCHING" },
        clock.offset,
        clock.rtt * 1000.0
    );
    println!("│ Ray Hits:           {} / {}", ray.hits, ray.requests);
    println!("│ Fan Hits:           {} / {}", fan.hits, fan.requests);
    println!("│ Avg Tick Time:      {} μs", stats.avg_tick_us);
    println!(
        "│ Late Ticks:         {} ({:.2}%)",
        stats.late_ticks,
        stats.late_ticks as f64 / stats.total_ticks.max(1) as f64 * 100.0
    );
    println!("└──────────────────────────────────────────────────────────────────");
    println!();
}
