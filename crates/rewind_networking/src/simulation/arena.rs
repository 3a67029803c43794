//! Moving bots and an in-memory ghost scene.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rewind_core::geometry::ray_vs_box;
use rewind_core::{CaptureFeed, CaptureOutcome};
use rewind_shared::{EntityId, PartName, PartTransform, Quat, RigidTransform, Vec3};

use crate::server::{GhostHit, GhostId, GhostScene};

/// Bot movement speed (units/s).
const BOT_SPEED: f32 = 5.0;

/// One simulated player.
#[derive(Clone, Debug, PartialEq)]
pub struct Bot {
    /// Tracked id.
    pub id: EntityId,
    /// Feet position.
    pub position: Vec3,
    /// Ground velocity.
    pub velocity: Vec3,
    /// Dead bots report themselves gone.
    pub alive: bool,
}

impl Bot {
    /// Facing angle about +Y, from velocity.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        if self.velocity.length_squared() > 0.0 {
            (-self.velocity.x).atan2(-self.velocity.z)
        } else {
            0.0
        }
    }

    /// Hit boxes of a standing humanoid at the bot's position.
    #[must_use]
    pub fn parts(&self) -> BTreeMap<PartName, PartTransform> {
        humanoid(self.position, self.yaw())
    }
}

/// Hit boxes of a standing humanoid whose feet are at `feet`.
#[must_use]
pub fn humanoid(feet: Vec3, yaw: f32) -> BTreeMap<PartName, PartTransform> {
    let rotation = Quat::from_rotation_y(yaw);
    let part = |offset: Vec3, size: Vec3| PartTransform::new(RigidTransform::new(rotation, feet + rotation * offset), size);

    let mut parts = BTreeMap::new();
    parts.insert("Head".to_string(), part(Vec3::new(0.0, 1.75, 0.0), Vec3::splat(0.3)));
    parts.insert("Torso".to_string(), part(Vec3::new(0.0, 1.2, 0.0), Vec3::new(0.6, 0.7, 0.35)));
    parts.insert("LeftLeg".to_string(), part(Vec3::new(-0.15, 0.425, 0.0), Vec3::new(0.25, 0.85, 0.25)));
    parts.insert("RightLeg".to_string(), part(Vec3::new(0.15, 0.425, 0.0), Vec3::new(0.25, 0.85, 0.25)));
    parts
}

/// Bots wandering a square arena, feeding the capture tick.
#[derive(Debug)]
pub struct BotArena {
    bots: Vec<Bot>,
    half_size: f32,
    rng: StdRng,
}

impl BotArena {
    /// `count` bots with ids `first_id..`, scattered over an arena of `size`.
    #[must_use]
    pub fn new(count: u32, first_id: u32, size: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let half_size = size * 0.5;
        let bots = (0..count)
            .map(|i| {
                let position = Vec3::new(rng.gen_range(-half_size..half_size), 0.0, rng.gen_range(-half_size..half_size));
                let heading: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
                Bot {
                    id: EntityId(first_id + i),
                    position,
                    velocity: Vec3::new(heading.cos(), 0.0, heading.sin()) * BOT_SPEED,
                    alive: true,
                }
            })
            .collect();
        Self { bots, half_size, rng }
    }

    /// Moves every living bot by `dt` seconds, bouncing off the walls and
    /// turning at random now and then.
    pub fn step(&mut self, dt: f32) {
        for bot in self.bots.iter_mut().filter(|b| b.alive) {
            if self.rng.gen_range(0..120u32) == 0 {
                let heading: f32 = self.rng.gen_range(0.0..std::f32::consts::TAU);
                bot.velocity = Vec3::new(heading.cos(), 0.0, heading.sin()) * BOT_SPEED;
            }
            bot.position += bot.velocity * dt;
            if bot.position.x.abs() > self.half_size {
                bot.velocity.x = -bot.velocity.x;
                bot.position.x = bot.position.x.clamp(-self.half_size, self.half_size);
            }
            if bot.position.z.abs() > self.half_size {
                bot.velocity.z = -bot.velocity.z;
                bot.position.z = bot.position.z.clamp(-self.half_size, self.half_size);
            }
        }
    }

    /// Bot by id.
    #[must_use]
    pub fn bot(&self, id: EntityId) -> Option<&Bot> {
        self.bots.iter().find(|b| b.id == id)
    }

    /// All bots.
    #[must_use]
    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    /// Marks a bot dead; the next capture reports it gone.
    pub fn kill(&mut self, id: EntityId) -> bool {
        match self.bots.iter_mut().find(|b| b.id == id) {
            Some(bot) => {
                bot.alive = false;
                true
            }
            None => false,
        }
    }
}

impl CaptureFeed for BotArena {
    fn capture(&mut self, entity: EntityId) -> CaptureOutcome {
        match self.bot(entity) {
            Some(bot) if bot.alive => CaptureOutcome::Pose(bot.parts()),
            Some(_) => CaptureOutcome::Gone,
            None => CaptureOutcome::Skip,
        }
    }
}

/// In-memory scene holding ghost boxes, raycast with the geometry kernel.
#[derive(Debug, Default)]
pub struct SimulatedScene {
    ghosts: Mutex<HashMap<GhostId, (RigidTransform, Vec3)>>,
    next_id: AtomicU64,
}

impl SimulatedScene {
    /// Empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ghosts currently alive.
    #[must_use]
    pub fn live_ghosts(&self) -> usize {
        self.ghosts.lock().len()
    }

    /// Ghosts ever spawned.
    #[must_use]
    pub fn spawned_total(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl GhostScene for SimulatedScene {
    fn spawn_box(&self, transform: &RigidTransform, size: Vec3) -> GhostId {
        let id = GhostId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.ghosts.lock().insert(id, (*transform, size));
        id
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, only: &[GhostId]) -> Option<GhostHit> {
        let ghosts = self.ghosts.lock();
        only.iter()
            .filter_map(|id| {
                let (transform, size) = ghosts.get(id)?;
                let hit = ray_vs_box(origin, direction, max_distance, transform, *size)?;
                Some((hit.t, GhostHit { ghost: *id, position: origin + direction * hit.t, normal: hit.normal }))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.ghost.cmp(&b.1.ghost)))
            .map(|(_, hit)| hit)
    }

    fn despawn(&self, ghost: GhostId) {
        self.ghosts.lock().remove(&ghost);
    }
}
