//! # Network Simulation
//!
//! Simulated conditions for tests, benchmarks and the demo server.
//!
//! ## Features
//!
//! - Latency, jitter and packet loss on the time-sync link
//! - Bots that move around an arena and feed the capture tick
//! - An in-memory ghost scene for hit re-tracing
//!
//! ## Modules
//!
//! - `arena`: moving bots and the ghost scene

pub mod arena;

pub use arena::{humanoid, Bot, BotArena, SimulatedScene};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rewind_core::TimeSource;

use crate::clock::{ClockError, RoundTripLink, TimeAuthority};
use crate::protocol::{TimeSyncRequest, TimeSyncResponse};

/// Network conditions for simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkConditions {
    /// Base one-way latency in milliseconds.
    pub base_latency_ms: u32,
    /// Jitter (variance) in milliseconds.
    pub jitter_ms: u32,
    /// Packet loss percentage (0-100), per direction.
    pub packet_loss_percent: u8,
}

impl NetworkConditions {
    /// Perfect network conditions (LAN).
    pub const PERFECT: Self = Self { base_latency_ms: 1, jitter_ms: 0, packet_loss_percent: 0 };

    /// Good network conditions (fiber).
    pub const GOOD: Self = Self { base_latency_ms: 20, jitter_ms: 5, packet_loss_percent: 0 };

    /// Average network conditions (cable).
    pub const AVERAGE: Self = Self { base_latency_ms: 50, jitter_ms: 20, packet_loss_percent: 1 };

    /// Poor network conditions (mobile/wifi).
    pub const POOR: Self = Self { base_latency_ms: 100, jitter_ms: 50, packet_loss_percent: 5 };

    /// Fixed latency, no jitter, no loss.
    #[must_use]
    pub const fn fixed(latency_ms: u32) -> Self {
        Self { base_latency_ms: latency_ms, jitter_ms: 0, packet_loss_percent: 0 }
    }

    /// One-way latency with jitter.
    #[must_use]
    pub fn generate_latency(&self, rng: &mut impl Rng) -> Duration {
        let base = i64::from(self.base_latency_ms);
        let jitter = if self.jitter_ms > 0 {
            let spread = i64::from(self.jitter_ms);
            rng.gen_range(-spread..spread)
        } else {
            0
        };
        Duration::from_millis(u64::try_from(base + jitter).unwrap_or(0))
    }

    /// Returns true if a packet should be dropped.
    #[must_use]
    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        self.packet_loss_percent > 0 && rng.gen_range(0..100u8) < self.packet_loss_percent
    }
}

impl Default for NetworkConditions {
    fn default() -> Self {
        Self::AVERAGE
    }
}

/// Time-sync link to an in-process authority through simulated conditions.
///
/// Requests travel as wire bytes. A lost packet never answers; the caller's
/// sample timeout abandons it.
#[derive(Debug)]
pub struct SimulatedLink<C> {
    authority: TimeAuthority<C>,
    conditions: NetworkConditions,
    rng: Mutex<StdRng>,
    sent: AtomicU64,
    lost: AtomicU64,
}

impl<C: TimeSource> SimulatedLink<C> {
    /// Link to an authority stamping with `authority_clock`.
    #[must_use]
    pub fn new(authority_clock: C, conditions: NetworkConditions, seed: u64) -> Self {
        Self {
            authority: TimeAuthority::new(authority_clock),
            conditions,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            sent: AtomicU64::new(0),
            lost: AtomicU64::new(0),
        }
    }

    /// Round trips attempted.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Round trips lost in either direction.
    #[must_use]
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }
}

impl<C: TimeSource> RoundTripLink for SimulatedLink<C> {
    async fn round_trip(&self, request: TimeSyncRequest) -> Result<TimeSyncResponse, ClockError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let (outbound, inbound, lost) = {
            let mut rng = self.rng.lock();
            let outbound = self.conditions.generate_latency(&mut *rng);
            let inbound = self.conditions.generate_latency(&mut *rng);
            let lost = self.conditions.should_drop(&mut *rng) || self.conditions.should_drop(&mut *rng);
            (outbound, inbound, lost)
        };

        let packet = request.to_bytes();
        tokio::time::sleep(outbound).await;
        if lost {
            self.lost.fetch_add(1, Ordering::Relaxed);
            return std::future::pending().await;
        }

        let reply = self.authority.handle_bytes(&packet)?;
        tokio::time::sleep(inbound).await;
        Ok(TimeSyncResponse::from_bytes(&reply)?)
    }
}
