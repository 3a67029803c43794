//! # Capture Tick
//!
//! Fixed-timestep loop that snapshots every tracked entity.
//!
//! ## Design
//!
//! The capture tick must:
//! - Run at the configured rate regardless of capture cost
//! - Hold the registry write lock only for the capture pass itself
//! - Stamp every snapshot of one pass with the same authority time

use std::sync::Arc;
use std::time::{Duration, Instant};

use rewind_core::{CaptureFeed, CaptureReport, SharedRegistry, TimeSource};

/// Fixed-timestep capture controller.
pub struct CaptureTick {
    /// Target tick duration.
    tick_duration: Duration,
    /// Time of last tick check.
    last_tick: Instant,
    /// Time owed to pending ticks.
    accumulator: Duration,
    /// Total ticks executed.
    tick_count: u64,
    /// Frame time statistics.
    stats: TickStats,
    /// Where snapshots go.
    registry: SharedRegistry,
    /// Authority clock stamping snapshots.
    clock: Arc<dyn TimeSource>,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Ticks that overran the budget.
    pub late_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
    /// Snapshots stored across all ticks.
    pub snapshots: u64,
}

impl TickStats {
    fn fresh(tick_duration: Duration) -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: duration_us(tick_duration),
            late_ticks: 0,
            total_ticks: 0,
            snapshots: 0,
        }
    }
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl CaptureTick {
    /// Capture loop at `tick_rate` Hz (at least 1).
    #[must_use]
    pub fn new(tick_rate: u32, registry: SharedRegistry, clock: Arc<dyn TimeSource>) -> Self {
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        Self {
            tick_duration,
            last_tick: Instant::now(),
            accumulator: Duration::ZERO,
            tick_count: 0,
            stats: TickStats::fresh(tick_duration),
            registry,
            clock,
        }
    }

    /// Returns true if a capture is due.
    #[must_use]
    pub fn should_tick(&mut self) -> bool {
        let now = Instant::now();
        self.accumulator += now.duration_since(self.last_tick);
        self.last_tick = now;
        self.accumulator >= self.tick_duration
    }

    /// Runs one capture pass now, whether or not it is due.
    pub fn run_once<F>(&mut self, feed: &mut F) -> CaptureReport
    where
        F: CaptureFeed + ?Sized,
    {
        self.accumulator = self.accumulator.saturating_sub(self.tick_duration);
        self.tick_count += 1;
        let start = Instant::now();

        let timestamp = self.clock.now();
        let report = self.registry.write().capture(timestamp, feed);

        self.record(start.elapsed(), &report);
        report
    }

    /// Runs every due capture, then returns the combined report.
    pub fn catch_up<F>(&mut self, feed: &mut F) -> CaptureReport
    where
        F: CaptureFeed + ?Sized,
    {
        let mut total = CaptureReport::default();
        while self.should_tick() {
            let report = self.run_once(feed);
            total.captured += report.captured;
            total.skipped += report.skipped;
            total.stale += report.stale;
            total.removed += report.removed;
        }
        total
    }

    fn record(&mut self, duration: Duration, report: &CaptureReport) {
        let duration_us = duration_us(duration);
        self.stats.total_ticks += 1;
        self.stats.snapshots += report.captured as u64;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        self.stats.avg_tick_us = (self.stats.avg_tick_us * 15 + duration_us) / 16;
        if duration > self.tick_duration {
            self.stats.late_ticks += 1;
            tracing::debug!(tick = self.tick_count, duration_us, "capture tick overran budget");
        }
    }

    /// Waits until the next tick is due.
    ///
    /// Sleeps most of the gap, spins the last half millisecond.
    pub fn wait_for_next_tick(&self) {
        let elapsed = self.last_tick.elapsed();
        if elapsed < self.tick_duration {
            let remaining = self.tick_duration - elapsed;
            if remaining > Duration::from_micros(1000) {
                std::thread::sleep(remaining - Duration::from_micros(500));
            }
            while self.last_tick.elapsed() < self.tick_duration {
                std::hint::spin_loop();
            }
        }
    }

    /// Captures at the fixed rate for `duration`.
    pub fn run_for<F>(&mut self, duration: Duration, feed: &mut F)
    where
        F: CaptureFeed + ?Sized,
    {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            self.catch_up(feed);
            self.wait_for_next_tick();
        }
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Target tick duration.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Registry this loop writes to.
    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::fresh(self.tick_duration);
    }
}

impl std::fmt::Debug for CaptureTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureTick")
            .field("tick_duration", &self.tick_duration)
            .field("tick_count", &self.tick_count)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
