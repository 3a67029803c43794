//! # Time Sources
//!
//! Every component that needs "now" asks a [`TimeSource`] instead of reading
//! the system clock directly. Production uses [`MonotonicClock`]; tests and
//! replays drive a [`ManualClock`] so that every run is reproducible.
//!
//! Times are `f64` seconds. The absolute epoch is meaningless, only
//! differences matter.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Source of the current time in seconds.
pub trait TimeSource: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    #[inline]
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Monotonic wall clock, counted from construction.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    epoch: Instant,
    base: f64,
}

impl MonotonicClock {
    /// Clock that reads `0.0` at construction.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    /// Clock that reads `base` at construction.
    #[must_use]
    pub fn starting_at(base: f64) -> Self {
        Self { epoch: Instant::now(), base }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    #[inline]
    fn now(&self) -> f64 {
        self.base + self.epoch.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    /// Clock reading `start`.
    #[must_use]
    pub fn new(start: f64) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Jumps to `time`.
    pub fn set(&self, time: f64) {
        *self.now.lock() = time;
    }

    /// Moves forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        *self.now.lock() += seconds;
    }
}

impl TimeSource for ManualClock {
    #[inline]
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

/// Another clock shifted by a constant skew.
///
/// Models a remote machine whose clock disagrees with ours.
#[derive(Debug)]
pub struct OffsetClock<T> {
    inner: T,
    offset: f64,
}

impl<T: TimeSource> OffsetClock<T> {
    /// `inner.now() + offset`.
    #[must_use]
    pub const fn new(inner: T, offset: f64) -> Self {
        Self { inner, offset }
    }

    /// The constant skew.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }
}

impl<T: TimeSource> TimeSource for OffsetClock<T> {
    #[inline]
    fn now(&self) -> f64 {
        self.inner.now() + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10.0);
        assert_eq!(clock.now(), 10.0);
        clock.advance(0.25);
        assert_eq!(clock.now(), 10.25);
        clock.set(3.0);
        assert_eq!(clock.now(), 3.0);
    }

    #[test]
    fn test_offset_clock_tracks_inner() {
        let base = Arc::new(ManualClock::new(1.0));
        let skewed = OffsetClock::new(Arc::clone(&base), 2.5);
        assert_eq!(skewed.now(), 3.5);
        base.advance(1.0);
        assert_eq!(skewed.now(), 4.5);
    }

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::starting_at(100.0);
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = clock.now();
        assert!(a >= 100.0);
        assert!(b > a);
    }
}
