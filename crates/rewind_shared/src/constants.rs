//! # Tuning Defaults
//!
//! Default values for every configurable knob. The server config overrides
//! them at startup; nothing here is read on the hot path directly.

// =============================================================================
// POSE CAPTURE
// =============================================================================

/// Capture tick rate (snapshots per second).
pub const DEFAULT_CAPTURE_HZ: f64 = 60.0;

/// Seconds of pose history kept per entity.
pub const DEFAULT_HISTORY_WINDOW_SECONDS: f64 = 1.0;

/// Never keep fewer snapshots than this.
pub const MIN_HISTORY_CAPACITY: usize = 16;

/// Extra slots on top of `window * hz` to absorb tick jitter.
pub const HISTORY_SLACK: usize = 8;

// =============================================================================
// REWIND
// =============================================================================

/// Hard cap on how far back any request may rewind.
pub const GLOBAL_MAX_REWIND_MS: f64 = 400.0;

// =============================================================================
// REQUEST DEFENSES
// =============================================================================

/// Token refill rate (requests per second per caller).
pub const DEFAULT_RATE_PER_SECOND: f64 = 20.0;

/// Token bucket size.
pub const DEFAULT_RATE_BURST: f64 = 30.0;

/// How long a shot id stays in the duplicate ledger.
pub const DEFAULT_DEDUP_WINDOW_SECONDS: f64 = 3.0;

/// Slack added to weapon range when checking the claimed origin.
pub const DEFAULT_ORIGIN_MARGIN: f32 = 12.0;

/// Absolute limit on hitscan travel.
pub const DEFAULT_MAX_RAY_DISTANCE: f32 = 1000.0;

/// Name of the part that counts as a headshot.
pub const DEFAULT_HEAD_PART: &str = "Head";

// =============================================================================
// CLOCK RECONCILIATION
// =============================================================================

/// Seconds between sync bursts.
pub const DEFAULT_CLOCK_INTERVAL_SECONDS: f64 = 5.0;

/// Round trips per burst.
pub const DEFAULT_CLOCK_BURST_SAMPLES: usize = 8;

/// EMA blend factor.
pub const DEFAULT_CLOCK_ALPHA: f64 = 0.12;

/// Raw offsets kept by the median policy.
pub const DEFAULT_MEDIAN_WINDOW: usize = 16;

/// Offsets required before the median policy locks.
pub const DEFAULT_MEDIAN_MIN_SAMPLES: usize = 8;

/// A round trip older than this is abandoned.
pub const DEFAULT_CLOCK_SAMPLE_TIMEOUT_SECONDS: f64 = 1.0;
