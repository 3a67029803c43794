//! # Pose History Store
//!
//! Bounded, time-ordered ring of one entity's recent poses.
//!
//! ```text
//!  capacity = max(min_capacity, floor(window * hz) + slack)
//!
//!  slots:  [ t7 ][ t8 ][ t3 ][ t4 ][ t5 ][ t6 ]
//!                       ▲ oldest          ▲ newest
//!                 ▲ write_index
//! ```
//!
//! Writes are O(1). Once full, each push overwrites the oldest slot. The
//! capacity is the only thing that bounds the time window.

use rewind_shared::constants::{
    DEFAULT_CAPTURE_HZ, DEFAULT_HISTORY_WINDOW_SECONDS, HISTORY_SLACK, MIN_HISTORY_CAPACITY,
};
use rewind_shared::PoseSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid history sizing.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum HistoryError {
    /// Capture rate must be positive and finite.
    #[error("capture rate must be positive, got {0}")]
    InvalidCaptureRate(f64),

    /// Window must be non-negative and finite.
    #[error("history window must be non-negative, got {0}")]
    InvalidWindow(f64),

    /// The computed capacity would hold nothing.
    #[error("history capacity resolves to zero")]
    ZeroCapacity,
}

/// Sizing of every entity's ring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Seconds of history to keep.
    pub window_seconds: f64,
    /// Capture tick rate (Hz).
    pub capture_hz: f64,
    /// Lower bound on slots.
    pub min_capacity: usize,
    /// Extra slots for tick jitter.
    pub slack: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_HISTORY_WINDOW_SECONDS,
            capture_hz: DEFAULT_CAPTURE_HZ,
            min_capacity: MIN_HISTORY_CAPACITY,
            slack: HISTORY_SLACK,
        }
    }
}

impl HistoryConfig {
    /// Slots per entity.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn capacity(&self) -> usize {
        let base = (self.window_seconds * self.capture_hz).floor().max(0.0) as usize;
        (base + self.slack).max(self.min_capacity)
    }

    /// Checks the sizing before any ring is built.
    ///
    /// # Errors
    ///
    /// Non-positive capture rate, negative window, or zero capacity.
    pub fn validate(&self) -> Result<(), HistoryError> {
        if !(self.capture_hz.is_finite() && self.capture_hz > 0.0) {
            return Err(HistoryError::InvalidCaptureRate(self.capture_hz));
        }
        if !(self.window_seconds.is_finite() && self.window_seconds >= 0.0) {
            return Err(HistoryError::InvalidWindow(self.window_seconds));
        }
        if self.capacity() == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        Ok(())
    }
}

/// What a push did to the ring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PushOutcome {
    /// Appended into a free slot.
    Stored,
    /// Appended by overwriting the oldest entry.
    Evicted {
        /// Timestamp of the dropped entry.
        evicted_timestamp: f64,
    },
    /// Not stored: older than the newest entry, or not a finite time.
    RejectedStale {
        /// Timestamp of the newest stored entry.
        newest_timestamp: f64,
    },
}

impl PushOutcome {
    /// True if the snapshot is now in the ring.
    #[must_use]
    pub const fn is_stored(self) -> bool {
        !matches!(self, Self::RejectedStale { .. })
    }
}

/// Fixed-capacity ring of poses, oldest to newest.
#[derive(Clone, Debug)]
pub struct PoseHistory {
    /// Slot storage; never grows.
    slots: Box<[Option<PoseSnapshot>]>,
    /// Next slot to write.
    write_index: usize,
    /// Number of valid entries.
    count: usize,
}

impl PoseHistory {
    /// Empty ring with `capacity` slots (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| None).collect(),
            write_index: 0,
            count: 0,
        }
    }

    /// Empty ring sized from `config`.
    #[must_use]
    pub fn with_config(config: &HistoryConfig) -> Self {
        Self::new(config.capacity())
    }

    /// Appends a snapshot.
    ///
    /// Timestamps must not go backwards; a snapshot older than the newest
    /// entry is rejected so that the ring stays sorted.
    pub fn push(&mut self, snapshot: PoseSnapshot) -> PushOutcome {
        if let Some(newest) = self.last() {
            let newest_timestamp = newest.timestamp;
            if !snapshot.timestamp.is_finite() || snapshot.timestamp < newest_timestamp {
                return PushOutcome::RejectedStale { newest_timestamp };
            }
        } else if !snapshot.timestamp.is_finite() {
            return PushOutcome::RejectedStale { newest_timestamp: f64::NEG_INFINITY };
        }

        let capacity = self.slots.len();
        let previous = self.slots[self.write_index].replace(snapshot);
        self.write_index = (self.write_index + 1) % capacity;

        if self.count < capacity {
            self.count += 1;
            PushOutcome::Stored
        } else {
            PushOutcome::Evicted {
                evicted_timestamp: previous.map_or(f64::NEG_INFINITY, |s| s.timestamp),
            }
        }
    }

    /// Entry `i`, counted from the oldest (0).
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&PoseSnapshot> {
        if i >= self.count {
            return None;
        }
        let capacity = self.slots.len();
        let oldest = (self.write_index + capacity - self.count) % capacity;
        self.slots[(oldest + i) % capacity].as_ref()
    }

    /// Oldest entry.
    #[must_use]
    pub fn first(&self) -> Option<&PoseSnapshot> {
        self.get(0)
    }

    /// Newest entry.
    #[must_use]
    pub fn last(&self) -> Option<&PoseSnapshot> {
        self.count.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Entries oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PoseSnapshot> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }

    /// Number of stored entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// True if nothing is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drops every entry, keeping the slots.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.write_index = 0;
        self.count = 0;
    }
}
