//! # Clock Estimator
//!
//! Folds round-trip samples into one `(offset, rtt)` estimate.
//!
//! ```text
//!   t0 = client send        t1 = authority receive
//!   t3 = client receive     t2 = authority send
//!
//!   rtt    = (t3 - t0) - (t2 - t1)
//!   offset = t1 - (t0 + t3) / 2
//! ```
//!
//! `offset` maps the caller's local clock onto authority time. Three
//! smoothing policies are available; [`SmoothingPolicy::Median`] is the
//! default because a single delayed packet cannot drag it.

use std::collections::VecDeque;

use rewind_shared::constants::{DEFAULT_CLOCK_ALPHA, DEFAULT_MEDIAN_MIN_SAMPLES, DEFAULT_MEDIAN_WINDOW};
use thiserror::Error;

/// One completed round trip, all in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSample {
    /// `t0`: local clock when the request left.
    pub client_send_time: f64,
    /// `t1`: authority clock when the request arrived.
    pub server_receive_time: f64,
    /// `t2`: authority clock when the response left.
    pub server_send_time: f64,
    /// `t3`: local clock when the response arrived.
    pub client_receive_time: f64,
}

impl ClockSample {
    /// Network round-trip time, excluding authority processing.
    #[inline]
    #[must_use]
    pub fn rtt(&self) -> f64 {
        (self.client_receive_time - self.client_send_time) - (self.server_send_time - self.server_receive_time)
    }

    /// Local → authority offset.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.server_receive_time - (self.client_send_time + self.client_receive_time) * 0.5
    }

    /// Finite, with a non-negative round trip.
    #[must_use]
    pub fn is_plausible(&self) -> bool {
        let rtt = self.rtt();
        rtt.is_finite() && rtt >= 0.0 && self.offset().is_finite()
    }
}

/// Current estimate for one connection.
///
/// Before `locked`, both fields are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClockState {
    /// Local → authority offset in seconds.
    pub offset: f64,
    /// Smoothed round-trip time in seconds.
    pub rtt: f64,
    /// Whether enough samples exist to trust `offset`.
    pub locked: bool,
}

/// How samples become an estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SmoothingPolicy {
    /// One EMA update per burst, from the burst's lowest-RTT sample.
    MinRtt {
        /// EMA blend factor in `(0, 1]`.
        alpha: f64,
    },
    /// Every sample goes through the EMA.
    EverySample {
        /// EMA blend factor in `(0, 1]`.
        alpha: f64,
    },
    /// Median of the last `window` raw samples.
    Median {
        /// Raw samples kept.
        window: usize,
        /// Samples required before locking.
        min_samples: usize,
    },
}

impl Default for SmoothingPolicy {
    fn default() -> Self {
        Self::Median { window: DEFAULT_MEDIAN_WINDOW, min_samples: DEFAULT_MEDIAN_MIN_SAMPLES }
    }
}

impl SmoothingPolicy {
    /// Min-RTT EMA with the default alpha.
    #[must_use]
    pub const fn min_rtt() -> Self {
        Self::MinRtt { alpha: DEFAULT_CLOCK_ALPHA }
    }

    /// Checks the tuning.
    ///
    /// # Errors
    ///
    /// Alpha outside `(0, 1]`, or a median window that can never lock.
    pub fn validate(&self) -> Result<(), ClockConfigError> {
        match *self {
            Self::MinRtt { alpha } | Self::EverySample { alpha } => {
                if alpha.is_finite() && alpha > 0.0 && alpha <= 1.0 {
                    Ok(())
                } else {
                    Err(ClockConfigError::InvalidAlpha(alpha))
                }
            }
            Self::Median { window, min_samples } => {
                if window == 0 || min_samples == 0 || min_samples > window {
                    Err(ClockConfigError::InvalidMedianWindow { window, min_samples })
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Bad clock tuning. Raised once, at startup.
#[derive(Error, Clone, Copy, Debug, PartialEq)]
pub enum ClockConfigError {
    /// EMA alpha must be in `(0, 1]`.
    #[error("clock alpha must be in (0, 1], got {0}")]
    InvalidAlpha(f64),

    /// Median policy needs `0 < min_samples <= window`.
    #[error("median window {window} cannot lock with min_samples {min_samples}")]
    InvalidMedianWindow {
        /// Samples kept.
        window: usize,
        /// Samples required.
        min_samples: usize,
    },

    /// A burst must contain at least one round trip.
    #[error("clock burst must contain at least one sample")]
    ZeroBurst,

    /// Interval and timeout must be positive.
    #[error("clock {0} must be positive")]
    NonPositiveDuration(&'static str),
}

/// Single-writer estimator behind one connection's [`ClockState`].
#[derive(Clone, Debug)]
pub struct ClockEstimator {
    policy: SmoothingPolicy,
    state: ClockState,
    offsets: VecDeque<f64>,
    rtts: VecDeque<f64>,
}

impl ClockEstimator {
    /// Unlocked estimator.
    ///
    /// # Errors
    ///
    /// Invalid policy tuning.
    pub fn new(policy: SmoothingPolicy) -> Result<Self, ClockConfigError> {
        policy.validate()?;
        let window = match policy {
            SmoothingPolicy::Median { window, .. } => window,
            _ => 0,
        };
        Ok(Self {
            policy,
            state: ClockState::default(),
            offsets: VecDeque::with_capacity(window),
            rtts: VecDeque::with_capacity(window),
        })
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> SmoothingPolicy {
        self.policy
    }

    /// Current estimate.
    #[must_use]
    pub const fn state(&self) -> ClockState {
        self.state
    }

    /// Folds in one burst. Returns how many samples were plausible.
    pub fn ingest_burst(&mut self, samples: &[ClockSample]) -> usize {
        let plausible = samples.iter().filter(|s| s.is_plausible());
        match self.policy {
            SmoothingPolicy::MinRtt { alpha } => {
                let mut count = 0;
                let mut best: Option<&ClockSample> = None;
                for sample in plausible {
                    count += 1;
                    if best.map_or(true, |b| sample.rtt() < b.rtt()) {
                        best = Some(sample);
                    }
                }
                if let Some(best) = best {
                    self.blend(best, alpha);
                }
                count
            }
            SmoothingPolicy::EverySample { alpha } => {
                let mut count = 0;
                for sample in plausible {
                    count += 1;
                    self.blend(sample, alpha);
                }
                count
            }
            SmoothingPolicy::Median { window, min_samples } => {
                let mut count = 0;
                for sample in plausible {
                    count += 1;
                    if self.offsets.len() == window {
                        self.offsets.pop_front();
                        self.rtts.pop_front();
                    }
                    self.offsets.push_back(sample.offset());
                    self.rtts.push_back(sample.rtt());
                }
                if self.offsets.len() >= min_samples {
                    self.state = ClockState { offset: median(&self.offsets), rtt: median(&self.rtts), locked: true };
                }
                count
            }
        }
    }

    /// Forgets everything and unlocks.
    pub fn reset(&mut self) {
        self.state = ClockState::default();
        self.offsets.clear();
        self.rtts.clear();
    }

    fn blend(&mut self, sample: &ClockSample, alpha: f64) {
        if self.state.locked {
            self.state.offset += (sample.offset() - self.state.offset) * alpha;
            self.state.rtt += (sample.rtt() - self.state.rtt) * alpha;
        } else {
            self.state = ClockState { offset: sample.offset(), rtt: sample.rtt(), locked: true };
        }
    }
}

/// Median of a non-empty window; mean of the middle pair for even lengths.
fn median(values: &VecDeque<f64>) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}
