//! # Clock Sync Task
//!
//! Both halves of clock reconciliation.
//!
//! - [`TimeAuthority`]: stateless responder on the authoritative side
//! - [`ClockSync`]: per-connection tokio task on the caller side
//! - [`SharedClock`]: lock-cheap reader handed to everyone else
//!
//! ```text
//!   every `interval`:
//!     ┌─ burst of N round trips over RoundTripLink ─┐
//!     │  timeout / echo mismatch → sample dropped    │
//!     └───────────────► ClockEstimator ──► SharedClock state (single writer)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rewind_core::TimeSource;
use rewind_shared::constants::{
    DEFAULT_CLOCK_BURST_SAMPLES, DEFAULT_CLOCK_INTERVAL_SECONDS, DEFAULT_CLOCK_SAMPLE_TIMEOUT_SECONDS,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::estimator::{ClockConfigError, ClockEstimator, ClockSample, ClockState, SmoothingPolicy};
use crate::protocol::{ProtocolError, TimeSyncRequest, TimeSyncResponse};

/// A round trip that produced no usable sample.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ClockError {
    /// No answer within the sample timeout.
    #[error("time sync round trip timed out")]
    Timeout,

    /// The link lost the packet.
    #[error("time sync packet dropped")]
    Dropped,

    /// The answer echoed a different request.
    #[error("time sync echo mismatch: sent {sent}, echoed {echoed}")]
    EchoMismatch {
        /// Our send time.
        sent: f64,
        /// What came back.
        echoed: f64,
    },

    /// Transport failure.
    #[error("time sync link failed: {0}")]
    Link(String),
}

impl From<ProtocolError> for ClockError {
    fn from(err: ProtocolError) -> Self {
        Self::Link(err.to_string())
    }
}

/// Carries one time-sync request to the authority and its answer back.
pub trait RoundTripLink: Send + Sync {
    /// Sends `request` and waits for the matching response.
    fn round_trip(&self, request: TimeSyncRequest) -> impl Future<Output = Result<TimeSyncResponse, ClockError>> + Send;
}

// =============================================================================
// AUTHORITY SIDE
// =============================================================================

/// Answers time-sync requests with the authority clock. Keeps no state.
#[derive(Clone, Debug)]
pub struct TimeAuthority<C> {
    clock: C,
}

impl<C: TimeSource> TimeAuthority<C> {
    /// Responder stamping with `clock`.
    #[must_use]
    pub const fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Stamps and echoes.
    #[must_use]
    pub fn respond(&self, request: TimeSyncRequest) -> TimeSyncResponse {
        let server_receive_time = self.clock.now();
        TimeSyncResponse {
            echoed_client_send_time: request.client_send_time,
            server_receive_time,
            server_send_time: self.clock.now(),
        }
    }

    /// Wire-level [`respond`](Self::respond).
    ///
    /// # Errors
    ///
    /// Malformed request packet.
    pub fn handle_bytes(&self, packet: &[u8]) -> Result<[u8; TimeSyncResponse::SIZE], ProtocolError> {
        let request = TimeSyncRequest::from_bytes(packet)?;
        Ok(self.respond(request).to_bytes())
    }
}

// =============================================================================
// CALLER SIDE
// =============================================================================

/// Local clock corrected by the latest estimate.
///
/// Cloning shares the estimate. Only the owning [`ClockSync`] writes it.
#[derive(Clone)]
pub struct SharedClock {
    local: Arc<dyn TimeSource>,
    state: Arc<RwLock<ClockState>>,
}

impl SharedClock {
    /// Unlocked clock over `local`.
    #[must_use]
    pub fn new(local: Arc<dyn TimeSource>) -> Self {
        Self { local, state: Arc::new(RwLock::new(ClockState::default())) }
    }

    /// Latest estimate.
    #[must_use]
    pub fn state(&self) -> ClockState {
        *self.state.read()
    }

    /// Uncorrected local time.
    #[must_use]
    pub fn local_now(&self) -> f64 {
        self.local.now()
    }

    fn publish(&self, state: ClockState) {
        *self.state.write() = state;
    }
}

impl TimeSource for SharedClock {
    fn now(&self) -> f64 {
        let state = self.state();
        if state.locked {
            self.local.now() + state.offset
        } else {
            self.local.now()
        }
    }
}

impl std::fmt::Debug for SharedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClock").field("state", &self.state()).finish_non_exhaustive()
    }
}

/// Clock built on `tokio::time::Instant`, so paused-time tests see it move.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    epoch: tokio::time::Instant,
    base: f64,
}

impl TokioClock {
    /// Clock reading `base` now.
    #[must_use]
    pub fn starting_at(base: f64) -> Self {
        Self { epoch: tokio::time::Instant::now(), base }
    }
}

impl TimeSource for TokioClock {
    fn now(&self) -> f64 {
        self.base + self.epoch.elapsed().as_secs_f64()
    }
}

/// Reconciliation loop tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSyncConfig {
    /// Time between bursts.
    pub interval: Duration,
    /// Round trips per burst.
    pub burst_samples: usize,
    /// A round trip slower than this is abandoned.
    pub sample_timeout: Duration,
    /// How samples become an estimate.
    pub policy: SmoothingPolicy,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs_f64(DEFAULT_CLOCK_INTERVAL_SECONDS),
            burst_samples: DEFAULT_CLOCK_BURST_SAMPLES,
            sample_timeout: Duration::from_secs_f64(DEFAULT_CLOCK_SAMPLE_TIMEOUT_SECONDS),
            policy: SmoothingPolicy::default(),
        }
    }
}

impl ClockSyncConfig {
    /// Checks the tuning.
    ///
    /// # Errors
    ///
    /// Zero burst, zero durations or bad policy tuning.
    pub fn validate(&self) -> Result<(), ClockConfigError> {
        if self.burst_samples == 0 {
            return Err(ClockConfigError::ZeroBurst);
        }
        if self.interval.is_zero() {
            return Err(ClockConfigError::NonPositiveDuration("interval"));
        }
        if self.sample_timeout.is_zero() {
            return Err(ClockConfigError::NonPositiveDuration("sample_timeout"));
        }
        self.policy.validate()
    }
}

/// Caller-side reconciliation for one connection.
pub struct ClockSync<L> {
    link: L,
    clock: SharedClock,
    estimator: ClockEstimator,
    config: ClockSyncConfig,
}

impl<L: RoundTripLink> ClockSync<L> {
    /// Unlocked task over `link`, correcting `local`.
    ///
    /// # Errors
    ///
    /// Invalid tuning.
    pub fn new(link: L, local: Arc<dyn TimeSource>, config: ClockSyncConfig) -> Result<Self, ClockConfigError> {
        config.validate()?;
        Ok(Self { link, clock: SharedClock::new(local), estimator: ClockEstimator::new(config.policy)?, config })
    }

    /// Reader handle for the corrected clock.
    #[must_use]
    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    /// Current estimate.
    #[must_use]
    pub const fn state(&self) -> ClockState {
        self.estimator.state()
    }

    /// One burst. Returns how many samples were kept.
    pub async fn run_burst(&mut self) -> usize {
        let mut samples = Vec::with_capacity(self.config.burst_samples);
        for _ in 0..self.config.burst_samples {
            match self.sample_once().await {
                Ok(sample) => samples.push(sample),
                Err(err) => tracing::debug!(error = %err, "clock sample dropped"),
            }
        }

        let was_locked = self.estimator.state().locked;
        let kept = self.estimator.ingest_burst(&samples);
        let state = self.estimator.state();
        self.clock.publish(state);

        if state.locked && !was_locked {
            tracing::info!(offset = state.offset, rtt = state.rtt, "clock locked");
        }
        kept
    }

    async fn sample_once(&self) -> Result<ClockSample, ClockError> {
        let t0 = self.clock.local_now();
        let request = TimeSyncRequest::new(t0);
        let response = tokio::time::timeout(self.config.sample_timeout, self.link.round_trip(request))
            .await
            .map_err(|_| ClockError::Timeout)??;

        if response.echoed_client_send_time.to_bits() != t0.to_bits() {
            return Err(ClockError::EchoMismatch { sent: t0, echoed: response.echoed_client_send_time });
        }

        Ok(ClockSample {
            client_send_time: t0,
            server_receive_time: response.server_receive_time,
            server_send_time: response.server_send_time,
            client_receive_time: self.clock.local_now(),
        })
    }

    /// Bursts every `interval` until `shutdown` flips to `true` or closes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_burst().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("clock sync stopped");
    }
}

impl<L: RoundTripLink + 'static> ClockSync<L> {
    /// Runs on the current tokio runtime.
    #[must_use]
    pub fn spawn(self) -> ClockSyncHandle {
        let clock = self.clock();
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        ClockSyncHandle { clock, shutdown, task }
    }
}

/// A spawned [`ClockSync`].
#[derive(Debug)]
pub struct ClockSyncHandle {
    clock: SharedClock,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ClockSyncHandle {
    /// Reader handle for the corrected clock.
    #[must_use]
    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    /// Signals shutdown and waits for the task.
    pub async fn stop(self) {
        // A closed channel also stops the task.
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "clock sync task failed");
        }
    }
}
