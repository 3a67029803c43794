//! Best-effort telemetry.
//!
//! Every validation request produces one [`HitEvent`]. The sink never
//! blocks: when the channel is full or nobody listens, the event is dropped
//! and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use rewind_shared::HitEvent;

/// Default channel depth.
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 1024;

/// Producer side of the telemetry channel.
#[derive(Debug)]
pub struct TelemetrySink {
    sender: Option<Sender<HitEvent>>,
    verbose: bool,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl TelemetrySink {
    /// Bounded sink plus the receiver to drain it.
    #[must_use]
    pub fn bounded(capacity: usize, verbose: bool) -> (Self, Receiver<HitEvent>) {
        let (sender, receiver) = bounded(capacity.max(1));
        let sink = Self { sender: Some(sender), verbose, published: AtomicU64::new(0), dropped: AtomicU64::new(0) };
        (sink, receiver)
    }

    /// Sink that discards everything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None, verbose: false, published: AtomicU64::new(0), dropped: AtomicU64::new(0) }
    }

    /// Whether callers should build debug payloads.
    #[inline]
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose && self.sender.is_some()
    }

    /// Whether anything listens at all.
    #[inline]
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Publishes without blocking.
    pub fn publish(&self, event: HitEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(event) | TrySendError::Disconnected(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(caller = %event.caller, dropped, "telemetry event dropped");
            }
        }
    }

    /// Events delivered so far.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Events dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for TelemetrySink {
    fn default() -> Self {
        Self::disabled()
    }
}
