//! # Clock Reconciliation
//!
//! Keeps each caller's idea of "authority time" honest.
//!
//! Attack requests carry a timestamp in authority time. The caller can only
//! produce one if it knows how far its own clock is from ours, so it runs a
//! [`ClockSync`] task that measures that gap continuously. The authority side
//! is a stateless [`TimeAuthority`].

pub mod estimator;
pub mod sync;

pub use estimator::{ClockConfigError, ClockEstimator, ClockSample, ClockState, SmoothingPolicy};
pub use sync::{
    ClockError, ClockSync, ClockSyncConfig, ClockSyncHandle, RoundTripLink, SharedClock, TimeAuthority, TokioClock,
};
