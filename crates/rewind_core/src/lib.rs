//! # REWIND Core
//!
//! The time machine: everything needed to answer "where was this entity at
//! time T?" and "did this query touch it?".
//!
//! ## Pieces
//!
//! - [`time`]: time sources (monotonic, manual, skewed)
//! - [`geometry`]: ray/sphere vs oriented-box kernel
//! - [`history`]: fixed-capacity pose ring per entity
//! - [`rewind`]: deterministic interpolation to a past instant
//! - [`registry`]: tracked entities fed by the capture tick
//!
//! ## Architecture Rules
//!
//! 1. **No allocation in the geometry kernel**
//! 2. **History rings never grow** - capacity is fixed at registration
//! 3. **Rewinding is a pure function** of (history, time)

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod geometry;
pub mod history;
pub mod registry;
pub mod rewind;
pub mod time;

pub use geometry::{angle_between, closest_point_on_box, ray_vs_box, sphere_vs_box, RayBoxHit};
pub use history::{HistoryConfig, HistoryError, PoseHistory, PushOutcome};
pub use registry::{
    CaptureFeed, CaptureOutcome, CaptureReport, EntityTraits, PoseRegistry, SharedRegistry, TrackedEntity,
};
pub use time::{ManualClock, MonotonicClock, OffsetClock, TimeSource};
