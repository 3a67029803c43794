//! # REWIND Shared
//!
//! Common types used by the capture feed, the validation server and the
//! remote callers that submit attacks.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `tokio` or any other runtime
//! - `parking_lot` or any other lock crate
//! - Anything that performs I/O
//!
//! If you need state, put it in `rewind_core` or `rewind_networking`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod events;
pub mod ids;
pub mod math;
pub mod pose;
pub mod protocol;

pub use events::{DebugPayload, HitEvent, QueryGeometry};
pub use ids::{CallerId, EntityId, TeamId};
pub use math::{Quat, RigidTransform, Vec3};
pub use pose::{PartName, PartTransform, PoseSnapshot};
pub use protocol::{AttackMode, HitResult, RejectReason};
