//! # REWIND Security - The Referee
//!
//! Server-side judgement of attack claims.
//!
//! ## Features
//!
//! - **Hit Validation**: ray, sphere, capsule sweep, cone and ray fan against
//!   a rewound pose, with forgiveness margins and headshot policy
//! - **Rate Limiting**: token bucket per caller
//! - **Duplicate Suppression**: shot id ledger per caller
//!
//! ## Architecture
//!
//! ```text
//! ATTACK CLAIM                      REFEREE
//!     │                                │
//!     │─── rate_limit ────────────────►│ enough tokens?
//!     │─── dedup ─────────────────────►│ new shot id?
//!     │                                │
//!     │                                ▼
//!     │                     ┌────────────────────┐
//!     │                     │ validation         │
//!     │                     │ (query vs rewound  │
//!     │                     │  part boxes)       │
//!     │                     └────────────────────┘
//!     │                                │
//!     │◄─── PartHit / None ────────────┤
//! ```
//!
//! Everything here is synchronous and lock-free; the caller owns the state.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod dedup;
pub mod rate_limit;
pub mod validation;

pub use dedup::{ShotId, ShotLedger};
pub use rate_limit::{RateLimit, RateLimitError, TokenBucket};
pub use validation::{
    capsule_sweep_pose, cone_pose, fan_rays_pose, raycast_pose, sphere_pose, PartHit, ValidationContext,
};
