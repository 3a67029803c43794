//! # REWIND Networking - The Arbiter
//!
//! The authoritative side of lag compensation.
//!
//! ## Architecture
//!
//! This crate wires the pure pieces of `rewind_core` and `rewind_security`
//! into a server:
//!
//! - **Clock**: continuous caller/authority clock reconciliation
//! - **Protocol**: time-sync packets and attack requests
//! - **Server**: the request orchestrator, weapon registry and capture tick
//! - **Config**: TOML configuration loaded once at startup
//! - **Simulation**: lossy links and moving bots for tests and the demo
//!
//! ## Security Model
//!
//! ```text
//! CLIENT                                   SERVER
//!   |                                         |
//!   |--- "I shot at X at time T" ------------>|
//!   |                                         | <- rewind the world to T
//!   |                                         | <- test the shot against it
//!   |<-- HitResult (hit / reason) ------------|
//! ```
//!
//! The client NEVER determines outcomes. It only tells us when it fired;
//! the rewind clamp decides how much of that we believe.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rewind_networking::{RewindConfig, RequestMeta, RayAttack};
//!
//! let config = RewindConfig::load("rewind.toml")?;
//! let (server, events) = config.build(clock)?;
//! let result = server.validate_ray(caller, RequestMeta::new("rifle").at(t).shot(id), shot);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod clock;
pub mod config;
pub mod protocol;
pub mod server;
pub mod simulation;

// Re-exports for convenience
pub use clock::{
    ClockError, ClockEstimator, ClockSample, ClockState, ClockSync, ClockSyncConfig, RoundTripLink, SharedClock,
    SmoothingPolicy, TimeAuthority, TokioClock,
};
pub use config::{ConfigError, RewindConfig};
pub use protocol::{
    AttackParams, AttackRequest, AttackShape, CapsuleAttack, ConeAttack, FanAttack, ProtocolError, RayAttack,
    RequestMeta, SphereAttack, TimeSyncRequest, TimeSyncResponse,
};
pub use server::{
    CaptureTick, CompensatorSettings, GhostRetrace, LagCompensator, Role, TelemetrySink, WeaponProfile,
};
pub use simulation::{BotArena, NetworkConditions, SimulatedLink, SimulatedScene};
