//! # Wire Protocol
//!
//! Packets and request types exchanged with remote callers.
//!
//! - [`time_sync`]: fixed-size clock reconciliation packets
//! - [`attack`]: attack claims, typed and as a parameter bag
//!
//! Results travel back as [`rewind_shared::HitResult`].

pub mod attack;
pub mod time_sync;

use thiserror::Error;

pub use attack::{
    AttackParams, AttackRequest, AttackShape, CapsuleAttack, ConeAttack, FanAttack, RayAttack, RequestMeta,
    SphereAttack,
};
pub use time_sync::{TimeSyncRequest, TimeSyncResponse};

/// Malformed input from a remote caller.
///
/// Never fatal; an attack with one of these becomes `invalid_params`.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet has the wrong size.
    #[error("expected {expected} bytes, got {actual}")]
    BadLength {
        /// Required size.
        expected: usize,
        /// Received size.
        actual: usize,
    },

    /// A field is NaN or infinite.
    #[error("field `{0}` is not finite")]
    NonFinite(&'static str),

    /// A size field is negative.
    #[error("field `{0}` is negative")]
    Negative(&'static str),

    /// A field the mode needs is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// The weapon id names no profile.
    #[error("unknown weapon `{0}`")]
    UnknownWeapon(String),
}
