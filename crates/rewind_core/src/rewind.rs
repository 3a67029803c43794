//! # Rewinder
//!
//! Reconstructs an entity's pose at an arbitrary past instant from its
//! history.
//!
//! ```text
//!   history:   a(t=9.80) ─────────── b(t=9.85)
//!                          ▲
//!                    target 9.82  → alpha = 0.4
//! ```
//!
//! Requests outside the stored range clamp to the nearest end; the rewinder
//! never extrapolates.

use rewind_shared::{PartTransform, PoseSnapshot};

use crate::history::PoseHistory;

/// Pose of `history` at `target_time`.
///
/// `None` only when the history is empty or `target_time` is NaN.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn sample(history: &PoseHistory, target_time: f64) -> Option<PoseSnapshot> {
    let oldest = history.first()?;
    let newest = history.last()?;

    if target_time.is_nan() {
        return None;
    }
    if target_time <= oldest.timestamp {
        return Some(oldest.clone());
    }
    if target_time >= newest.timestamp {
        return Some(newest.clone());
    }

    // oldest < target < newest, so a bracketing pair exists.
    let upper = (1..history.len()).find(|&i| history.get(i).is_some_and(|s| s.timestamp >= target_time))?;
    let b = history.get(upper)?;
    let a = history.get(upper - 1)?;

    if b.timestamp == target_time {
        return Some(b.clone());
    }

    Some(blend(a, b, target_time))
}

/// Interpolates `a` toward `b` and stamps the result `target_time`.
///
/// Parts present in only one of the two poses are carried through unchanged.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn blend(a: &PoseSnapshot, b: &PoseSnapshot, target_time: f64) -> PoseSnapshot {
    let span = b.timestamp - a.timestamp;
    let alpha = if span > 0.0 {
        ((target_time - a.timestamp) / span).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };

    let mut out = PoseSnapshot::new(target_time);
    for (name, from) in &a.parts {
        let part = match b.parts.get(name) {
            Some(to) => PartTransform::new(
                from.transform.interpolate(&to.transform, alpha),
                from.size.lerp(to.size, alpha),
            ),
            None => *from,
        };
        out.parts.insert(name.clone(), part);
    }
    for (name, to) in &b.parts {
        if !a.parts.contains_key(name) {
            out.parts.insert(name.clone(), *to);
        }
    }
    out
}
