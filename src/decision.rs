//! Decision engine
//!
//! Pure scheduling predicate: observe when the current time is within one
//! exposure-length window of the remote capture's scheduled end-time. The
//! distance is direction-agnostic on purpose: a late start is accepted
//! symmetrically with an early one.

use chrono::{Local, NaiveDateTime};

/// Decide against the current local time. See [`decide_at`].
pub fn decide(scheduled_end: NaiveDateTime, can_observe: bool, exposure_seconds: i64) -> bool {
    decide_at(
        Local::now().naive_local(),
        scheduled_end,
        can_observe,
        exposure_seconds,
    )
}

/// Decide whether the local node should observe at `now`.
///
/// True iff `can_observe` and `|now − scheduled_end|` is within
/// `max(1, exposure_seconds / 60)` minutes. No side effects.
pub fn decide_at(
    now: NaiveDateTime,
    scheduled_end: NaiveDateTime,
    can_observe: bool,
    exposure_seconds: i64,
) -> bool {
    let distance_minutes = (now - scheduled_end).num_seconds().abs() as f64 / 60.0;
    let exposure_minutes = (exposure_seconds / 60).max(1);
    can_observe && distance_minutes <= exposure_minutes as f64
}
