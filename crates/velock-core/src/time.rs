//! Period alignment for unlock times and checkpoint catch-up.
//!
//! Every unlock time is a multiple of `PERIOD`, so scheduled slope changes
//! only ever fire on a boundary and the global curve can be advanced one
//! boundary at a time.

use crate::constants::{MAX_UNIX_TIME, PERIOD};
use crate::error::VeError;
use crate::types::Timestamp;

/// Rounds `t` down to the nearest period boundary.
pub fn align(t: Timestamp) -> Timestamp {
    t / PERIOD * PERIOD
}

pub fn is_aligned(t: Timestamp) -> bool {
    align(t) == t
}

/// Zero is aligned, so an empty `LockedBalance::end` always passes.
pub fn check_aligned(t: Timestamp) -> Result<(), VeError> {
    if is_aligned(t) {
        Ok(())
    } else {
        Err(VeError::MisalignedTimestamp(t))
    }
}

/// The boundary one period after the aligned `t`.
pub fn next(t: Timestamp) -> Result<Timestamp, VeError> {
    check_aligned(t)?;
    if t > MAX_UNIX_TIME - PERIOD {
        return Err(VeError::TimestampOverflow(t));
    }
    Ok(t + PERIOD)
}

/// The boundary one period before the aligned `t`.
pub fn prev(t: Timestamp) -> Result<Timestamp, VeError> {
    check_aligned(t)?;
    if t < PERIOD {
        return Err(VeError::TimestampUnderflow(t));
    }
    Ok(t - PERIOD)
}

/// Unlock time for a lock of `seconds` starting at `now`, rounded down to a
/// boundary. May land at or before `now` for short durations.
pub fn align_from_now(now: Timestamp, seconds: u64) -> Result<Timestamp, VeError> {
    let t = now
        .checked_add(seconds)
        .filter(|t| *t <= MAX_UNIX_TIME)
        .ok_or(VeError::TimestampOverflow(now))?;
    Ok(align(t))
}
