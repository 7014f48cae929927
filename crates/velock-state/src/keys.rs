//! Persisted key layout.
//!
//! Every key is a one-byte prefix followed by big-endian `u64` components,
//! so prefix scans walk entries in numeric order.
//!
//!   0x01                       total locked amount
//!   0x02 ‖ lock_id             locked balance of a lock
//!   0x03                       next lock id
//!   0x04                       global epoch
//!   0x05 ‖ epoch               global checkpoint
//!   0x06 ‖ lock_id             per-lock epoch
//!   0x07 ‖ lock_id ‖ epoch     per-lock checkpoint
//!   0x08 ‖ timestamp           scheduled slope change at a boundary
//!   0x09 ‖ lock_id             attached count
//!   0x0a ‖ lock_id             voted flag
//!   0x0b                       module params

use velock_core::types::{Epoch, LockId, Timestamp};

pub const PREFIX_TOTAL_LOCKED: u8 = 0x01;
pub const PREFIX_LOCKED_BY_LOCK: u8 = 0x02;
pub const PREFIX_NEXT_LOCK_ID: u8 = 0x03;
pub const PREFIX_EPOCH: u8 = 0x04;
pub const PREFIX_POINT: u8 = 0x05;
pub const PREFIX_USER_EPOCH: u8 = 0x06;
pub const PREFIX_USER_POINT: u8 = 0x07;
pub const PREFIX_SLOPE_CHANGE: u8 = 0x08;
pub const PREFIX_ATTACHED: u8 = 0x09;
pub const PREFIX_VOTED: u8 = 0x0a;
pub const PREFIX_PARAMS: u8 = 0x0b;

fn with_u64(prefix: u8, n: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(prefix);
    key.extend_from_slice(&n.to_be_bytes());
    key
}

/// Reads the big-endian `u64` that starts `offset` bytes into `key`.
pub fn u64_at(key: &[u8], offset: usize) -> Option<u64> {
    let bytes = key.get(offset..offset + 8)?;
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

pub fn total_locked() -> Vec<u8> {
    vec![PREFIX_TOTAL_LOCKED]
}

pub fn locked_by_lock(id: LockId) -> Vec<u8> {
    with_u64(PREFIX_LOCKED_BY_LOCK, id.0)
}

pub fn next_lock_id() -> Vec<u8> {
    vec![PREFIX_NEXT_LOCK_ID]
}

pub fn epoch() -> Vec<u8> {
    vec![PREFIX_EPOCH]
}

pub fn point(epoch: Epoch) -> Vec<u8> {
    with_u64(PREFIX_POINT, epoch)
}

pub fn user_epoch(id: LockId) -> Vec<u8> {
    with_u64(PREFIX_USER_EPOCH, id.0)
}

pub fn user_point(id: LockId, epoch: Epoch) -> Vec<u8> {
    let mut key = with_u64(PREFIX_USER_POINT, id.0);
    key.extend_from_slice(&epoch.to_be_bytes());
    key
}

pub fn slope_change(timestamp: Timestamp) -> Vec<u8> {
    with_u64(PREFIX_SLOPE_CHANGE, timestamp)
}

/// Exclusive upper bound of the slope-change key range.
pub fn slope_change_end() -> Vec<u8> {
    vec![PREFIX_SLOPE_CHANGE + 1]
}

pub fn attached(id: LockId) -> Vec<u8> {
    with_u64(PREFIX_ATTACHED, id.0)
}

pub fn voted(id: LockId) -> Vec<u8> {
    with_u64(PREFIX_VOTED, id.0)
}

pub fn params() -> Vec<u8> {
    vec![PREFIX_PARAMS]
}
