use serde::de::DeserializeOwned;
use serde::Serialize;

use velock_core::constants::EMPTY_EPOCH;
use velock_core::error::VeError;
use velock_core::types::{Amount, Epoch, LockId, LockedBalance, Point, Timestamp};

use crate::keys;
use crate::kv::{KvRead, KvStore};

/// bincode encoding shared by every typed value in the ledger tree.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, VeError> {
    bincode::serialize(value).map_err(|e| VeError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, VeError> {
    bincode::deserialize(bytes).map_err(|e| VeError::Serialization(e.to_string()))
}

/// Counters are stored as raw big-endian `u64`.
pub fn decode_u64(bytes: &[u8]) -> Result<u64, VeError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| VeError::Serialization(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

/// Typed access to the checkpoint logs, the slope-change schedule and the
/// locked balances.
///
/// Missing entries read as their zero value: epoch 0, the zero point, no
/// slope change, the empty balance.
pub struct CheckpointStore<S> {
    kv: S,
}

impl<S> CheckpointStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    pub fn into_inner(self) -> S {
        self.kv
    }
}

impl<S: KvRead> CheckpointStore<S> {
    fn get_u64(&self, key: &[u8]) -> Result<u64, VeError> {
        match self.kv.get(key)? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    fn get_point(&self, key: &[u8]) -> Result<Point, VeError> {
        match self.kv.get(key)? {
            Some(bytes) => decode(&bytes),
            None => Ok(Point::zero()),
        }
    }

    // ── Global log ───────────────────────────────────────────────────────────

    pub fn epoch(&self) -> Result<Epoch, VeError> {
        self.get_u64(&keys::epoch())
    }

    pub fn point(&self, epoch: Epoch) -> Result<Point, VeError> {
        if epoch == EMPTY_EPOCH {
            return Ok(Point::zero());
        }
        self.get_point(&keys::point(epoch))
    }

    pub fn slope_change(&self, timestamp: Timestamp) -> Result<Amount, VeError> {
        match self.kv.get(&keys::slope_change(timestamp))? {
            Some(bytes) => decode(&bytes),
            None => Ok(0),
        }
    }

    /// Scheduled slope changes at boundaries `>= from`, in time order.
    pub fn slope_changes_from(&self, from: Timestamp) -> Result<Vec<(Timestamp, Amount)>, VeError> {
        self.slope_changes(keys::slope_change(from), keys::slope_change_end())
    }

    /// Scheduled slope changes at boundaries in `(after, until]`.
    pub fn slope_changes_between(
        &self,
        after: Timestamp,
        until: Timestamp,
    ) -> Result<Vec<(Timestamp, Amount)>, VeError> {
        let Some(start) = after.checked_add(1) else {
            return Ok(Vec::new());
        };
        let end = match until.checked_add(1) {
            Some(ts) => keys::slope_change(ts),
            None => keys::slope_change_end(),
        };
        self.slope_changes(keys::slope_change(start), end)
    }

    fn slope_changes(&self, start: Vec<u8>, end: Vec<u8>) -> Result<Vec<(Timestamp, Amount)>, VeError> {
        let mut out = Vec::new();
        for (key, value) in self.kv.scan_range(&start, &end)? {
            let ts = keys::u64_at(&key, 1)
                .ok_or_else(|| VeError::Serialization("malformed slope change key".into()))?;
            out.push((ts, decode(&value)?));
        }
        Ok(out)
    }

    // ── Per-lock log ─────────────────────────────────────────────────────────

    pub fn user_epoch(&self, id: LockId) -> Result<Epoch, VeError> {
        self.get_u64(&keys::user_epoch(id))
    }

    pub fn user_point(&self, id: LockId, epoch: Epoch) -> Result<Point, VeError> {
        if epoch == EMPTY_EPOCH {
            return Ok(Point::zero());
        }
        self.get_point(&keys::user_point(id, epoch))
    }

    // ── Locked balances ──────────────────────────────────────────────────────

    pub fn locked_balance(&self, id: LockId) -> Result<LockedBalance, VeError> {
        match self.kv.get(&keys::locked_by_lock(id))? {
            Some(bytes) => decode(&bytes),
            None => Ok(LockedBalance::empty()),
        }
    }

    /// Every stored locked balance, ordered by lock id.
    pub fn locked_balances(&self) -> Result<Vec<(LockId, LockedBalance)>, VeError> {
        let mut out = Vec::new();
        for (key, value) in self.kv.scan_prefix(&[keys::PREFIX_LOCKED_BY_LOCK])? {
            let id = keys::u64_at(&key, 1)
                .ok_or_else(|| VeError::Serialization("malformed locked balance key".into()))?;
            out.push((LockId(id), decode(&value)?));
        }
        Ok(out)
    }
}

impl<S: KvStore> CheckpointStore<S> {
    pub fn set_epoch(&mut self, epoch: Epoch) -> Result<(), VeError> {
        self.kv.set(&keys::epoch(), epoch.to_be_bytes().to_vec())
    }

    pub fn set_point(&mut self, epoch: Epoch, point: &Point) -> Result<(), VeError> {
        self.kv.set(&keys::point(epoch), encode(point)?)
    }

    pub fn set_slope_change(&mut self, timestamp: Timestamp, change: Amount) -> Result<(), VeError> {
        self.kv.set(&keys::slope_change(timestamp), encode(&change)?)
    }

    pub fn set_user_epoch(&mut self, id: LockId, epoch: Epoch) -> Result<(), VeError> {
        self.kv.set(&keys::user_epoch(id), epoch.to_be_bytes().to_vec())
    }

    pub fn set_user_point(&mut self, id: LockId, epoch: Epoch, point: &Point) -> Result<(), VeError> {
        self.kv.set(&keys::user_point(id, epoch), encode(point)?)
    }

    pub fn set_locked_balance(&mut self, id: LockId, locked: &LockedBalance) -> Result<(), VeError> {
        self.kv.set(&keys::locked_by_lock(id), encode(locked)?)
    }

    pub fn delete_locked_balance(&mut self, id: LockId) -> Result<(), VeError> {
        self.kv.delete(&keys::locked_by_lock(id))
    }
}
