use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{EMPTY_LOCK_ID, MAX_LOCK_ID};
use crate::error::VeError;

/// Token amount in base units. Signed so that curve deltas can be expressed
/// directly; stored balances and points are never negative.
pub type Amount = i128;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = u64;

/// Chain block height.
pub type BlockHeight = i64;

/// Index into a checkpoint log (global or per-lock).
pub type Epoch = u64;

// ── LockId ───────────────────────────────────────────────────────────────────

/// Identifier of one vote-escrow lock. Ownership lives in an external
/// registry; the ledger only keys state by it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockId(pub u64);

impl LockId {
    const PREFIX: &'static str = "ve-";

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == EMPTY_LOCK_ID
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl fmt::Debug for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockId({})", self.0)
    }
}

impl FromStr for LockId {
    type Err = VeError;

    /// Parses the `ve-<n>` form used by the NFT registry.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| VeError::InvalidLockId(s.to_string()))?;
        let id: u64 = digits
            .parse()
            .map_err(|_| VeError::InvalidLockId(s.to_string()))?;
        if id == EMPTY_LOCK_ID || id > MAX_LOCK_ID {
            return Err(VeError::InvalidLockId(s.to_string()));
        }
        Ok(Self(id))
    }
}

// ── Point ────────────────────────────────────────────────────────────────────

/// One checkpoint of a decaying voting-power line.
///
/// `bias` is the power at `timestamp`; `slope` is the power lost per second
/// from then on. Between checkpoints the power at `t` is
/// `max(0, bias - slope * (t - timestamp))`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub bias: Amount,
    pub slope: Amount,
    pub timestamp: Timestamp,
    pub block: BlockHeight,
}

impl Point {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Power at `at`, decayed linearly along this point's slope and floored
    /// at zero. `at` before the point's own timestamp reads as the bias.
    pub fn decayed_to(&self, at: Timestamp) -> Amount {
        let dt = at.saturating_sub(self.timestamp);
        self.bias.saturating_sub(self.slope.saturating_mul(Amount::from(dt))).max(0)
    }
}

// ── LockedBalance ────────────────────────────────────────────────────────────

/// Principal of one lock and its unlock time.
///
/// `end == 0` means no unlock schedule: never locked, or already cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedBalance {
    pub amount: Amount,
    pub end: Timestamp,
}

impl LockedBalance {
    pub fn new(amount: Amount, end: Timestamp) -> Self {
        Self { amount, end }
    }

    /// The empty balance every lock starts from.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0 && self.end == 0
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.end <= now
    }
}

// ── Target ───────────────────────────────────────────────────────────────────

/// Where a historical power query is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Time(Timestamp),
    Block(BlockHeight),
}

impl Target {
    /// Builds a target from the optional-field form used by query requests,
    /// where a zero value means "not given".
    pub fn from_parts(at_time: Option<Timestamp>, at_block: Option<BlockHeight>) -> Result<Self, VeError> {
        match (at_time.filter(|t| *t > 0), at_block.filter(|b| *b > 0)) {
            (Some(t), None) => Ok(Target::Time(t)),
            (None, Some(b)) => Ok(Target::Block(b)),
            _ => Err(VeError::AmbiguousTarget),
        }
    }
}

// ── BlockContext ─────────────────────────────────────────────────────────────

/// Time and height of the block whose state transition is being applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub time: Timestamp,
    pub height: BlockHeight,
}

impl BlockContext {
    pub fn new(time: Timestamp, height: BlockHeight) -> Self {
        Self { time, height }
    }
}
