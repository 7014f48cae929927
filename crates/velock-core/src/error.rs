use thiserror::Error;

#[derive(Debug, Error)]
pub enum VeError {
    // ── Invariant violations (abort the state transition) ───────────────────
    #[error("invalid regulated unix time: {0} is not aligned to a period boundary")]
    MisalignedTimestamp(u64),

    #[error("too large unix time: {0} cannot be advanced by one period")]
    TimestampOverflow(u64),

    #[error("unix time {0} has no previous period boundary")]
    TimestampUnderflow(u64),

    #[error("lock end {end} exceeds maximum lock time from {now}")]
    LockEndTooFar { end: u64, now: u64 },

    #[error("locked amount must not be negative, got {0}")]
    NegativeLockedAmount(i128),

    #[error("block time moved backwards: last checkpoint at {last}, now {now}")]
    TimeWentBackwards { last: u64, now: u64 },

    #[error("invalid attached count for lock {0}")]
    InvalidAttachedCount(u64),

    #[error("total locked amount would become negative")]
    NegativeTotalLocked,

    // ── Query errors ─────────────────────────────────────────────────────────
    #[error("exactly one of at_time or at_block must be given")]
    AmbiguousTarget,

    #[error("block {requested} is beyond current block {current}")]
    BlockInFuture { requested: i64, current: i64 },

    // ── Lock lifecycle errors ────────────────────────────────────────────────
    #[error("invalid lock denom: got {got}, expected {expected}")]
    InvalidLockDenom { got: String, expected: String },

    #[error("invalid lock id: {0}")]
    InvalidLockId(String),

    #[error("no available lock id")]
    LockIdsExhausted,

    #[error("cannot lock until time in the past (unlock at {unlock_time})")]
    PastLockTime { unlock_time: u64 },

    #[error("too long lock time (unlock at {unlock_time})")]
    TooLongLockTime { unlock_time: u64 },

    #[error("lock time can only be increased: unlock at {unlock_time}, existing {existing}")]
    NotIncreasedLockTime { unlock_time: u64, existing: u64 },

    #[error("lock didn't expire (unlocks at {end})")]
    LockNotExpired { end: u64 },

    #[error("lock expired (unlocked at {end})")]
    LockExpired { end: u64 },

    #[error("amount must be positive")]
    AmountNotPositive,

    #[error("slash amount {amount} exceeds locked amount {locked}")]
    SlashExceedsLocked { amount: i128, locked: i128 },

    #[error("from lock id and to lock id must be different")]
    SameLockId,

    #[error("lock {0} is attached to a gauge or has voted")]
    LockAttached(u64),

    // ── Configuration ────────────────────────────────────────────────────────
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("genesis already applied")]
    GenesisAlreadyApplied,

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl VeError {
    /// Programming errors: the host must abort the enclosing state
    /// transition rather than report a failed transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VeError::MisalignedTimestamp(_)
                | VeError::TimestampOverflow(_)
                | VeError::TimestampUnderflow(_)
                | VeError::LockEndTooFar { .. }
                | VeError::NegativeLockedAmount(_)
                | VeError::TimeWentBackwards { .. }
                | VeError::InvalidAttachedCount(_)
                | VeError::NegativeTotalLocked
                | VeError::Serialization(_)
                | VeError::Storage(_)
        )
    }
}
