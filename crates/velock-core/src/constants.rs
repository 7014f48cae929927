/// ─── Velock Ledger Constants ────────────────────────────────────────────────
///
/// Voting power decays linearly from lock creation to unlock. Unlock times
/// are aligned to weekly boundaries so that every scheduled slope change
/// lands on a period boundary.

// ── Calendar ─────────────────────────────────────────────────────────────────

pub const SECONDS_PER_MINUTE: u64 = 60;
pub const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;
pub const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;

/// Days in four calendar years, one of them a leap year.
pub const DAYS_PER_4_YEARS: u64 = 365 * 4 + 1;

// ── Periods ──────────────────────────────────────────────────────────────────

/// Alignment granularity for unlock times and checkpoint catch-up.
pub const PERIOD: u64 = SECONDS_PER_WEEK;

/// Whole periods in the longest allowed lock: 1461 / 7 + 1 = 209.
pub const MAX_LOCK_PERIODS: u64 = DAYS_PER_4_YEARS / 7 + 1;

/// Longest allowed lock, in seconds (209 weeks = 126,403,200 s).
/// Period-aligned, so `align(now + MAX_LOCK_TIME) <= now + MAX_LOCK_TIME`.
pub const MAX_LOCK_TIME: u64 = PERIOD * MAX_LOCK_PERIODS;

/// Largest representable unix time (seconds).
pub const MAX_UNIX_TIME: u64 = i64::MAX as u64;

// ── Identifiers ──────────────────────────────────────────────────────────────

/// Reserved "no lock" identifier.
pub const EMPTY_LOCK_ID: u64 = 0;

/// First identifier handed out by the lock registry.
pub const FIRST_LOCK_ID: u64 = 1;

/// Last usable identifier; the registry is exhausted past this.
pub const MAX_LOCK_ID: u64 = u64::MAX - 1;

// ── Epochs ───────────────────────────────────────────────────────────────────

/// Epoch of an empty checkpoint log. Epoch 0 always reads as the zero point.
pub const EMPTY_EPOCH: u64 = 0;

/// Epoch of the first appended checkpoint.
pub const FIRST_EPOCH: u64 = 1;

// ── Parameters ───────────────────────────────────────────────────────────────

/// Default denomination accepted for locking.
pub const DEFAULT_LOCK_DENOM: &str = "alion";
