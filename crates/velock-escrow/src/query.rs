use chrono::{DateTime, Utc};
use serde::Serialize;

use velock_core::constants::SECONDS_PER_DAY;
use velock_core::error::VeError;
use velock_core::time;
use velock_core::types::{Amount, BlockContext, LockId, LockedBalance, Target, Timestamp};
use velock_state::{CheckpointStore, KvRead, VotingPowerLedger};

/// Voting power of a lock at one point of its decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecayStep {
    pub timestamp: Timestamp,
    pub power: Amount,
}

/// Read-only helpers over committed lock state.
pub struct LockQuery<'a, S> {
    kv: &'a S,
    ctx: BlockContext,
}

impl<'a, S: KvRead> LockQuery<'a, S> {
    pub fn new(kv: &'a S, ctx: BlockContext) -> Self {
        Self { kv, ctx }
    }

    fn ledger(&self) -> VotingPowerLedger<&'a S> {
        VotingPowerLedger::new(self.kv, self.ctx)
    }

    pub fn locked_balance(&self, id: LockId) -> Result<LockedBalance, VeError> {
        self.ledger().locked_balance(id)
    }

    fn existing(&self, id: LockId) -> Result<LockedBalance, VeError> {
        let locked = self.locked_balance(id)?;
        if locked.is_empty() {
            return Err(VeError::InvalidLockId(id.to_string()));
        }
        Ok(locked)
    }

    /// Returns true once the lock can be withdrawn (end <= now).
    pub fn is_expired(&self, id: LockId) -> Result<bool, VeError> {
        Ok(self.existing(id)?.is_expired(self.ctx.time))
    }

    pub fn voting_power(&self, id: LockId, target: Target) -> Result<Amount, VeError> {
        self.ledger().power_at(id, target)
    }

    pub fn total_voting_power(&self, target: Target) -> Result<Amount, VeError> {
        self.ledger().total_power_at(target)
    }

    /// Human-readable summary of a lock's state.
    pub fn describe(&self, id: LockId) -> Result<String, VeError> {
        let locked = self.existing(id)?;
        let now = self.ctx.time;
        let unlock_at = DateTime::<Utc>::from_timestamp(locked.end as i64, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| format!("unix {}", locked.end));

        let status = if locked.is_expired(now) {
            format!("expired at {}, ready to withdraw", unlock_at)
        } else {
            let days = (locked.end - now) / SECONDS_PER_DAY;
            let power = self.voting_power(id, Target::Time(now))?;
            format!("unlocks {} (in {} days) | voting power {}", unlock_at, days, power)
        };

        Ok(format!("Lock {} | {} locked | {}", id, locked.amount, status))
    }

    /// Voting power of a live lock now and at every period boundary up to
    /// and including its end, where it reaches zero. Empty once expired.
    pub fn decay_schedule(&self, id: LockId) -> Result<Vec<DecayStep>, VeError> {
        let locked = self.existing(id)?;
        let now = self.ctx.time;
        if locked.is_expired(now) {
            return Ok(Vec::new());
        }

        let ledger = self.ledger();
        let mut steps = Vec::new();
        let mut t = now;
        loop {
            steps.push(DecayStep {
                timestamp: t,
                power: ledger.power_at(id, Target::Time(t))?,
            });
            if t >= locked.end {
                return Ok(steps);
            }
            t = time::next(time::align(t))?;
        }
    }

    /// Nonzero scheduled slope changes at boundaries `>= from`.
    pub fn pending_slope_changes(&self, from: Timestamp) -> Result<Vec<(Timestamp, Amount)>, VeError> {
        let changes = CheckpointStore::new(self.kv).slope_changes_from(from)?;
        Ok(changes.into_iter().filter(|(_, change)| *change != 0).collect())
    }
}
