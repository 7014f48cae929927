use tracing::{debug, info};

use velock_core::constants::{EMPTY_LOCK_ID, MAX_LOCK_ID, MAX_LOCK_TIME};
use velock_core::error::VeError;
use velock_core::params::Params;
use velock_core::time;
use velock_core::types::{Amount, BlockContext, LockId, LockedBalance, Point, Timestamp};
use velock_state::{KvRead, KvStore, VotingPowerLedger};

use crate::store::EscrowStore;

/// Lock lifecycle on top of the voting-power ledger.
///
/// Every event that changes a lock's amount or end goes through
/// `VotingPowerLedger::regulate_lock`, so the curves always agree with the
/// stored balances. Token custody and lock ownership are the host's job;
/// the manager only records what was locked and until when.
pub struct LockManager<S> {
    kv: S,
    ctx: BlockContext,
}

impl<S> LockManager<S> {
    pub fn new(kv: S, ctx: BlockContext) -> Self {
        Self { kv, ctx }
    }

    pub fn ctx(&self) -> BlockContext {
        self.ctx
    }

    pub fn into_inner(self) -> S {
        self.kv
    }
}

impl<S: KvRead> LockManager<S> {
    fn escrow(&self) -> EscrowStore<&S> {
        EscrowStore::new(&self.kv)
    }

    pub fn params(&self) -> Result<Params, VeError> {
        self.escrow().params()
    }

    pub fn total_locked(&self) -> Result<Amount, VeError> {
        self.escrow().total_locked()
    }

    pub fn next_lock_id(&self) -> Result<u64, VeError> {
        self.escrow().next_lock_id()
    }

    pub fn locked_balance(&self, id: LockId) -> Result<LockedBalance, VeError> {
        VotingPowerLedger::new(&self.kv, self.ctx).locked_balance(id)
    }

    pub fn attached(&self, id: LockId) -> Result<u64, VeError> {
        self.escrow().attached(id)
    }

    pub fn voted(&self, id: LockId) -> Result<bool, VeError> {
        self.escrow().voted(id)
    }

    /// Fails with `LockAttached` while the lock is attached to a gauge or
    /// has an active vote.
    pub fn check_attached(&self, id: LockId) -> Result<(), VeError> {
        if self.attached(id)? != 0 || self.voted(id)? {
            return Err(VeError::LockAttached(id.as_u64()));
        }
        Ok(())
    }

    fn check_denom(&self, denom: &str) -> Result<(), VeError> {
        let expected = self.params()?.lock_denom;
        if denom != expected {
            return Err(VeError::InvalidLockDenom {
                got: denom.to_string(),
                expected,
            });
        }
        Ok(())
    }

    /// Unlock time for a lock of `lock_duration` seconds from now, bounded
    /// to `(now, now + MAX_LOCK_TIME]`.
    fn unlock_time(&self, lock_duration: u64) -> Result<Timestamp, VeError> {
        let now = self.ctx.time;
        let unlock_time = time::align_from_now(now, lock_duration)?;
        if unlock_time <= now {
            return Err(VeError::PastLockTime { unlock_time });
        }
        if unlock_time - now > MAX_LOCK_TIME {
            return Err(VeError::TooLongLockTime { unlock_time });
        }
        Ok(unlock_time)
    }

    /// Balance of a lock that may still be added to.
    fn live_lock(&self, id: LockId) -> Result<LockedBalance, VeError> {
        let locked = self.locked_balance(id)?;
        if locked.amount <= 0 {
            return Err(VeError::AmountNotPositive);
        }
        if locked.is_expired(self.ctx.time) {
            return Err(VeError::LockExpired { end: locked.end });
        }
        Ok(locked)
    }
}

impl<S: KvStore> LockManager<S> {
    fn ledger(&mut self) -> VotingPowerLedger<&mut S> {
        VotingPowerLedger::new(&mut self.kv, self.ctx)
    }

    fn escrow_mut(&mut self) -> EscrowStore<&mut S> {
        EscrowStore::new(&mut self.kv)
    }

    fn add_total_locked(&mut self, delta: Amount) -> Result<Amount, VeError> {
        let total = self.total_locked()? + delta;
        self.escrow_mut().set_total_locked(total)?;
        Ok(total)
    }

    fn issue_lock_id(&mut self) -> Result<LockId, VeError> {
        let next = self.next_lock_id()?;
        if next == EMPTY_LOCK_ID || next > MAX_LOCK_ID {
            return Err(VeError::LockIdsExhausted);
        }
        self.escrow_mut().set_next_lock_id(next + 1)?;
        Ok(LockId(next))
    }

    /// Move `id` from `locked` to `locked + amount`, optionally with a new
    /// end, and regulate its curve. Total locked is left to the caller.
    fn deposit_for(
        &mut self,
        id: LockId,
        amount: Amount,
        unlock_time: Option<Timestamp>,
        locked: LockedBalance,
    ) -> Result<LockedBalance, VeError> {
        let new = LockedBalance {
            amount: locked.amount + amount,
            end: unlock_time.unwrap_or(locked.end),
        };
        let mut ledger = self.ledger();
        ledger.set_locked_balance(id, &new)?;
        ledger.regulate_lock(id, locked, new)?;
        Ok(new)
    }

    /// Lock `amount` of `denom` for `lock_duration` seconds under a fresh id.
    pub fn create(
        &mut self,
        denom: &str,
        amount: Amount,
        lock_duration: u64,
    ) -> Result<(LockId, Timestamp), VeError> {
        self.check_denom(denom)?;
        if amount <= 0 {
            return Err(VeError::AmountNotPositive);
        }
        let unlock_time = self.unlock_time(lock_duration)?;

        let id = self.issue_lock_id()?;
        self.add_total_locked(amount)?;
        self.deposit_for(id, amount, Some(unlock_time), LockedBalance::empty())?;

        info!(lock_id = %id, amount = %amount, unlock_time, "lock created");
        Ok((id, unlock_time))
    }

    /// Re-create an exported balance under a fresh id, keeping its end.
    /// Expired balances are restored too so they stay withdrawable.
    pub fn restore(&mut self, locked: LockedBalance) -> Result<LockId, VeError> {
        if locked.amount <= 0 {
            return Err(VeError::AmountNotPositive);
        }
        time::check_aligned(locked.end)?;

        let id = self.issue_lock_id()?;
        self.add_total_locked(locked.amount)?;
        self.deposit_for(id, locked.amount, Some(locked.end), LockedBalance::empty())?;

        debug!(lock_id = %id, amount = %locked.amount, end = locked.end, "lock restored");
        Ok(id)
    }

    /// Add `amount` to a live lock without touching its end.
    pub fn deposit(&mut self, id: LockId, denom: &str, amount: Amount) -> Result<LockedBalance, VeError> {
        self.check_denom(denom)?;
        if amount <= 0 {
            return Err(VeError::AmountNotPositive);
        }
        let locked = self.live_lock(id)?;

        self.add_total_locked(amount)?;
        let new = self.deposit_for(id, amount, None, locked)?;

        info!(lock_id = %id, amount = %amount, locked = %new.amount, "lock deposited");
        Ok(new)
    }

    /// Push a live lock's end out to `lock_duration` seconds from now.
    pub fn extend_time(&mut self, id: LockId, lock_duration: u64) -> Result<Timestamp, VeError> {
        let locked = self.live_lock(id)?;
        let unlock_time = time::align_from_now(self.ctx.time, lock_duration)?;
        if unlock_time <= locked.end {
            return Err(VeError::NotIncreasedLockTime {
                unlock_time,
                existing: locked.end,
            });
        }
        let unlock_time = self.unlock_time(lock_duration)?;

        self.deposit_for(id, 0, Some(unlock_time), locked)?;

        info!(lock_id = %id, unlock_time, "lock time extended");
        Ok(unlock_time)
    }

    /// Fold `from` into `to`. The merged lock keeps the later end and `from`
    /// is cleared. Expiry of either lock is not checked.
    pub fn merge(&mut self, from: LockId, to: LockId) -> Result<LockedBalance, VeError> {
        if from == to {
            return Err(VeError::SameLockId);
        }
        self.check_attached(from)?;

        let locked_from = self.locked_balance(from)?;
        let locked_to = self.locked_balance(to)?;
        if locked_from.is_empty() {
            return Err(VeError::InvalidLockId(from.to_string()));
        }
        if locked_to.is_empty() {
            return Err(VeError::InvalidLockId(to.to_string()));
        }
        let end = locked_from.end.max(locked_to.end);

        let mut ledger = self.ledger();
        ledger.delete_locked_balance(from)?;
        ledger.regulate_lock(from, locked_from, LockedBalance::empty())?;

        // Tokens only change hands between locks: total locked is unchanged.
        let merged = self.deposit_for(to, locked_from.amount, Some(end), locked_to)?;

        info!(from = %from, to = %to, locked = %merged.amount, end, "locks merged");
        Ok(merged)
    }

    /// Clear an expired lock and return the amount to release.
    pub fn withdraw(&mut self, id: LockId) -> Result<Amount, VeError> {
        self.check_attached(id)?;

        let locked = self.locked_balance(id)?;
        if locked.is_empty() {
            return Err(VeError::InvalidLockId(id.to_string()));
        }
        if !locked.is_expired(self.ctx.time) {
            return Err(VeError::LockNotExpired { end: locked.end });
        }

        self.add_total_locked(-locked.amount)?;
        let mut ledger = self.ledger();
        ledger.delete_locked_balance(id)?;
        ledger.regulate_lock(id, locked, LockedBalance::empty())?;

        info!(lock_id = %id, amount = %locked.amount, "lock withdrawn");
        Ok(locked.amount)
    }

    /// Burn `amount` out of a lock, keeping its end.
    pub fn slash(&mut self, id: LockId, amount: Amount) -> Result<LockedBalance, VeError> {
        if amount <= 0 {
            return Err(VeError::AmountNotPositive);
        }
        let locked = self.locked_balance(id)?;
        if amount > locked.amount {
            return Err(VeError::SlashExceedsLocked {
                amount,
                locked: locked.amount,
            });
        }

        self.add_total_locked(-amount)?;
        let new = self.deposit_for(id, -amount, None, locked)?;

        info!(lock_id = %id, amount = %amount, locked = %new.amount, "lock slashed");
        Ok(new)
    }

    // ── Gauge bookkeeping ────────────────────────────────────────────────────

    pub fn attach(&mut self, id: LockId) -> Result<u64, VeError> {
        let attached = self.attached(id)? + 1;
        self.escrow_mut().set_attached(id, attached)?;
        debug!(lock_id = %id, attached, "lock attached");
        Ok(attached)
    }

    /// Detaching a lock that is not attached is an invariant violation.
    pub fn detach(&mut self, id: LockId) -> Result<u64, VeError> {
        let attached = self
            .attached(id)?
            .checked_sub(1)
            .ok_or(VeError::InvalidAttachedCount(id.as_u64()))?;
        self.escrow_mut().set_attached(id, attached)?;
        debug!(lock_id = %id, attached, "lock detached");
        Ok(attached)
    }

    pub fn set_voted(&mut self, id: LockId, voted: bool) -> Result<(), VeError> {
        self.escrow_mut().set_voted(id, voted)?;
        debug!(lock_id = %id, voted, "lock vote flag set");
        Ok(())
    }

    /// End-of-block hook.
    pub fn tick(&mut self) -> Result<Option<Point>, VeError> {
        self.ledger().tick()
    }
}
