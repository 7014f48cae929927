use tracing::{debug, info, warn};

use velock_core::constants::{EMPTY_EPOCH, MAX_LOCK_TIME, PERIOD};
use velock_core::error::VeError;
use velock_core::time;
use velock_core::types::{
    Amount, BlockContext, BlockHeight, Epoch, LockId, LockedBalance, Point, Target, Timestamp,
};

use crate::kv::{KvRead, KvStore};
use crate::store::CheckpointStore;

/// Curve point of a single lock as of `now`: zero once the lock has expired
/// or holds nothing.
pub fn lock_point(locked: &LockedBalance, now: Timestamp) -> Point {
    if locked.end > now && locked.amount > 0 {
        let slope = locked.amount / Amount::from(MAX_LOCK_TIME);
        Point {
            bias: slope * Amount::from(locked.end - now),
            slope,
            timestamp: now,
            block: 0,
        }
    } else {
        Point { timestamp: now, ..Point::zero() }
    }
}

fn non_negative(what: &'static str, value: Amount) -> Amount {
    if value < 0 {
        warn!(what, value = %value, "clamping negative curve value to zero");
        0
    } else {
        value
    }
}

/// Greatest epoch in `[1, latest]` for which `pred` holds, or 0 if none.
/// `pred` must hold on a prefix of the log.
fn last_epoch_where<F>(latest: Epoch, mut pred: F) -> Result<Epoch, VeError>
where
    F: FnMut(Epoch) -> Result<bool, VeError>,
{
    let (mut lo, mut hi) = (EMPTY_EPOCH, latest);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if pred(mid)? {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}

/// Greatest epoch in `[0, latest]` whose key is `<= target`. Epoch 0 is the
/// zero point and is returned when nothing later qualifies.
fn search_epoch<K, F>(latest: Epoch, target: K, mut key_of: F) -> Result<Epoch, VeError>
where
    K: Ord,
    F: FnMut(Epoch) -> Result<K, VeError>,
{
    last_epoch_where(latest, |e| Ok(key_of(e)? <= target))
}

/// `bias` after decaying at `slope` for `dt` seconds, floored at zero.
fn decay(bias: Amount, slope: Amount, dt: u64) -> Amount {
    non_negative("bias", bias.saturating_sub(slope.saturating_mul(Amount::from(dt))))
}

// ── VotingPowerLedger ────────────────────────────────────────────────────────

/// The vote-escrow voting-power ledger.
///
/// Owns a `CheckpointStore` for the duration of one state transition (or one
/// read) and the context of the block being applied. Read operations work on
/// any `KvRead`; mutations need a `KvStore` and are expected to run against
/// a `StagedStore` that the caller commits only when every call succeeded.
pub struct VotingPowerLedger<S> {
    store: CheckpointStore<S>,
    ctx: BlockContext,
}

impl<S> VotingPowerLedger<S> {
    pub fn new(kv: S, ctx: BlockContext) -> Self {
        Self {
            store: CheckpointStore::new(kv),
            ctx,
        }
    }

    pub fn ctx(&self) -> BlockContext {
        self.ctx
    }

    pub fn store(&self) -> &CheckpointStore<S> {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store.into_inner()
    }
}

impl<S: KvRead> VotingPowerLedger<S> {
    pub fn locked_balance(&self, id: LockId) -> Result<LockedBalance, VeError> {
        self.store.locked_balance(id)
    }

    /// Latest global checkpoint, or `None` before the first one.
    pub fn last_checkpoint(&self) -> Result<Option<(Epoch, Point)>, VeError> {
        let epoch = self.store.epoch()?;
        if epoch == EMPTY_EPOCH {
            return Ok(None);
        }
        Ok(Some((epoch, self.store.point(epoch)?)))
    }

    /// Advance `point` to `until`, applying the scheduled slope change at
    /// every period boundary crossed. Returns the point at `until` and the
    /// points at each boundary strictly before it.
    fn walk_forward(&self, mut point: Point, until: Timestamp) -> Result<(Point, Vec<Point>), VeError> {
        let mut boundaries = Vec::new();
        let mut ti = time::align(point.timestamp);
        loop {
            ti = time::next(ti)?;
            let slope_change = if ti > until {
                ti = until;
                0
            } else {
                self.store.slope_change(ti)?
            };

            point.bias = decay(point.bias, point.slope, ti - point.timestamp);
            point.slope = non_negative("slope", point.slope + slope_change);
            point.timestamp = ti;

            if ti == until {
                return Ok((point, boundaries));
            }
            boundaries.push(point);
        }
    }

    /// Bias of `point` carried forward to `until` without writing anything.
    ///
    /// Matches `walk_forward`, visiting only boundaries that carry a
    /// scheduled slope change.
    fn project(&self, mut point: Point, until: Timestamp) -> Result<Amount, VeError> {
        for (ts, change) in self.store.slope_changes_between(point.timestamp, until)? {
            point.bias = decay(point.bias, point.slope, ts - point.timestamp);
            point.slope = non_negative("slope", point.slope + change);
            point.timestamp = ts;
        }
        Ok(decay(point.bias, point.slope, until - point.timestamp))
    }

    fn check_block(&self, at_block: BlockHeight) -> Result<(), VeError> {
        if at_block > self.ctx.height {
            return Err(VeError::BlockInFuture {
                requested: at_block,
                current: self.ctx.height,
            });
        }
        Ok(())
    }

    /// Timestamp of `at_block`, interpolated between `point` and the
    /// checkpoint after it, or the current block when there is none.
    fn interpolate(&self, point: &Point, next: Option<&Point>, at_block: BlockHeight) -> Timestamp {
        let (next_time, next_block) = match next {
            Some(next) => (next.timestamp, next.block),
            None => (self.ctx.time, self.ctx.height),
        };
        if next_block <= point.block || at_block <= point.block {
            return point.timestamp;
        }
        let span = i128::from(next_time.saturating_sub(point.timestamp));
        let dt = i128::from(at_block - point.block) * span / i128::from(next_block - point.block);
        point.timestamp + u64::try_from(dt).unwrap_or(0)
    }

    /// Global epoch and timestamp of block `at_block`.
    fn block_time(&self, at_block: BlockHeight) -> Result<(Epoch, Timestamp), VeError> {
        self.check_block(at_block)?;
        let latest = self.store.epoch()?;
        let mut epoch = search_epoch(latest, at_block, |e| Ok(self.store.point(e)?.block))?;
        if epoch == EMPTY_EPOCH {
            return Ok((EMPTY_EPOCH, 0));
        }
        if self.store.point(epoch)?.block == at_block {
            // Catch-up boundaries carry estimated heights and can repeat the
            // height of the checkpoint before them. The block itself sits at
            // the first checkpoint with its height.
            let first = last_epoch_where(latest, |e| Ok(self.store.point(e)?.block < at_block))? + 1;
            let first_time = self.store.point(first)?.timestamp;
            epoch = search_epoch(latest, (at_block, first_time), |e| {
                let p = self.store.point(e)?;
                Ok((p.block, p.timestamp))
            })?;
        }

        let point = self.store.point(epoch)?;
        let next = if epoch < latest {
            Some(self.store.point(epoch + 1)?)
        } else {
            None
        };
        Ok((epoch, self.interpolate(&point, next.as_ref(), at_block)))
    }

    /// Total voting power over all locks at `target`.
    pub fn total_power_at(&self, target: Target) -> Result<Amount, VeError> {
        let latest = self.store.epoch()?;
        let (epoch, at_time) = match target {
            Target::Time(t) => {
                let last = self.store.point(latest)?;
                let epoch = if t >= last.timestamp {
                    latest
                } else {
                    search_epoch(latest, t, |e| Ok(self.store.point(e)?.timestamp))?
                };
                (epoch, t)
            }
            Target::Block(b) => self.block_time(b)?,
        };
        if epoch == EMPTY_EPOCH {
            return Ok(0);
        }
        let point = self.store.point(epoch)?;
        if at_time < point.timestamp {
            return Ok(point.bias);
        }
        self.project(point, at_time)
    }

    /// Voting power of one lock at `target`. Locks without checkpoints have
    /// zero power.
    pub fn power_at(&self, id: LockId, target: Target) -> Result<Amount, VeError> {
        let latest = self.store.user_epoch(id)?;
        let (epoch, at_time) = match target {
            Target::Time(t) => {
                let epoch = search_epoch(latest, t, |e| Ok(self.store.user_point(id, e)?.timestamp))?;
                (epoch, t)
            }
            Target::Block(b) => {
                self.check_block(b)?;
                let epoch = search_epoch(latest, b, |e| Ok(self.store.user_point(id, e)?.block))?;
                if epoch == EMPTY_EPOCH {
                    return Ok(0);
                }
                let point = self.store.user_point(id, epoch)?;
                let next = if epoch < latest {
                    Some(self.store.user_point(id, epoch + 1)?)
                } else {
                    None
                };
                (epoch, self.interpolate(&point, next.as_ref(), b))
            }
        };
        if epoch == EMPTY_EPOCH {
            return Ok(0);
        }
        Ok(self.store.user_point(id, epoch)?.decayed_to(at_time))
    }
}

impl<S: KvStore> VotingPowerLedger<S> {
    pub fn set_locked_balance(&mut self, id: LockId, locked: &LockedBalance) -> Result<(), VeError> {
        self.store.set_locked_balance(id, locked)
    }

    pub fn delete_locked_balance(&mut self, id: LockId) -> Result<(), VeError> {
        self.store.delete_locked_balance(id)
    }

    /// Record a lock's move from `old` to `new` at the current block.
    ///
    /// The global curve takes the difference immediately, the unlock-time
    /// slope changes are rescheduled, and a new per-lock checkpoint is
    /// appended. This is the only write path into the curve stores.
    pub fn regulate_lock(
        &mut self,
        id: LockId,
        old: LockedBalance,
        new: LockedBalance,
    ) -> Result<Point, VeError> {
        time::check_aligned(old.end)?;
        time::check_aligned(new.end)?;
        for locked in [&old, &new] {
            if locked.amount < 0 {
                return Err(VeError::NegativeLockedAmount(locked.amount));
            }
        }
        let now = self.ctx.time;
        if new.end > now && new.end - now > MAX_LOCK_TIME {
            return Err(VeError::LockEndTooFar { end: new.end, now });
        }

        let point_old = lock_point(&old, now);
        let point_new = lock_point(&new, now);

        let mut change_old = self.store.slope_change(old.end)?;
        let mut change_new = self.store.slope_change(new.end)?;
        let user_epoch = self.store.user_epoch(id)? + 1;

        self.regulate_global(point_new.slope - point_old.slope, point_new.bias - point_old.bias)?;

        // A lock stops decaying at its end: its slope is scheduled to drop
        // out of the global curve at that boundary.
        if old.end > now {
            // cancel the old removal
            change_old += point_old.slope;
            if new.end == old.end {
                change_old -= point_new.slope;
            }
            self.store.set_slope_change(old.end, change_old)?;
        }
        if new.end > now && new.end != old.end {
            change_new -= point_new.slope;
            self.store.set_slope_change(new.end, change_new)?;
        }

        let point = Point {
            block: self.ctx.height,
            ..point_new
        };
        self.store.set_user_epoch(id, user_epoch)?;
        self.store.set_user_point(id, user_epoch, &point)?;

        debug!(
            lock_id = %id,
            user_epoch,
            bias = %point.bias,
            slope = %point.slope,
            "regulated lock checkpoint"
        );
        Ok(point)
    }

    /// Bring the global curve up to the current block, then add the given
    /// deltas at `now`. A checkpoint is appended at every period boundary
    /// crossed and one more at `now`.
    pub fn regulate_global(&mut self, slope_delta: Amount, bias_delta: Amount) -> Result<Point, VeError> {
        let now = self.ctx.time;
        let mut epoch = self.store.epoch()?;
        let initial = if epoch > EMPTY_EPOCH {
            self.store.point(epoch)?
        } else {
            Point {
                timestamp: now,
                block: self.ctx.height,
                ..Point::zero()
            }
        };
        if now < initial.timestamp {
            return Err(VeError::TimeWentBackwards {
                last: initial.timestamp,
                now,
            });
        }

        let (mut last, boundaries) = self.walk_forward(initial, now)?;

        let elapsed = i128::from(now - initial.timestamp);
        let blocks = i128::from(self.ctx.height - initial.block);
        for mut point in boundaries {
            // block heights at boundaries are estimated from the block rate
            let dt = i128::from(point.timestamp - initial.timestamp);
            point.block = initial.block + BlockHeight::try_from(blocks * dt / elapsed).unwrap_or(0);
            epoch += 1;
            self.store.set_point(epoch, &point)?;
        }

        // A negative result means `old` did not match what was checkpointed.
        debug_assert!(last.bias + bias_delta >= 0, "bias delta {bias_delta} exceeds global bias");
        debug_assert!(last.slope + slope_delta >= 0, "slope delta {slope_delta} exceeds global slope");
        last.bias = non_negative("bias", last.bias + bias_delta);
        last.slope = non_negative("slope", last.slope + slope_delta);
        last.block = self.ctx.height;
        epoch += 1;
        self.store.set_point(epoch, &last)?;
        self.store.set_epoch(epoch)?;

        debug!(epoch, bias = %last.bias, slope = %last.slope, "regulated global checkpoint");
        Ok(last)
    }

    /// End-of-block hook: catch the global curve up when the log is empty or
    /// at least one period has passed since its latest checkpoint.
    pub fn tick(&mut self) -> Result<Option<Point>, VeError> {
        if let Some((_, last)) = self.last_checkpoint()? {
            if self.ctx.time.saturating_sub(last.timestamp) < PERIOD {
                return Ok(None);
            }
        }
        let point = self.regulate_global(0, 0)?;
        info!(time = self.ctx.time, height = self.ctx.height, "global checkpoint caught up");
        Ok(Some(point))
    }
}
