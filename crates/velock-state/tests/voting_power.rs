//! End-to-end properties of the voting-power ledger over a real sled store.
//!
//! Run with:
//!   cargo test -p velock-state --test voting_power

use velock_core::constants::{MAX_LOCK_TIME, PERIOD};
use velock_core::error::VeError;
use velock_core::time;
use velock_core::types::{Amount, BlockContext, BlockHeight, LockId, LockedBalance, Target, Timestamp};
use velock_state::{StagedStore, StateDb, VotingPowerLedger};

/// Mid-week, so `now` is never a period boundary.
const GENESIS_TIME: Timestamp = 1_754_379_718;
const BIG: Amount = 1_000_000_000_000_000_000;

fn slope_of(amount: Amount) -> Amount {
    amount / Amount::from(MAX_LOCK_TIME)
}

// ── Test chain ────────────────────────────────────────────────────────────────

/// A ledger database plus a simulated block clock (one block every 5 s).
struct Chain {
    db: StateDb,
    time: Timestamp,
    height: BlockHeight,
}

impl Chain {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("velock_it_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        Self {
            db: StateDb::open(&dir).expect("open temp db"),
            time: GENESIS_TIME,
            height: 1,
        }
    }

    fn advance(&mut self, seconds: u64) {
        self.time += seconds;
        self.height += (seconds / 5).max(1) as BlockHeight;
    }

    fn ctx(&self) -> BlockContext {
        BlockContext::new(self.time, self.height)
    }

    /// Run one state transition at the current block and commit it.
    fn exec<'a, T, F>(&'a self, f: F) -> T
    where
        F: FnOnce(&mut VotingPowerLedger<&mut StagedStore<'a>>) -> Result<T, VeError>,
    {
        let mut stage = self.db.stage();
        let mut ledger = VotingPowerLedger::new(&mut stage, self.ctx());
        let out = f(&mut ledger).expect("state transition");
        stage.commit().expect("commit");
        out
    }

    fn ledger(&self) -> VotingPowerLedger<&StateDb> {
        VotingPowerLedger::new(&self.db, self.ctx())
    }

    fn total(&self, t: Timestamp) -> Amount {
        self.ledger().total_power_at(Target::Time(t)).unwrap()
    }

    fn power(&self, id: LockId, t: Timestamp) -> Amount {
        self.ledger().power_at(id, Target::Time(t)).unwrap()
    }

    /// Lock `amount` until `periods` boundaries after now.
    fn lock(&self, id: LockId, amount: Amount, periods: u64) -> LockedBalance {
        let locked = LockedBalance::new(amount, time::align(self.time) + periods * PERIOD);
        self.exec(|l| {
            l.regulate_lock(id, LockedBalance::empty(), locked)?;
            l.set_locked_balance(id, &locked)
        });
        locked
    }

    fn relock(&self, id: LockId, old: LockedBalance, new: LockedBalance) {
        self.exec(|l| {
            l.regulate_lock(id, old, new)?;
            l.set_locked_balance(id, &new)
        });
    }

    fn tick(&self) -> bool {
        self.exec(|l| l.tick()).is_some()
    }
}

// ── Decay ─────────────────────────────────────────────────────────────────────

#[test]
fn power_at_creation_is_exact_and_decays_to_zero_at_end() {
    let chain = Chain::new("decay_exact");
    let id = LockId(1);
    let locked = chain.lock(id, BIG, 104);
    let now = chain.time;

    let expected = slope_of(BIG) * Amount::from(locked.end - now);
    assert_eq!(chain.power(id, now), expected);
    assert_eq!(chain.total(now), expected);

    assert_eq!(chain.power(id, locked.end), 0);
    assert_eq!(chain.total(locked.end), 0);
    assert_eq!(chain.power(id, locked.end + 10 * PERIOD), 0);
    assert_eq!(chain.total(locked.end + 10 * PERIOD), 0);
}

#[test]
fn power_never_increases_without_a_mutation() {
    let mut chain = Chain::new("monotonic");
    let a = chain.lock(LockId(1), BIG, 30);
    chain.advance(3 * PERIOD + 77);
    chain.lock(LockId(2), 2 * BIG, 12);
    chain.advance(1_000);
    chain.tick();

    let mut prev_total = Amount::MAX;
    let mut prev_one = Amount::MAX;
    let mut t = chain.time;
    while t <= a.end + PERIOD {
        let total = chain.total(t);
        let one = chain.power(LockId(1), t);
        assert!(total <= prev_total, "total increased at {t}");
        assert!(one <= prev_one, "lock power increased at {t}");
        assert!(total >= one);
        prev_total = total;
        prev_one = one;
        t += PERIOD / 3;
    }
    assert_eq!(prev_total, 0);
}

#[test]
fn lock_of_one_million_units_has_zero_slope() {
    let chain = Chain::new("zero_slope");
    let id = LockId(1);
    chain.lock(id, 1_000_000, 209);

    assert_eq!(chain.power(id, chain.time), 0);
    assert_eq!(chain.total(chain.time), 0);
    let (_, point) = chain.ledger().last_checkpoint().unwrap().unwrap();
    assert_eq!((point.bias, point.slope), (0, 0));
}

// ── Mutation engine ───────────────────────────────────────────────────────────

#[test]
fn single_mutation_conserves_total_power() {
    let mut chain = Chain::new("conservation");
    let a = chain.lock(LockId(1), BIG, 50);
    chain.lock(LockId(2), 3 * BIG, 20);
    chain.advance(2 * PERIOD + 500);

    let now = chain.time;
    let before_total = chain.total(now);
    let before_lock = chain.power(LockId(1), now);

    let extended = LockedBalance::new(a.amount + BIG / 2, a.end + 40 * PERIOD);
    chain.relock(LockId(1), a, extended);

    let after_lock = chain.power(LockId(1), now);
    assert_eq!(after_lock, slope_of(extended.amount) * Amount::from(extended.end - now));
    assert_eq!(chain.total(now), before_total - before_lock + after_lock);
}

#[test]
fn clearing_a_lock_removes_its_power_and_schedule() {
    let mut chain = Chain::new("clearing");
    let a = chain.lock(LockId(1), BIG, 10);
    let b = chain.lock(LockId(2), BIG, 20);
    chain.advance(PERIOD);

    chain.relock(LockId(1), a, LockedBalance::empty());
    let now = chain.time;
    assert_eq!(chain.power(LockId(1), now), 0);
    assert_eq!(chain.total(now), slope_of(BIG) * Amount::from(b.end - now));
    assert_eq!(chain.ledger().store().slope_change(a.end).unwrap(), 0);
    // Past a's old end the total keeps decaying at b's slope only.
    assert_eq!(chain.total(a.end + PERIOD), slope_of(BIG) * Amount::from(b.end - a.end - PERIOD));
}

#[test]
fn two_equal_locks_one_period_apart_sum_to_total() {
    let mut chain = Chain::new("two_locks");
    let duration = 100 * PERIOD;
    let first = LockId(1);
    let second = LockId(2);

    let a = LockedBalance::new(BIG, time::align(chain.time + duration));
    chain.exec(|l| l.regulate_lock(first, LockedBalance::empty(), a).map(|_| ()));
    let start = chain.time;
    chain.advance(PERIOD);
    let b = LockedBalance::new(BIG, time::align(chain.time + duration));
    chain.exec(|l| l.regulate_lock(second, LockedBalance::empty(), b).map(|_| ()));
    assert_eq!(b.end, a.end + PERIOD);

    let mut t = start;
    while t <= b.end + PERIOD {
        assert_eq!(
            chain.power(first, t) + chain.power(second, t),
            chain.total(t),
            "sum mismatch at {t}"
        );
        t += PERIOD / 2 + 1_234;
    }
}

// ── Global regulation ────────────────────────────────────────────────────────

#[test]
fn tick_is_idempotent_at_unchanged_time() {
    let mut chain = Chain::new("idempotent_tick");
    chain.lock(LockId(1), BIG, 30);
    chain.advance(2 * PERIOD);

    assert!(chain.tick());
    let after_first = chain.ledger().last_checkpoint().unwrap().unwrap();
    assert!(!chain.tick());
    assert_eq!(chain.ledger().last_checkpoint().unwrap().unwrap(), after_first);

    // A zero-delta regulation at the same time appends an identical point.
    let point = chain.exec(|l| l.regulate_global(0, 0));
    assert_eq!((point.bias, point.slope), (after_first.1.bias, after_first.1.slope));
}

#[test]
fn one_late_tick_matches_ticking_every_period() {
    const PERIODS: u64 = 15;
    let mut late = Chain::new("catch_up_late");
    let mut steady = Chain::new("catch_up_steady");
    for chain in [&late, &steady] {
        chain.lock(LockId(1), BIG, 6);
        chain.lock(LockId(2), 5 * BIG, 40);
        chain.lock(LockId(3), 7 * BIG, 11);
    }

    for _ in 0..PERIODS {
        steady.advance(PERIOD);
        assert!(steady.tick());
    }
    late.advance(PERIODS * PERIOD);
    assert!(late.tick());

    let ledger = late.ledger();
    let store = ledger.store();
    // One checkpoint per crossed boundary plus one at now, after the 3 locks.
    assert_eq!(store.epoch().unwrap(), 3 + PERIODS + 1);
    for epoch in 4..=3 + PERIODS {
        assert!(time::is_aligned(store.point(epoch).unwrap().timestamp));
    }

    let now = late.time;
    assert_eq!(late.total(now), steady.total(now));
    let mut t = GENESIS_TIME;
    while t <= now + 30 * PERIOD {
        assert_eq!(late.total(t), steady.total(t), "diverged at {t}");
        t += PERIOD / 4;
    }
}

// ── Queries ───────────────────────────────────────────────────────────────────

#[test]
fn checkpoint_timestamps_resolve_to_their_own_bias() {
    let mut chain = Chain::new("search_exact");
    let mut locks = Vec::new();
    for i in 1..=6u64 {
        let id = LockId(i);
        locks.push((id, chain.lock(id, Amount::from(i) * BIG, 10 + 7 * i)));
        chain.advance(PERIOD / 2 + i * 3_000);
    }
    chain.tick();

    let ledger = chain.ledger();
    let store = ledger.store();
    for epoch in 1..=store.epoch().unwrap() {
        let point = store.point(epoch).unwrap();
        assert_eq!(chain.total(point.timestamp), point.bias, "epoch {epoch}");
    }
    for (id, _) in &locks {
        for epoch in 1..=store.user_epoch(*id).unwrap() {
            let point = store.user_point(*id, epoch).unwrap();
            assert_eq!(chain.power(*id, point.timestamp), point.bias);
        }
    }
}

#[test]
fn queries_by_block_track_queries_by_time() {
    let mut chain = Chain::new("by_block");
    let id = LockId(1);
    chain.lock(id, BIG, 52);
    let (h0, t0) = (chain.height, chain.time);
    chain.advance(10_000);
    chain.lock(LockId(2), BIG, 52);

    let ledger = chain.ledger();
    // Blocks are 5 s apart in this chain, so block h0 + k is at t0 + 5k.
    let k = 1_000;
    let at_block = ledger.power_at(id, Target::Block(h0 + k)).unwrap();
    assert_eq!(at_block, chain.power(id, t0 + 5 * k as u64));
    assert_eq!(
        ledger.total_power_at(Target::Block(chain.height)).unwrap(),
        chain.total(chain.time)
    );
    assert!(matches!(
        ledger.total_power_at(Target::Block(chain.height + 1)),
        Err(VeError::BlockInFuture { .. })
    ));
}

#[test]
fn failed_transition_leaves_store_untouched() {
    let chain = Chain::new("atomic");
    chain.lock(LockId(1), BIG, 10);
    let before = chain.ledger().last_checkpoint().unwrap();

    let mut stage = chain.db.stage();
    let mut ledger = VotingPowerLedger::new(&mut stage, chain.ctx());
    let ok = LockedBalance::new(BIG, time::align(chain.time) + 5 * PERIOD);
    ledger.regulate_lock(LockId(2), LockedBalance::empty(), ok).unwrap();
    let err = ledger
        .regulate_lock(LockId(3), LockedBalance::empty(), LockedBalance::new(-1, ok.end))
        .unwrap_err();
    assert!(err.is_fatal());
    drop(stage);

    assert_eq!(chain.ledger().last_checkpoint().unwrap(), before);
    assert_eq!(chain.ledger().store().user_epoch(LockId(2)).unwrap(), 0);
}
