//! Lock lifecycle across many blocks, with an end-of-block tick after every
//! transition.
//!
//! Run with:
//!   cargo test -p velock-escrow --test lifecycle

use velock_core::constants::{DEFAULT_LOCK_DENOM, MAX_LOCK_TIME, PERIOD};
use velock_core::error::VeError;
use velock_core::types::{Amount, BlockContext, BlockHeight, LockId, Target, Timestamp};
use velock_escrow::{LockManager, LockQuery};
use velock_state::{StagedStore, StateDb};

const START: Timestamp = 1_754_379_718;
const UNIT: Amount = 1_000_000_000_000_000_000;

struct Node {
    db: StateDb,
    time: Timestamp,
    height: BlockHeight,
}

impl Node {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("velock_lifecycle_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        Self {
            db: StateDb::open(&dir).expect("open temp db"),
            time: START,
            height: 1,
        }
    }

    fn ctx(&self) -> BlockContext {
        BlockContext::new(self.time, self.height)
    }

    /// Apply one block: the transition, then the end-of-block tick, then a
    /// single commit. A failed transition commits nothing.
    fn block<T, F>(&mut self, seconds: u64, f: F) -> Result<T, VeError>
    where
        F: FnOnce(&mut LockManager<StagedStore<'_>>) -> Result<T, VeError>,
    {
        self.time += seconds;
        self.height += 1;
        let mut m = LockManager::new(self.db.stage(), self.ctx());
        let out = f(&mut m)?;
        m.tick()?;
        m.into_inner().commit()?;
        Ok(out)
    }

    fn query(&self) -> LockQuery<'_, StateDb> {
        LockQuery::new(&self.db, self.ctx())
    }

    fn power(&self, id: LockId) -> Amount {
        self.query().voting_power(id, Target::Time(self.time)).unwrap()
    }

    fn total(&self) -> Amount {
        self.query().total_voting_power(Target::Time(self.time)).unwrap()
    }
}

#[test]
fn full_lifecycle_keeps_curves_consistent() {
    let mut node = Node::new("full");

    let a = node
        .block(0, |m| m.create(DEFAULT_LOCK_DENOM, UNIT, 26 * PERIOD))
        .unwrap()
        .0;
    let b = node
        .block(60, |m| m.create(DEFAULT_LOCK_DENOM, 2 * UNIT, 8 * PERIOD))
        .unwrap()
        .0;
    assert_eq!(node.total(), node.power(a) + node.power(b));

    node.block(PERIOD, |m| m.deposit(a, DEFAULT_LOCK_DENOM, UNIT)).unwrap();
    node.block(PERIOD, |m| m.extend_time(b, 40 * PERIOD)).unwrap();
    assert_eq!(node.total(), node.power(a) + node.power(b));

    // Locks cannot be merged while voting.
    node.block(5, |m| m.set_voted(a, true)).unwrap();
    let err = node.block(5, |m| m.merge(a, b)).unwrap_err();
    assert!(matches!(err, VeError::LockAttached(_)));
    node.block(5, |m| m.set_voted(a, false)).unwrap();

    let merged = node.block(5, |m| m.merge(a, b)).unwrap();
    assert_eq!(merged.amount, 4 * UNIT);
    assert_eq!(node.power(a), 0);
    assert_eq!(node.total(), node.power(b));

    let q = node.query();
    assert_eq!(
        q.pending_slope_changes(node.time).unwrap(),
        vec![(merged.end, -(4 * UNIT / Amount::from(MAX_LOCK_TIME)))]
    );

    // Idle blocks: the tick catches the global curve up.
    for _ in 0..50 {
        node.block(PERIOD, |_| Ok(())).unwrap();
        assert_eq!(node.total(), node.power(b));
    }
    assert_eq!(node.total(), 0);

    let released = node.block(10, |m| m.withdraw(b)).unwrap();
    assert_eq!(released, 4 * UNIT);
    let m = LockManager::new(&node.db, node.ctx());
    assert_eq!(m.total_locked().unwrap(), 0);
    assert_eq!(m.next_lock_id().unwrap(), 3);
}

#[test]
fn failed_block_commits_nothing() {
    let mut node = Node::new("failed_block");
    let (id, _) = node
        .block(0, |m| m.create(DEFAULT_LOCK_DENOM, UNIT, 10 * PERIOD))
        .unwrap();
    let before = node.total();

    let err = node
        .block(0, |m| {
            m.deposit(id, DEFAULT_LOCK_DENOM, UNIT)?;
            m.create("ulion", UNIT, 10 * PERIOD)
        })
        .unwrap_err();
    assert!(matches!(err, VeError::InvalidLockDenom { .. }));

    let m = LockManager::new(&node.db, node.ctx());
    assert_eq!(m.locked_balance(id).unwrap().amount, UNIT);
    assert_eq!(m.total_locked().unwrap(), UNIT);
    assert_eq!(node.total(), before);
}

#[test]
fn slashing_lowers_power_proportionally() {
    let mut node = Node::new("slash");
    let (id, end) = node
        .block(0, |m| m.create(DEFAULT_LOCK_DENOM, 10 * UNIT, 100 * PERIOD))
        .unwrap();
    node.block(3 * PERIOD, |m| m.slash(id, 4 * UNIT)).unwrap();

    let slope = 6 * UNIT / Amount::from(MAX_LOCK_TIME);
    assert_eq!(node.power(id), slope * Amount::from(end - node.time));
    assert_eq!(node.total(), node.power(id));
}

#[test]
fn decay_schedule_serializes_for_clients() {
    let mut node = Node::new("schedule_json");
    let (id, end) = node
        .block(0, |m| m.create(DEFAULT_LOCK_DENOM, UNIT, 2 * PERIOD))
        .unwrap();

    let steps = node.query().decay_schedule(id).unwrap();
    let text = serde_json::to_string(&steps).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let last = &json[steps.len() - 1];
    assert_eq!(last["timestamp"], end);
    assert_eq!(last["power"], 0);
}
