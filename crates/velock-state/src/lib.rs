//! velock-state
//!
//! Persistent state of the vote-escrow ledger: the sled-backed store, the
//! key layout, typed checkpoint accessors and the voting-power ledger that
//! maintains the global and per-lock decay curves.
//!
//! A state transition stages its writes in a `StagedStore` and commits them
//! in one batch, so a failed transition leaves the database untouched.

pub mod db;
pub mod keys;
pub mod kv;
pub mod ledger;
pub mod store;

pub use db::{StagedStore, StateDb};
pub use kv::{KvRead, KvStore};
pub use ledger::{lock_point, VotingPowerLedger};
pub use store::CheckpointStore;
