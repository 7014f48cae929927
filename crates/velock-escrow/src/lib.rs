//! velock-escrow
//!
//! Lock lifecycle and inspection layer for vote-escrow locks.
//! The voting-power curves live in velock-state's `VotingPowerLedger`.
//! This crate issues lock ids, tracks total locked and gauge attachments,
//! and drives the ledger for create, deposit, extend, merge, withdraw and
//! slash.

pub mod manager;
pub mod query;
pub mod store;

pub use manager::LockManager;
pub use query::{DecayStep, LockQuery};
pub use store::EscrowStore;
