//! velock-genesis
//!
//! Initializes the vote-escrow state from a genesis document, writing into
//! a fresh `StateDb` in one staged commit, and exports the live state back
//! into the same document shape.
//!
//! Imported locks go through `LockManager::restore`, so each one is
//! checkpointed at the genesis block exactly as if it had been created
//! there with the exported end.

pub mod state;

pub use state::{GenesisLock, GenesisState};

use tracing::info;

use velock_core::constants::FIRST_LOCK_ID;
use velock_core::error::VeError;
use velock_core::types::{BlockContext, LockId};
use velock_escrow::{EscrowStore, LockManager};
use velock_state::{CheckpointStore, StateDb};

/// Apply `state` to an empty `StateDb` at the genesis block `ctx`.
///
/// Returns the ids issued to the imported locks, in document order.
/// Fails with `GenesisAlreadyApplied` if anything was ever committed.
pub fn apply_genesis(db: &StateDb, ctx: BlockContext, state: &GenesisState) -> Result<Vec<LockId>, VeError> {
    info!(time = ctx.time, height = ctx.height, "applying velock genesis state");

    state.validate(ctx.time)?;
    if !db.is_fresh() {
        return Err(VeError::GenesisAlreadyApplied);
    }

    let mut stage = db.stage();

    // ── Params and counters ──────────────────────────────────────────────────
    let mut escrow = EscrowStore::new(&mut stage);
    escrow.set_params(&state.params)?;
    escrow.set_total_locked(0)?;
    escrow.set_next_lock_id(FIRST_LOCK_ID)?;
    info!(params = %state.params, "genesis: params set");

    // ── Locks ────────────────────────────────────────────────────────────────
    let mut manager = LockManager::new(&mut stage, ctx);
    let mut ids = Vec::with_capacity(state.locks.len());
    for lock in &state.locks {
        ids.push(manager.restore((*lock).into())?);
    }
    // An empty document still gets its first global checkpoint here.
    manager.tick()?;
    info!(locks = ids.len(), "genesis: locks restored");

    // ── Verify total locked ──────────────────────────────────────────────────
    let total = manager.total_locked()?;
    let expected = state.total_locked();
    if total != expected {
        return Err(VeError::InvalidParams(format!(
            "genesis total locked mismatch: expected {expected}, got {total}"
        )));
    }

    stage.commit()?;
    db.flush()?;
    info!(total_locked = %total, "genesis state committed to disk");

    Ok(ids)
}

/// Export params and every lock still holding tokens, ordered by lock id.
/// Locks slashed down to zero are left out.
pub fn export_genesis(db: &StateDb) -> Result<GenesisState, VeError> {
    let params = EscrowStore::new(db).params()?;
    let locks = CheckpointStore::new(db)
        .locked_balances()?
        .into_iter()
        .filter(|(_, locked)| locked.amount > 0)
        .map(|(_, locked)| GenesisLock {
            amount: locked.amount,
            end: locked.end,
        })
        .collect();
    Ok(GenesisState { params, locks })
}
