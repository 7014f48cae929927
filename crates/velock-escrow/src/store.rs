use velock_core::constants::FIRST_LOCK_ID;
use velock_core::error::VeError;
use velock_core::params::Params;
use velock_core::types::{Amount, LockId};
use velock_state::keys;
use velock_state::store::{decode, decode_u64, encode};
use velock_state::{KvRead, KvStore};

/// Escrow bookkeeping that sits beside the curves: total locked, the id
/// counter, gauge attachments, vote flags and the module params.
pub struct EscrowStore<S> {
    kv: S,
}

impl<S> EscrowStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }
}

impl<S: KvRead> EscrowStore<S> {
    pub fn total_locked(&self) -> Result<Amount, VeError> {
        match self.kv.get(&keys::total_locked())? {
            Some(bytes) => decode(&bytes),
            None => Ok(0),
        }
    }

    /// Next id to hand out. An untouched store starts at `FIRST_LOCK_ID`.
    pub fn next_lock_id(&self) -> Result<u64, VeError> {
        match self.kv.get(&keys::next_lock_id())? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(FIRST_LOCK_ID),
        }
    }

    pub fn attached(&self, id: LockId) -> Result<u64, VeError> {
        match self.kv.get(&keys::attached(id))? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    pub fn voted(&self, id: LockId) -> Result<bool, VeError> {
        Ok(matches!(self.kv.get(&keys::voted(id))?.as_deref(), Some([1])))
    }

    pub fn params(&self) -> Result<Params, VeError> {
        match self.kv.get(&keys::params())? {
            Some(bytes) => decode(&bytes),
            None => Ok(Params::default()),
        }
    }
}

impl<S: KvStore> EscrowStore<S> {
    pub fn set_total_locked(&mut self, total: Amount) -> Result<(), VeError> {
        if total < 0 {
            return Err(VeError::NegativeTotalLocked);
        }
        self.kv.set(&keys::total_locked(), encode(&total)?)
    }

    pub fn set_next_lock_id(&mut self, next: u64) -> Result<(), VeError> {
        self.kv.set(&keys::next_lock_id(), next.to_be_bytes().to_vec())
    }

    pub fn set_attached(&mut self, id: LockId, attached: u64) -> Result<(), VeError> {
        if attached == 0 {
            return self.kv.delete(&keys::attached(id));
        }
        self.kv.set(&keys::attached(id), attached.to_be_bytes().to_vec())
    }

    pub fn set_voted(&mut self, id: LockId, voted: bool) -> Result<(), VeError> {
        if voted {
            self.kv.set(&keys::voted(id), vec![1])
        } else {
            self.kv.delete(&keys::voted(id))
        }
    }

    pub fn set_params(&mut self, params: &Params) -> Result<(), VeError> {
        params.validate()?;
        self.kv.set(&keys::params(), encode(params)?)
    }
}
