use serde::{Deserialize, Serialize};

use velock_core::constants::MAX_LOCK_TIME;
use velock_core::error::VeError;
use velock_core::params::Params;
use velock_core::time;
use velock_core::types::{Amount, LockedBalance, Timestamp};

/// One lock carried across a genesis export/import. Ids are reissued in
/// document order on import.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisLock {
    pub amount: Amount,
    /// Period-aligned unlock time.
    pub end: Timestamp,
}

impl From<GenesisLock> for LockedBalance {
    fn from(lock: GenesisLock) -> Self {
        LockedBalance::new(lock.amount, lock.end)
    }
}

/// The module's genesis document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
    #[serde(default)]
    pub locks: Vec<GenesisLock>,
}

impl GenesisState {
    pub fn from_json(json: &str) -> Result<Self, VeError> {
        serde_json::from_str(json).map_err(|e| VeError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, VeError> {
        serde_json::to_string_pretty(self).map_err(|e| VeError::Serialization(e.to_string()))
    }

    /// Check the document against a genesis block at `now`. Locks may
    /// already be expired but must not end further than `MAX_LOCK_TIME`
    /// ahead.
    pub fn validate(&self, now: Timestamp) -> Result<(), VeError> {
        self.params.validate()?;
        for (i, lock) in self.locks.iter().enumerate() {
            if lock.amount <= 0 {
                return Err(VeError::InvalidParams(format!(
                    "genesis lock #{i}: amount must be positive, got {}",
                    lock.amount
                )));
            }
            if !time::is_aligned(lock.end) {
                return Err(VeError::InvalidParams(format!(
                    "genesis lock #{i}: end {} is not period-aligned",
                    lock.end
                )));
            }
            if lock.end > now && lock.end - now > MAX_LOCK_TIME {
                return Err(VeError::InvalidParams(format!(
                    "genesis lock #{i}: end {} exceeds maximum lock time",
                    lock.end
                )));
            }
        }
        Ok(())
    }

    pub fn total_locked(&self) -> Amount {
        self.locks.iter().map(|l| l.amount).sum()
    }
}
