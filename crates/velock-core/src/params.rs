use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DEFAULT_LOCK_DENOM;
use crate::error::VeError;

/// Module parameters, loaded from the genesis document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// The only denomination that may be locked.
    pub lock_denom: String,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            lock_denom: DEFAULT_LOCK_DENOM.to_string(),
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), VeError> {
        validate_denom(&self.lock_denom)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Denoms are 3–128 characters: a letter, then letters, digits or `/:._-`.
pub fn validate_denom(denom: &str) -> Result<(), VeError> {
    let mut chars = denom.chars();
    let leading_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || "/:._-".contains(c));
    if !(3..=128).contains(&denom.len()) || !leading_letter || !rest_ok {
        return Err(VeError::InvalidParams(format!("invalid denom: {denom:?}")));
    }
    Ok(())
}
