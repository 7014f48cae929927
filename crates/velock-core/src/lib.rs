//! velock-core
//!
//! Shared vocabulary of the vote-escrow ledger: constants, the error type,
//! checkpoint and lock types, period alignment and module parameters.

pub mod constants;
pub mod error;
pub mod params;
pub mod time;
pub mod types;

pub use constants::*;
pub use error::VeError;
pub use params::Params;
pub use types::*;
