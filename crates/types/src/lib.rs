//! Shared types for the accrual ledgers.
//!
//! Monetary amounts are plain `u128` base units of the single reward asset;
//! time is a monotonically increasing block number supplied by the caller.

pub mod address;
pub mod context;
pub mod fixed_point;

pub use address::*;
pub use context::*;
pub use fixed_point::*;

/// Amount of the reward asset in base units.
pub type Amount = u128;

/// Block height (monotonic time counter).
pub type BlockNumber = u64;
