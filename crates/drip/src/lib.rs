//! Share Drip Distributor
//!
//! Divides a linear per-block token emission among a small, mutable set of
//! share-weighted recipients. Allocation is evaluated lazily from snapshots,
//! so every operation costs O(1) or O(active recipients), never O(blocks).

pub mod distributor;
pub mod errors;
pub mod params;
pub mod recipients;
pub mod shared;

pub use distributor::{DistributorSnapshot, DistributorState, ShareDripDistributor};
pub use errors::{DripError, Result};
pub use params::{DripParams, MAX_TOKENS_PER_BLOCK};
pub use recipients::{RecipientAccount, RecipientSet};
pub use shared::SharedDistributor;
