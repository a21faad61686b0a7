//! Treasury plumbing for the accrual ledgers
//!
//! Models the collaborators both engines rely on (fungible and non-fungible
//! token primitives, role-based access control, the reward source interface)
//! and the release protocol they share.

pub mod access;
pub mod account_ledger;
pub mod errors;
pub mod release;
pub mod reward_source;
pub mod unit_ledger;

pub use access::{Role, RoleRegistry};
pub use account_ledger::{InMemoryTokenLedger, MockTokenLedger, SharedTokenLedger, TokenLedger};
pub use errors::{AccessError, ReleaseError, TokenError};
pub use release::{ReleaseController, ReleasePolicy, Settlement};
pub use reward_source::{ManualRewardSource, RewardSource, SharedRewardSource};
pub use unit_ledger::{InMemoryUnitLedger, SharedUnitLedger, UnitLedger};
