use accrual_types::{Address, Amount, AssetClass, MathError, UnitId};
use thiserror::Error;

use crate::access::Role;

/// Failures of the fungible and non-fungible transfer primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("insufficient balance for {account}: balance={balance}, requested={requested}")]
    InsufficientBalance {
        account: Address,
        balance: Amount,
        requested: Amount,
    },
    #[error("unit {class}#{id} does not exist")]
    UnitNotFound { class: AssetClass, id: UnitId },
    #[error("unit {class}#{id} is not held by {account}")]
    NotUnitOwner {
        class: AssetClass,
        id: UnitId,
        account: Address,
    },
    #[error("unit {class}#{id} already exists")]
    UnitAlreadyExists { class: AssetClass, id: UnitId },
    #[error("token supply overflow")]
    SupplyOverflow,
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("{account} is missing role {role:?}")]
    MissingRole { account: Address, role: Role },
}

/// Failures of the release protocol shared by every reward source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseError {
    #[error("{caller} may not release funds of {account}")]
    Unauthorized { caller: Address, account: Address },
    #[error("insufficient allocation for {account}: requested={requested}, releasable={releasable}")]
    InsufficientAllocation {
        account: Address,
        requested: Amount,
        releasable: Amount,
    },
    #[error("token transfer failed: {0}")]
    Token(#[from] TokenError),
    #[error("math error: {0}")]
    Math(#[from] MathError),
    #[error("reward source failure: {0}")]
    Source(String),
}
