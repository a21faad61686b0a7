use accrual_treasury::{AccessError, ReleaseError};
use accrual_types::{Address, MathError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DripError {
    #[error("access denied: {0}")]
    Access(#[from] AccessError),
    #[error("release failed: {0}")]
    Release(#[from] ReleaseError),
    #[error("math error: {0}")]
    Math(#[from] MathError),
    #[error("share list length mismatch: {recipients} recipients, {shares} share entries")]
    ShareListLengthMismatch { recipients: usize, shares: usize },
    #[error("duplicate recipient {0}")]
    DuplicateRecipient(Address),
    #[error("recipient {0} assigned zero shares")]
    ZeroShares(Address),
    #[error("invalid parameter {param}: {reason}")]
    InvalidParams { param: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DripError>;

impl From<DripError> for ReleaseError {
    fn from(err: DripError) -> Self {
        match err {
            DripError::Release(inner) => inner,
            DripError::Math(inner) => ReleaseError::Math(inner),
            other => ReleaseError::Source(other.to_string()),
        }
    }
}
