use accrual_treasury::{AccessError, ReleaseError, TokenError};
use accrual_types::{Address, AssetClass, MathError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mission::MissionId;

/// The three typed groups a mission is composed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitGroup {
    Lander,
    Site,
    Payload,
}

/// Why a candidate is not a valid mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum MissionDefect {
    #[error("a mission needs exactly one lander, got {0}")]
    LanderCount(usize),
    #[error("a mission holds at most one site, got {0}")]
    TooManySites(usize),
    #[error("a mission holds at most {max} payloads, got {count}")]
    TooManyPayloads { count: usize, max: usize },
    #[error("no asset class configured for {0:?} units")]
    ClassNotConfigured(UnitGroup),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("asset class {0} is not supported by the oracle")]
    UnsupportedAssetClass(AssetClass),
    #[error("access denied: {0}")]
    Access(#[from] AccessError),
    #[error("appraisal total overflows")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("access denied: {0}")]
    Access(#[from] AccessError),
    #[error("release failed: {0}")]
    Release(#[from] ReleaseError),
    #[error("math error: {0}")]
    Math(#[from] MathError),
    #[error("custody transfer failed: {0}")]
    Token(#[from] TokenError),
    #[error("appraisal failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("ledger is paused")]
    Paused,
    #[error("ledger is already paused")]
    AlreadyPaused,
    #[error("ledger is not paused")]
    NotPaused,
    #[error("invalid mission: {0}")]
    InvalidMission(MissionDefect),
    #[error("mission {0} does not exist")]
    MissionNotFound(MissionId),
    #[error("mission {0} is not staked")]
    MissionNotStaked(MissionId),
    #[error("{caller} does not own mission {mission}")]
    NotMissionOwner { mission: MissionId, caller: Address },
    #[error("asset class for {group:?} units is already set to {current}")]
    AssetClassAlreadySet { group: UnitGroup, current: AssetClass },
    #[error("no appraisal oracle configured")]
    OracleNotConfigured,
    #[error("invalid parameter {param}: {reason}")]
    InvalidParams { param: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MiningError>;

impl From<MiningError> for ReleaseError {
    fn from(err: MiningError) -> Self {
        match err {
            MiningError::Release(inner) => inner,
            MiningError::Math(inner) => ReleaseError::Math(inner),
            MiningError::Token(inner) => ReleaseError::Token(inner),
            other => ReleaseError::Source(other.to_string()),
        }
    }
}
