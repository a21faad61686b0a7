use accrual_types::FixedRatio;
use serde::{Deserialize, Serialize};

use crate::errors::{MiningError, Result};

/// Default cap on payload units per mission.
pub const MAX_PAYLOADS: usize = 5;

/// Launch configuration of a mining ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Largest payload group a mission may carry.
    pub max_payloads: usize,
    /// Completion bonus as numerator/denominator (must be >= 1).
    pub completion_numerator: u128,
    pub completion_denominator: u128,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            max_payloads: MAX_PAYLOADS,
            completion_numerator: 1,
            completion_denominator: 1,
        }
    }
}

impl LedgerParams {
    pub fn validate(&self) -> Result<()> {
        self.completion_multiplier().map(|_| ())
    }

    /// The completion bonus folded into one fixed-point ratio.
    pub fn completion_multiplier(&self) -> Result<FixedRatio> {
        completion_ratio(self.completion_numerator, self.completion_denominator)
    }
}

pub(crate) fn completion_ratio(numerator: u128, denominator: u128) -> Result<FixedRatio> {
    if denominator == 0 {
        return Err(MiningError::InvalidParams {
            param: "completion_denominator".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(FixedRatio::at_least_one(numerator, denominator)?)
}
