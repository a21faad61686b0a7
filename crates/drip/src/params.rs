use accrual_types::{Amount, BlockNumber};
use serde::{Deserialize, Serialize};

use crate::errors::{DripError, Result};

/// Largest emission rate for which `rate * elapsed_blocks` can never overflow.
pub const MAX_TOKENS_PER_BLOCK: Amount = u128::MAX / (u64::MAX as u128);

/// Launch configuration of a distributor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DripParams {
    /// Linear emission per block, in base units.
    pub tokens_per_block: Amount,
    /// First block that accrues emission.
    pub start_block: BlockNumber,
}

impl Default for DripParams {
    fn default() -> Self {
        Self {
            tokens_per_block: 100,
            start_block: 0,
        }
    }
}

impl DripParams {
    pub fn validate(&self) -> Result<()> {
        validate_rate(self.tokens_per_block)
    }
}

pub(crate) fn validate_rate(rate: Amount) -> Result<()> {
    if rate > MAX_TOKENS_PER_BLOCK {
        return Err(DripError::InvalidParams {
            param: "tokens_per_block".to_string(),
            reason: format!("must not exceed {}", MAX_TOKENS_PER_BLOCK),
        });
    }
    Ok(())
}
