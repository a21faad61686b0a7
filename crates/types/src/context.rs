use serde::{Deserialize, Serialize};

use crate::{Address, BlockNumber};

/// Who is calling and at which block.
///
/// Every mutating entry point of the ledgers receives one of these; reads take
/// the block number directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: Address,
    pub block: BlockNumber,
}

impl CallContext {
    pub fn new(caller: Address, block: BlockNumber) -> Self {
        Self { caller, block }
    }
}
