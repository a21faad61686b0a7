//! Serialized handle over a mining ledger.
//!
//! Implements the same reward source interface the ledger consumes, so a
//! ledger can itself feed a further layer.

use accrual_treasury::{ReleaseError, RewardSource};
use accrual_types::{Address, Amount, BlockNumber, CallContext};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use crate::ledger::MiningPowerLedger;

#[derive(Clone)]
pub struct SharedMiningLedger {
    inner: Arc<RwLock<MiningPowerLedger>>,
}

impl SharedMiningLedger {
    pub fn new(ledger: MiningPowerLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, MiningPowerLedger> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, MiningPowerLedger> {
        self.inner.write()
    }
}

impl RewardSource for SharedMiningLedger {
    fn total_released(&self) -> Amount {
        self.inner.read().total_released()
    }

    fn released(&self, account: &Address) -> Amount {
        self.inner.read().released(account)
    }

    fn releasable(&self, account: &Address, now: BlockNumber) -> Result<Amount, ReleaseError> {
        Ok(self.inner.read().releasable(account, now)?)
    }

    fn release(&self, ctx: &CallContext, from: &Address, to: &Address) -> Result<Amount, ReleaseError> {
        Ok(self.inner.write().release(ctx, from, to)?)
    }

    fn release_amount(
        &self,
        ctx: &CallContext,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ReleaseError> {
        Ok(self.inner.write().release_amount(ctx, from, to, amount)?)
    }
}
