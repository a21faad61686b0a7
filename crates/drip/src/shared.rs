//! Serialized handle over a distributor.
//!
//! Every call takes the lock for its whole duration, so concurrent callers
//! observe the distributor one complete operation at a time.

use accrual_treasury::{ReleaseError, RewardSource};
use accrual_types::{Address, Amount, BlockNumber, CallContext};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use crate::distributor::ShareDripDistributor;

#[derive(Clone)]
pub struct SharedDistributor {
    inner: Arc<RwLock<ShareDripDistributor>>,
}

impl SharedDistributor {
    pub fn new(distributor: ShareDripDistributor) -> Self {
        Self {
            inner: Arc::new(RwLock::new(distributor)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ShareDripDistributor> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ShareDripDistributor> {
        self.inner.write()
    }
}

impl RewardSource for SharedDistributor {
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
