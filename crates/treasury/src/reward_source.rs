//! Reward source interface
//!
//! The same shape is implemented by the share drip distributor and by the
//! mining ledger itself, so one layer can feed the next: a consumer asks how
//! much is releasable for its own account and pulls exactly that.

use accrual_types::{Address, Amount, BlockNumber, CallContext};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::access::RoleRegistry;
use crate::account_ledger::SharedTokenLedger;
use crate::errors::{ReleaseError, TokenError};
use crate::release::{ReleaseController, ReleasePolicy, Settlement};

pub trait RewardSource: Send + Sync {
    /// Total amount released to anyone so far.
    fn total_released(&self) -> Amount;

    /// Amount released to `account` so far.
    fn released(&self, account: &Address) -> Amount;

    /// Amount `account` could release at block `now`.
    fn releasable(&self, account: &Address, now: BlockNumber) -> Result<Amount, ReleaseError>;

    /// Release everything releasable for `from` to `to`; returns the amount.
    fn release(&self, ctx: &CallContext, from: &Address, to: &Address) -> Result<Amount, ReleaseError>;

    /// Release exactly `amount` for `from` to `to`.
    fn release_amount(
        &self,
        ctx: &CallContext,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ReleaseError>;
}

pub type SharedRewardSource = Arc<dyn RewardSource>;

#[derive(Debug)]
struct ManualBook {
    owed: HashMap<Address, Amount>,
    released: HashMap<Address, Amount>,
    controller: ReleaseController,
}

impl ManualBook {
    fn releasable(&self, account: &Address) -> Amount {
        let owed = self.owed.get(account).copied().unwrap_or(0);
        let released = self.released.get(account).copied().unwrap_or(0);
        owed.saturating_sub(released)
    }
}

/// A reward source whose allocations are credited by hand.
///
/// Crediting mints the tokens straight into the source's custody account, so
/// every credited amount is always fully funded.
pub struct ManualRewardSource {
    address: Address,
    tokens: SharedTokenLedger,
    roles: RoleRegistry,
    book: RwLock<ManualBook>,
}

impl ManualRewardSource {
    pub fn new(address: Address, tokens: SharedTokenLedger) -> Self {
        Self {
            address,
            tokens,
            roles: RoleRegistry::new(),
            book: RwLock::new(ManualBook {
                owed: HashMap::new(),
                released: HashMap::new(),
                controller: ReleaseController::new(ReleasePolicy::SelfOnly),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Owe `amount` more to `account`.
    pub fn credit(&self, account: &Address, amount: Amount) -> Result<(), TokenError> {
        self.tokens.mint(&self.address, amount)?;
        let mut book = self.book.write();
        let owed = book.owed.entry(*account).or_insert(0);
        *owed = owed.saturating_add(amount);
        debug!(target: "treasury", "Manual source credited {} to {}", amount, account);
        Ok(())
    }

    fn settle(&self, ctx: &CallContext, from: &Address, to: &Address, amount: Option<Amount>) -> Result<Amount, ReleaseError> {
        let mut book = self.book.write();
        book.controller.authorize(&self.roles, &ctx.caller, from, to)?;
        let releasable = book.releasable(from);
        let requested = amount.unwrap_or(releasable);
        let ManualBook {
            released,
            controller,
            ..
        } = &mut *book;
        let slot = released.entry(*from).or_insert(0);
        controller.settle(
            self.tokens.as_ref(),
            Settlement {
                custody: &self.address,
                account: from,
                to,
                requested,
                releasable,
            },
            slot,
        )?;
        Ok(requested)
    }
}

impl RewardSource for ManualRewardSource {
    fn total_released(&self) -> Amount {
        self.book.read().controller.total_released()
    }

    fn released(&self, account: &Address) -> Amount {
        self.book.read().released.get(account).copied().unwrap_or(0)
    }

    fn releasable(&self, account: &Address, _now: BlockNumber) -> Result<Amount, ReleaseError> {
        Ok(self.book.read().releasable(account))
    }

    fn release(&self, ctx: &CallContext, from: &Address, to: &Address) -> Result<Amount, ReleaseError> {
        self.settle(ctx, from, to, None)
    }

    fn release_amount(
        &self,
        ctx: &CallContext,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ReleaseError> {
        self.settle(ctx, from, to, Some(amount)).map(|_| ())
    }
}
