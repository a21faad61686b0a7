//! Recipient accounts and the active-recipient index.
//!
//! Accounts live in a map and are never deleted; the active index is a dense
//! vector of addresses with nonzero shares. Each account stores its position
//! in that vector so removal is a swap with the last element.

use accrual_types::{mul_div, Address, Amount, BlockNumber, MathError, PRECISION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientAccount {
    pub shares: u128,
    /// Allocation accrued up to the last checkpoint.
    pub allocated_snapshot: Amount,
    /// Distributor-wide allocation total at the last checkpoint.
    pub total_allocated_at_snapshot: Amount,
    /// Per-share accumulator value at the last checkpoint.
    pub allocated_per_share_at_snapshot: u128,
    pub last_update_block: BlockNumber,
    /// Position in the active index; meaningful only while `shares > 0`.
    pub active_index: usize,
    pub released: Amount,
}

impl RecipientAccount {
    /// Allocation at the given per-share accumulator value.
    pub fn allocated_at(&self, allocated_per_share: u128) -> Result<Amount, MathError> {
        if self.shares == 0 || allocated_per_share <= self.allocated_per_share_at_snapshot {
            return Ok(self.allocated_snapshot);
        }
        let accrued = mul_div(
            self.shares,
            allocated_per_share - self.allocated_per_share_at_snapshot,
            PRECISION,
        )?;
        self.allocated_snapshot
            .checked_add(accrued)
            .ok_or(MathError::Overflow)
    }

    fn checkpoint(&mut self, mark: &Checkpoint) -> Result<(), MathError> {
        self.allocated_snapshot = self.allocated_at(mark.allocated_per_share)?;
        self.allocated_per_share_at_snapshot = mark.allocated_per_share;
        self.total_allocated_at_snapshot = mark.total_allocated;
        self.last_update_block = mark.block;
        Ok(())
    }
}

/// Global values a recipient checkpoint is taken against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    pub allocated_per_share: u128,
    pub total_allocated: Amount,
    pub block: BlockNumber,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientSet {
    accounts: HashMap<Address, RecipientAccount>,
    active: Vec<Address>,
}

impl RecipientSet {
    pub fn get(&self, address: &Address) -> Option<&RecipientAccount> {
        self.accounts.get(address)
    }

    pub fn shares_of(&self, address: &Address) -> u128 {
        self.accounts.get(address).map_or(0, |a| a.shares)
    }

    /// Active recipients in index order.
    pub fn active(&self) -> &[Address] {
        &self.active
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &RecipientAccount)> {
        self.accounts.iter()
    }

    /// Bring one recipient current, creating its account if needed.
    pub(crate) fn checkpoint(&mut self, address: &Address, mark: &Checkpoint) -> Result<&mut RecipientAccount, MathError> {
        let account = self.accounts.entry(*address).or_default();
        account.checkpoint(mark)?;
        Ok(account)
    }

    /// Bring every active recipient current.
    pub(crate) fn checkpoint_active(&mut self, mark: &Checkpoint) -> Result<(), MathError> {
        for address in &self.active {
            if let Some(account) = self.accounts.get_mut(address) {
                account.checkpoint(mark)?;
            }
        }
        Ok(())
    }

    /// Set shares on an existing account and maintain the active index.
    ///
    /// The caller must have checkpointed the account first.
    pub(crate) fn assign_shares(&mut self, address: &Address, shares: u128) {
        let Some(account) = self.accounts.get_mut(address) else {
            return;
        };
        let was_active = account.shares > 0;
        account.shares = shares;
        match (was_active, shares > 0) {
            (false, true) => {
                account.active_index = self.active.len();
                self.active.push(*address);
            }
            (true, false) => self.remove_active(address),
            _ => {}
        }
    }

    /// Zero every active recipient's shares and empty the active index.
    pub(crate) fn clear_active(&mut self) {
        for address in self.active.drain(..) {
            if let Some(account) = self.accounts.get_mut(&address) {
                account.shares = 0;
                account.active_index = 0;
            }
        }
    }

    fn remove_active(&mut self, address: &Address) {
        let Some(index) = self.accounts.get(address).map(|a| a.active_index) else {
            return;
        };
        self.active.swap_remove(index);
        if let Some(moved) = self.active.get(index).copied() {
            if let Some(account) = self.accounts.get_mut(&moved) {
                account.active_index = index;
            }
        }
        if let Some(account) = self.accounts.get_mut(address) {
            account.active_index = 0;
        }
    }
}
