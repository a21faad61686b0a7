//! Fungible token ledger interface
//!
//! The reward asset moves exclusively through this interface: distributor
//! funding, distributor → ledger pulls, releases to end users and sweeps.
//! Each call is atomic; a failed transfer leaves every balance untouched.

use accrual_types::{Address, Amount};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::TokenError;

/// Interface for fungible balance operations.
pub trait TokenLedger: Send + Sync {
    /// Balance held by `account`.
    fn balance_of(&self, account: &Address) -> Amount;

    /// Move `amount` from `from` to `to`.
    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError>;

    /// Create `amount` new tokens in `to`.
    fn mint(&self, to: &Address, amount: Amount) -> Result<(), TokenError>;

    /// Destroy `amount` tokens held by `from`.
    fn burn(&self, from: &Address, amount: Amount) -> Result<(), TokenError>;

    /// Total supply across all accounts.
    fn total_supply(&self) -> Amount;
}

pub type SharedTokenLedger = Arc<dyn TokenLedger>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Balances {
    balances: HashMap<Address, Amount>,
    total_supply: Amount,
}

impl Balances {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn debit_check(&self, account: &Address, amount: Amount) -> Result<Amount, TokenError> {
        let balance = self.balance(account);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                account: *account,
                balance,
                requested: amount,
            });
        }
        Ok(balance - amount)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        let remaining = self.debit_check(from, amount)?;
        if from == to || amount == 0 {
            return Ok(());
        }
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        self.balances.insert(*from, remaining);
        self.balances.insert(*to, credited);
        Ok(())
    }

    fn mint(&mut self, to: &Address, amount: Amount) -> Result<(), TokenError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        self.balances.insert(*to, credited);
        self.total_supply = supply;
        Ok(())
    }

    fn burn(&mut self, from: &Address, amount: Amount) -> Result<(), TokenError> {
        let remaining = self.debit_check(from, amount)?;
        self.balances.insert(*from, remaining);
        self.total_supply -= amount;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// In-memory implementation
// -----------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    state: RwLock<Balances>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn balance_of(&self, account: &Address) -> Amount {
        self.state.read().balance(account)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        self.state.write().transfer(from, to, amount)
    }

    fn mint(&self, to: &Address, amount: Amount) -> Result<(), TokenError> {
        self.state.write().mint(to, amount)
    }

    fn burn(&self, from: &Address, amount: Amount) -> Result<(), TokenError> {
        self.state.write().burn(from, amount)
    }

    fn total_supply(&self) -> Amount {
        self.state.read().total_supply
    }
}

// -----------------------------------------------------------------------------
// Mock ledger (call recording and failure injection)
// -----------------------------------------------------------------------------
#[derive(Debug, Default)]
struct MockState {
    balances: Balances,
    transfer_calls: Vec<(Address, Address, Amount)>,
    fail_next_transfer: bool,
}

#[derive(Debug, Default)]
pub struct MockTokenLedger {
    state: RwLock<MockState>,
}

impl MockTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfer_calls(&self) -> Vec<(Address, Address, Amount)> {
        self.state.read().transfer_calls.clone()
    }

    /// Make the next `transfer` fail without moving anything.
    pub fn fail_next_transfer(&self) {
        self.state.write().fail_next_transfer = true;
    }
}

impl TokenLedger for MockTokenLedger {
    fn balance_of(&self, account: &Address) -> Amount {
        self.state.read().balances.balance(account)
    }

    fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        let mut state = self.state.write();
        state.transfer_calls.push((*from, *to, amount));
        if std::mem::take(&mut state.fail_next_transfer) {
            return Err(TokenError::Rejected("injected failure".into()));
        }
        state.balances.transfer(from, to, amount)
    }

    fn mint(&self, to: &Address, amount: Amount) -> Result<(), TokenError> {
        self.state.write().balances.mint(to, amount)
    }

    fn burn(&self, from: &Address, amount: Amount) -> Result<(), TokenError> {
        self.state.write().balances.burn(from, amount)
    }

    fn total_supply(&self) -> Amount {
        self.state.read().balances.total_supply
    }
}
