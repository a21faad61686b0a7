//! Non-fungible unit ownership interface
//!
//! Stake positions are built from units of three asset classes. The mining
//! ledger takes custody of units through this interface and returns them on
//! unstake.

use accrual_types::{Address, AssetClass, UnitId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::TokenError;

pub trait UnitLedger: Send + Sync {
    /// Current holder of a unit, if it exists.
    fn owner_of(&self, class: &AssetClass, id: UnitId) -> Option<Address>;

    /// Move a unit from `from` to `to`. Fails if `from` does not hold it.
    fn transfer(&self, class: &AssetClass, from: &Address, to: &Address, id: UnitId) -> Result<(), TokenError>;

    /// Create a new unit held by `to`.
    fn mint(&self, class: &AssetClass, to: &Address, id: UnitId) -> Result<(), TokenError>;

    /// Units of `class` held by `owner`, in ascending id order.
    fn units_of(&self, class: &AssetClass, owner: &Address) -> Vec<UnitId>;
}

pub type SharedUnitLedger = Arc<dyn UnitLedger>;

#[derive(Debug, Default)]
pub struct InMemoryUnitLedger {
    owners: RwLock<HashMap<(AssetClass, UnitId), Address>>,
}

impl InMemoryUnitLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnitLedger for InMemoryUnitLedger {
    fn owner_of(&self, class: &AssetClass, id: UnitId) -> Option<Address> {
        self.owners.read().get(&(class.clone(), id)).copied()
    }

    fn transfer(&self, class: &AssetClass, from: &Address, to: &Address, id: UnitId) -> Result<(), TokenError> {
        let mut owners = self.owners.write();
        let holder = owners
            .get_mut(&(class.clone(), id))
            .ok_or_else(|| TokenError::UnitNotFound {
                class: class.clone(),
                id,
            })?;
        if *holder != *from {
            return Err(TokenError::NotUnitOwner {
                class: class.clone(),
                id,
                account: *from,
            });
        }
        *holder = *to;
        Ok(())
    }

    fn mint(&self, class: &AssetClass, to: &Address, id: UnitId) -> Result<(), TokenError> {
        let mut owners = self.owners.write();
        let key = (class.clone(), id);
        if owners.contains_key(&key) {
            return Err(TokenError::UnitAlreadyExists {
                class: class.clone(),
                id,
            });
        }
        owners.insert(key, *to);
        Ok(())
    }

    fn units_of(&self, class: &AssetClass, owner: &Address) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self
            .owners
            .read()
            .iter()
            .filter(|((c, _), holder)| c == class && *holder == owner)
            .map(|((_, id), _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_requires_current_holder() {
        let units = InMemoryUnitLedger::new();
        let landers = AssetClass::new("lander");
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        units.mint(&landers, &alice, 7).unwrap();
        assert!(units.mint(&landers, &bob, 7).is_err());

        let err = units.transfer(&landers, &bob, &alice, 7).unwrap_err();
        assert!(matches!(err, TokenError::NotUnitOwner { .. }));

        units.transfer(&landers, &alice, &bob, 7).unwrap();
        assert_eq!(units.owner_of(&landers, 7), Some(bob));
        assert_eq!(units.units_of(&landers, &bob), vec![7]);
        assert!(units.units_of(&landers, &alice).is_empty());
    }

    #[test]
    fn missing_unit_reported() {
        let units = InMemoryUnitLedger::new();
        let sites = AssetClass::new("site");
        let alice = Address::from_label("alice");
        let err = units.transfer(&sites, &alice, &alice, 1).unwrap_err();
        assert!(matches!(err, TokenError::UnitNotFound { .. }));
    }
}
