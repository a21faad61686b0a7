//! Appraisal oracle
//!
//! Maps `(asset class, unit id)` to a nonnegative value. Units the oracle has
//! never been told about appraise at zero; asking about an asset class the
//! oracle does not support is an error.

use accrual_treasury::{Role, RoleRegistry};
use accrual_types::{Address, Amount, AssetClass, UnitId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::errors::OracleError;

pub trait AppraisalOracle: Send + Sync {
    fn supports_asset_class(&self, class: &AssetClass) -> bool;

    fn value_of(&self, class: &AssetClass, id: UnitId) -> Result<Amount, OracleError>;

    fn values_of(&self, class: &AssetClass, ids: &[UnitId]) -> Result<Vec<Amount>, OracleError> {
        ids.iter().map(|id| self.value_of(class, *id)).collect()
    }

    fn total_value_of(&self, class: &AssetClass, ids: &[UnitId]) -> Result<Amount, OracleError> {
        self.values_of(class, ids)?
            .into_iter()
            .try_fold(0u128, |total, value| total.checked_add(value))
            .ok_or(OracleError::Overflow)
    }
}

pub type SharedOracle = Arc<dyn AppraisalOracle>;

#[derive(Debug, Default)]
struct AppraisalBook {
    roles: RoleRegistry,
    classes: HashSet<AssetClass>,
    values: HashMap<(AssetClass, UnitId), Amount>,
}

impl AppraisalBook {
    fn require_class(&self, class: &AssetClass) -> Result<(), OracleError> {
        if self.classes.contains(class) {
            Ok(())
        } else {
            Err(OracleError::UnsupportedAssetClass(class.clone()))
        }
    }
}

/// Oracle fed by an allow-list of appraisal writers.
#[derive(Debug)]
pub struct InMemoryAppraisalOracle {
    book: RwLock<AppraisalBook>,
}

impl InMemoryAppraisalOracle {
    /// `admin` manages classes and writers and may write values itself.
    pub fn new(admin: Address) -> Self {
        let roles = RoleRegistry::with_admin(admin).with_role(Role::AppraisalWriter, admin);
        Self {
            book: RwLock::new(AppraisalBook {
                roles,
                ..Default::default()
            }),
        }
    }

    pub fn add_asset_class(&self, caller: &Address, class: AssetClass) -> Result<(), OracleError> {
        let mut book = self.book.write();
        book.roles.require(Role::Admin, caller)?;
        debug!(target: "mining", "Oracle now appraises asset class {}", class);
        book.classes.insert(class);
        Ok(())
    }

    pub fn grant_writer(&self, caller: &Address, writer: Address) -> Result<(), OracleError> {
        Ok(self
            .book
            .write()
            .roles
            .grant(caller, Role::AppraisalWriter, writer)?)
    }

    pub fn revoke_writer(&self, caller: &Address, writer: &Address) -> Result<(), OracleError> {
        Ok(self
            .book
            .write()
            .roles
            .revoke(caller, Role::AppraisalWriter, writer)?)
    }

    pub fn set_value(&self, caller: &Address, class: &AssetClass, id: UnitId, value: Amount) -> Result<(), OracleError> {
        self.set_values(caller, class, &[(id, value)])
    }

    /// Write several appraisals at once; nothing is written if any check fails.
    pub fn set_values(&self, caller: &Address, class: &AssetClass, values: &[(UnitId, Amount)]) -> Result<(), OracleError> {
        let mut book = self.book.write();
        book.roles.require(Role::AppraisalWriter, caller)?;
        book.require_class(class)?;
        for (id, value) in values {
            book.values.insert((class.clone(), *id), *value);
        }
        debug!(
            target: "mining",
            "{} appraisal(s) written for class {} by {}",
            values.len(),
            class,
            caller
        );
        Ok(())
    }
}

impl AppraisalOracle for InMemoryAppraisalOracle {
    fn supports_asset_class(&self, class: &AssetClass) -> bool {
        self.book.read().classes.contains(class)
    }

    fn value_of(&self, class: &AssetClass, id: UnitId) -> Result<Amount, OracleError> {
        let book = self.book.read();
        book.require_class(class)?;
        Ok(book.values.get(&(class.clone(), id)).copied().unwrap_or(0))
    }

    fn values_of(&self, class: &AssetClass, ids: &[UnitId]) -> Result<Vec<Amount>, OracleError> {
        let book = self.book.read();
        book.require_class(class)?;
        Ok(ids
            .iter()
            .map(|id| book.values.get(&(class.clone(), *id)).copied().unwrap_or(0))
            .collect())
    }
}
