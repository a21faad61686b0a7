//! Role-based access control consulted by the ledgers' administrative
//! entry points.

use accrual_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use crate::errors::AccessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Configuration changes and role management.
    Admin,
    /// Pause and unpause.
    Pauser,
    /// May push a recipient's releasable funds to that same recipient.
    Releaser,
    /// May write appraisal values.
    AppraisalWriter,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRegistry {
    grants: HashMap<Role, BTreeSet<Address>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose `admin` holds `Admin` and `Pauser`.
    pub fn with_admin(admin: Address) -> Self {
        let mut registry = Self::new();
        registry.insert(Role::Admin, admin);
        registry.insert(Role::Pauser, admin);
        registry
    }

    /// Add a grant while building a registry, before it guards anything.
    pub fn with_role(mut self, role: Role, account: Address) -> Self {
        self.insert(role, account);
        self
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|holders| holders.contains(account))
    }

    pub fn require(&self, role: Role, account: &Address) -> Result<(), AccessError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AccessError::MissingRole {
                account: *account,
                role,
            })
        }
    }

    /// Grant `role` to `account`; `granter` must be an admin.
    pub fn grant(&mut self, granter: &Address, role: Role, account: Address) -> Result<(), AccessError> {
        self.require(Role::Admin, granter)?;
        if self.insert(role, account) {
            info!(target: "treasury", "Granted {:?} to {}", role, account);
        }
        Ok(())
    }

    /// Revoke `role` from `account`; `revoker` must be an admin.
    pub fn revoke(&mut self, revoker: &Address, role: Role, account: &Address) -> Result<(), AccessError> {
        self.require(Role::Admin, revoker)?;
        let removed = self
            .grants
            .get_mut(&role)
            .is_some_and(|holders| holders.remove(account));
        if removed {
            info!(target: "treasury", "Revoked {:?} from {}", role, account);
        }
        Ok(())
    }

    pub fn holders(&self, role: Role) -> Vec<Address> {
        self.grants
            .get(&role)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }

    fn insert(&mut self, role: Role, account: Address) -> bool {
        self.grants.entry(role).or_default().insert(account)
    }
}
