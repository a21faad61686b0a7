//! Release protocol shared by every reward source
//!
//! A release always runs the same steps: authorize the caller, let the engine
//! bring its snapshots current and compute what is releasable, then settle:
//! check the request against the releasable amount, transfer out of custody
//! and book the release. Settlement pre-computes every counter before the
//! transfer so a failed transfer leaves the books untouched.

use accrual_types::{Address, Amount, MathError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::{Role, RoleRegistry};
use crate::account_ledger::TokenLedger;
use crate::errors::ReleaseError;

/// Who may trigger a release of `from`'s funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleasePolicy {
    /// Only `from` itself.
    SelfOnly,
    /// `from` itself, or a `Releaser` pushing the funds to `from`.
    SelfOrOperatorToSelf,
}

/// One settlement request, produced after the engine has brought its
/// snapshots current.
#[derive(Debug, Clone, Copy)]
pub struct Settlement<'a> {
    /// Account holding the reward asset in custody.
    pub custody: &'a Address,
    /// Account whose allocation is being released.
    pub account: &'a Address,
    /// Destination of the transfer.
    pub to: &'a Address,
    pub requested: Amount,
    pub releasable: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseController {
    policy: ReleasePolicy,
    total_released: Amount,
}

impl ReleaseController {
    pub fn new(policy: ReleasePolicy) -> Self {
        Self {
            policy,
            total_released: 0,
        }
    }

    pub fn total_released(&self) -> Amount {
        self.total_released
    }

    pub fn authorize(
        &self,
        roles: &RoleRegistry,
        caller: &Address,
        from: &Address,
        to: &Address,
    ) -> Result<(), ReleaseError> {
        let allowed = caller == from
            || match self.policy {
                ReleasePolicy::SelfOnly => false,
                ReleasePolicy::SelfOrOperatorToSelf => {
                    to == from && roles.has_role(Role::Releaser, caller)
                }
            };
        if allowed {
            Ok(())
        } else {
            Err(ReleaseError::Unauthorized {
                caller: *caller,
                account: *from,
            })
        }
    }

    /// Check, transfer, then book. `released` is the account's running
    /// released counter owned by the engine.
    pub fn settle(
        &mut self,
        tokens: &dyn TokenLedger,
        settlement: Settlement<'_>,
        released: &mut Amount,
    ) -> Result<(), ReleaseError> {
        if settlement.requested > settlement.releasable {
            return Err(ReleaseError::InsufficientAllocation {
                account: *settlement.account,
                requested: settlement.requested,
                releasable: settlement.releasable,
            });
        }
        let account_total = released
            .checked_add(settlement.requested)
            .ok_or(MathError::Overflow)?;
        let grand_total = self
            .total_released
            .checked_add(settlement.requested)
            .ok_or(MathError::Overflow)?;

        if settlement.requested > 0 {
            tokens.transfer(settlement.custody, settlement.to, settlement.requested)?;
        }

        *released = account_total;
        self.total_released = grand_total;

        info!(
            target: "treasury",
            "Released {} of {} to {} (account total {}, grand total {})",
            settlement.requested,
            settlement.account,
            settlement.to,
            account_total,
            grand_total
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_ledger::{InMemoryTokenLedger, MockTokenLedger};

    fn parties() -> (Address, Address, Address, Address) {
        (
            Address::from_label("custody"),
            Address::from_label("alice"),
            Address::from_label("bob"),
            Address::from_label("operator"),
        )
    }

    #[test]
    fn self_only_policy_rejects_operators() {
        let (_, alice, bob, operator) = parties();
        let mut roles = RoleRegistry::with_admin(alice);
        roles.grant(&alice, Role::Releaser, operator).unwrap();
        let controller = ReleaseController::new(ReleasePolicy::SelfOnly);

        assert!(controller.authorize(&roles, &alice, &alice, &bob).is_ok());
        assert!(controller.authorize(&roles, &operator, &alice, &alice).is_err());
    }

    #[test]
    fn operator_may_only_push_to_owner() {
        let (_, alice, bob, operator) = parties();
        let mut roles = RoleRegistry::with_admin(alice);
        roles.grant(&alice, Role::Releaser, operator).unwrap();
        let controller = ReleaseController::new(ReleasePolicy::SelfOrOperatorToSelf);

        assert!(controller.authorize(&roles, &operator, &alice, &alice).is_ok());
        assert_eq!(
            controller.authorize(&roles, &operator, &alice, &bob),
            Err(ReleaseError::Unauthorized {
                caller: operator,
                account: alice
            })
        );
        assert!(controller.authorize(&roles, &bob, &alice, &alice).is_err());
    }

    #[test]
    fn settle_moves_tokens_and_books() {
        let (custody, alice, bob, _) = parties();
        let tokens = InMemoryTokenLedger::new();
        tokens.mint(&custody, 500).unwrap();
        let mut controller = ReleaseController::new(ReleasePolicy::SelfOnly);
        let mut released = 0;

        let settlement = Settlement {
            custody: &custody,
            account: &alice,
            to: &bob,
            requested: 200,
            releasable: 300,
        };
        controller.settle(&tokens, settlement, &mut released).unwrap();

        assert_eq!(released, 200);
        assert_eq!(controller.total_released(), 200);
        assert_eq!(tokens.balance_of(&bob), 200);
        assert_eq!(tokens.balance_of(&custody), 300);
    }

    #[test]
    fn settle_rejects_over_release() {
        let (custody, alice, _, _) = parties();
        let tokens = InMemoryTokenLedger::new();
        let mut controller = ReleaseController::new(ReleasePolicy::SelfOnly);
        let mut released = 0;
        let settlement = Settlement {
            custody: &custody,
            account: &alice,
            to: &alice,
            requested: 11,
            releasable: 10,
        };
        let err = controller.settle(&tokens, settlement, &mut released).unwrap_err();
        assert!(matches!(err, ReleaseError::InsufficientAllocation { requested: 11, releasable: 10, .. }));
        assert_eq!(released, 0);
    }

    #[test]
    fn failed_transfer_leaves_books_untouched() {
        let (custody, alice, _, _) = parties();
        let tokens = MockTokenLedger::new();
        tokens.mint(&custody, 100).unwrap();
        tokens.fail_next_transfer();
        let mut controller = ReleaseController::new(ReleasePolicy::SelfOnly);
        let mut released = 5;
        let settlement = Settlement {
            custody: &custody,
            account: &alice,
            to: &alice,
            requested: 50,
            releasable: 50,
        };
        assert!(controller.settle(&tokens, settlement, &mut released).is_err());
        assert_eq!(released, 5);
        assert_eq!(controller.total_released(), 0);
        assert_eq!(tokens.balance_of(&custody), 100);
    }
}
