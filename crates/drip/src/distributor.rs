//! Share drip distributor
//!
//! Emits `tokens_per_block` linearly and splits it among recipients in
//! proportion to their integer shares. Nothing iterates over elapsed blocks:
//! the distributor stores a snapshot of the running allocation total plus a
//! per-share accumulator, and every read interpolates from the snapshot.
//!
//! Any change of shares, rate or clock first checkpoints the global state and
//! the affected recipients, so allocation already accrued is never repriced.

use accrual_treasury::{
    ReleaseController, ReleaseError, ReleasePolicy, Role, RoleRegistry, Settlement, SharedTokenLedger,
};
use accrual_types::{mul_div, Address, Amount, BlockNumber, CallContext, MathError, PRECISION};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::errors::{DripError, Result};
use crate::params::{validate_rate, DripParams};
use crate::recipients::{Checkpoint, RecipientAccount, RecipientSet};

/// Global accrual state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorState {
    pub tokens_per_block: Amount,
    pub total_shares: u128,
    /// Block the snapshot below was taken at, or the pending start block.
    pub last_update_block: BlockNumber,
    pub total_allocated_snapshot: Amount,
    /// Cumulative allocation per share, scaled by `PRECISION`.
    pub allocated_per_share: u128,
}

/// Serializable view of a distributor's full state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorSnapshot {
    pub address: Address,
    pub state: DistributorState,
    pub total_released: Amount,
    pub recipients: RecipientSet,
    pub roles: RoleRegistry,
}

pub struct ShareDripDistributor {
    address: Address,
    tokens: SharedTokenLedger,
    roles: RoleRegistry,
    state: DistributorState,
    recipients: RecipientSet,
    controller: ReleaseController,
}

impl ShareDripDistributor {
    /// Create a distributor whose custody account is `address`.
    ///
    /// Funding is whatever `tokens` credits to `address`; allocation never
    /// exceeds what has been funded.
    pub fn new(address: Address, tokens: SharedTokenLedger, admin: Address, params: DripParams) -> Result<Self> {
        params.validate()?;
        info!(
            target: "drip",
            "Distributor {} created: {} tokens/block from block {}",
            address, params.tokens_per_block, params.start_block
        );
        Ok(Self {
            address,
            tokens,
            roles: RoleRegistry::with_admin(admin),
            state: DistributorState {
                tokens_per_block: params.tokens_per_block,
                last_update_block: params.start_block,
                ..Default::default()
            },
            recipients: RecipientSet::default(),
            controller: ReleaseController::new(ReleasePolicy::SelfOrOperatorToSelf),
        })
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> &DistributorState {
        &self.state
    }

    pub fn tokens_per_block(&self) -> Amount {
        self.state.tokens_per_block
    }

    pub fn total_shares(&self) -> u128 {
        self.state.total_shares
    }

    pub fn last_update_block(&self) -> BlockNumber {
        self.state.last_update_block
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn recipient(&self, address: &Address) -> Option<&RecipientAccount> {
        self.recipients.get(address)
    }

    pub fn shares_of(&self, address: &Address) -> u128 {
        self.recipients.shares_of(address)
    }

    /// Active recipients in index order.
    pub fn recipients(&self) -> &[Address] {
        self.recipients.active()
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients.active_len()
    }

    pub fn total_released(&self) -> Amount {
        self.controller.total_released()
    }

    pub fn released(&self, address: &Address) -> Amount {
        self.recipients.get(address).map_or(0, |a| a.released)
    }

    /// Total ever allocated across all recipients as of block `now`.
    pub fn total_allocated(&self, now: BlockNumber) -> Result<Amount> {
        Ok(self.checkpoint_at(now)?.total_allocated)
    }

    /// Total ever allocated to `address` as of block `now`.
    pub fn allocated_of(&self, address: &Address, now: BlockNumber) -> Result<Amount> {
        let Some(account) = self.recipients.get(address) else {
            return Ok(0);
        };
        if account.shares == 0 || now <= account.last_update_block {
            return Ok(account.allocated_snapshot);
        }
        let mark = self.checkpoint_at(now)?;
        Ok(account.allocated_at(mark.allocated_per_share)?)
    }

    pub fn releasable(&self, address: &Address, now: BlockNumber) -> Result<Amount> {
        let allocated = self.allocated_of(address, now)?;
        Ok(allocated.saturating_sub(self.released(address)))
    }

    pub fn snapshot(&self) -> DistributorSnapshot {
        DistributorSnapshot {
            address: self.address,
            state: self.state.clone(),
            total_released: self.controller.total_released(),
            recipients: self.recipients.clone(),
            roles: self.roles.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Release
    // -------------------------------------------------------------------------

    /// Release everything releasable for `from` to `to`.
    pub fn release(&mut self, ctx: &CallContext, from: &Address, to: &Address) -> Result<Amount> {
        self.release_inner(ctx, from, to, None)
    }

    /// Release exactly `amount` for `from` to `to`.
    pub fn release_amount(&mut self, ctx: &CallContext, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.release_inner(ctx, from, to, Some(amount)).map(|_| ())
    }

    fn release_inner(
        &mut self,
        ctx: &CallContext,
        from: &Address,
        to: &Address,
        amount: Option<Amount>,
    ) -> Result<Amount> {
        self.controller
            .authorize(&self.roles, &ctx.caller, from, to)?;

        if self.recipients.get(from).is_none() {
            return match amount {
                None | Some(0) => Ok(0),
                Some(requested) => Err(ReleaseError::InsufficientAllocation {
                    account: *from,
                    requested,
                    releasable: 0,
                }
                .into()),
            };
        }

        let mark = self.update_global(ctx.block)?;
        let account = self.recipients.checkpoint(from, &mark)?;
        let releasable = account.allocated_snapshot.saturating_sub(account.released);
        let requested = amount.unwrap_or(releasable);

        self.controller.settle(
            self.tokens.as_ref(),
            Settlement {
                custody: &self.address,
                account: from,
                to,
                requested,
                releasable,
            },
            &mut account.released,
        )?;
        Ok(requested)
    }

    // -------------------------------------------------------------------------
    // Administration
    // -------------------------------------------------------------------------

    pub fn grant_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> Result<()> {
        Ok(self.roles.grant(&ctx.caller, role, account)?)
    }

    pub fn revoke_role(&mut self, ctx: &CallContext, role: Role, account: &Address) -> Result<()> {
        Ok(self.roles.revoke(&ctx.caller, role, account)?)
    }

    /// Replace the whole recipient list.
    pub fn set_recipients(&mut self, ctx: &CallContext, recipients: &[Address], shares: &[u128]) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        if recipients.len() != shares.len() {
            return Err(DripError::ShareListLengthMismatch {
                recipients: recipients.len(),
                shares: shares.len(),
            });
        }
        let mut seen = HashSet::with_capacity(recipients.len());
        let mut total_shares: u128 = 0;
        for (address, share) in recipients.iter().zip(shares) {
            if !seen.insert(*address) {
                return Err(DripError::DuplicateRecipient(*address));
            }
            if *share == 0 {
                return Err(DripError::ZeroShares(*address));
            }
            total_shares = total_shares
                .checked_add(*share)
                .ok_or(MathError::Overflow)?;
        }

        let mark = self.update_all(ctx.block)?;
        self.recipients.clear_active();
        for (address, share) in recipients.iter().zip(shares) {
            self.recipients.checkpoint(address, &mark)?;
            self.recipients.assign_shares(address, *share);
        }
        self.state.total_shares = total_shares;

        info!(
            target: "drip",
            "Recipient list replaced at block {}: {} recipients, {} total shares",
            ctx.block,
            recipients.len(),
            total_shares
        );
        Ok(())
    }

    /// Change one recipient's shares. Zero removes it from the active set.
    pub fn set_recipient_shares(&mut self, ctx: &CallContext, recipient: &Address, shares: u128) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        let old = self.recipients.shares_of(recipient);
        let total_shares = self
            .state
            .total_shares
            .checked_sub(old)
            .and_then(|rest| rest.checked_add(shares))
            .ok_or(MathError::Overflow)?;

        let mark = self.update_global(ctx.block)?;
        if old == 0 && shares == 0 {
            return Ok(());
        }
        self.recipients.checkpoint(recipient, &mark)?;
        self.recipients.assign_shares(recipient, shares);
        self.state.total_shares = total_shares;

        info!(
            target: "drip",
            "Shares of {} changed {} -> {} at block {} (total {})",
            recipient, old, shares, ctx.block, total_shares
        );
        Ok(())
    }

    pub fn set_tokens_per_block(&mut self, ctx: &CallContext, tokens_per_block: Amount) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        validate_rate(tokens_per_block)?;
        self.update_all(ctx.block)?;
        let old = self.state.tokens_per_block;
        self.state.tokens_per_block = tokens_per_block;
        info!(
            target: "drip",
            "Emission rate changed {} -> {} at block {}",
            old, tokens_per_block, ctx.block
        );
        Ok(())
    }

    /// Move the accrual clock.
    ///
    /// A future block pauses accrual until it is reached. A past block never
    /// allocates retroactively: the clock is pegged to the current block.
    pub fn set_start_block(&mut self, ctx: &CallContext, start_block: BlockNumber) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        self.update_all(ctx.block)?;
        self.state.last_update_block = start_block.max(ctx.block);
        info!(
            target: "drip",
            "Start block set to {} at block {} (accrual resumes from {})",
            start_block, ctx.block, self.state.last_update_block
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Accounting internals
    // -------------------------------------------------------------------------

    /// Global values as they would be after a snapshot at `now`.
    fn checkpoint_at(&self, now: BlockNumber) -> Result<Checkpoint> {
        let state = &self.state;
        let mut mark = Checkpoint {
            allocated_per_share: state.allocated_per_share,
            total_allocated: state.total_allocated_snapshot,
            block: now,
        };
        if now <= state.last_update_block {
            return Ok(mark);
        }

        let elapsed = u128::from(now - state.last_update_block);
        let emitted = state
            .tokens_per_block
            .checked_mul(elapsed)
            .ok_or(MathError::Overflow)?;
        let funded = self
            .tokens
            .balance_of(&self.address)
            .saturating_add(self.controller.total_released())
            .max(state.total_allocated_snapshot);
        let total = state
            .total_allocated_snapshot
            .saturating_add(emitted)
            .min(funded);

        if state.total_shares > 0 {
            let delta = total - state.total_allocated_snapshot;
            let per_share = mul_div(delta, PRECISION, state.total_shares)?;
            mark.allocated_per_share = state
                .allocated_per_share
                .checked_add(per_share)
                .ok_or(MathError::Overflow)?;
        }
        mark.total_allocated = total;
        Ok(mark)
    }

    fn update_global(&mut self, now: BlockNumber) -> Result<Checkpoint> {
        let mark = self.checkpoint_at(now)?;
        if now > self.state.last_update_block {
            self.state.allocated_per_share = mark.allocated_per_share;
            self.state.total_allocated_snapshot = mark.total_allocated;
            self.state.last_update_block = now;
            debug!(
                target: "drip",
                "Snapshot at block {}: total allocated {}",
                now, mark.total_allocated
            );
        }
        Ok(mark)
    }

    fn update_all(&mut self, now: BlockNumber) -> Result<Checkpoint> {
        let mark = self.update_global(now)?;
        self.recipients.checkpoint_active(&mark)?;
        Ok(mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrual_treasury::{InMemoryTokenLedger, TokenLedger};
    use std::sync::Arc;

    struct Fixture {
        tokens: Arc<InMemoryTokenLedger>,
        drip: ShareDripDistributor,
        admin: Address,
        a: Address,
        b: Address,
        c: Address,
    }

    fn fixture(funding: Amount) -> Fixture {
        let tokens = Arc::new(InMemoryTokenLedger::new());
        let admin = Address::from_label("admin");
        let address = Address::from_label("drip");
        tokens.mint(&address, funding).unwrap();
        let mut drip = ShareDripDistributor::new(address, tokens.clone(), admin, DripParams::default()).unwrap();
        let (a, b, c) = (
            Address::from_label("a"),
            Address::from_label("b"),
            Address::from_label("c"),
        );
        drip.set_recipients(&CallContext::new(admin, 0), &[a, b, c], &[5, 3, 2])
            .unwrap();
        Fixture {
            tokens,
            drip,
            admin,
            a,
            b,
            c,
        }
    }

    #[test]
    fn splits_emission_by_shares() {
        let f = fixture(100_000);
        assert_eq!(f.drip.total_allocated(1).unwrap(), 100);
        assert_eq!(f.drip.releasable(&f.a, 1).unwrap(), 50);
        assert_eq!(f.drip.releasable(&f.b, 1).unwrap(), 30);
        assert_eq!(f.drip.releasable(&f.c, 1).unwrap(), 20);
    }

    #[test]
    fn release_then_continue_accruing() {
        let mut f = fixture(100_000);
        f.drip.release(&CallContext::new(f.a, 1), &f.a, &f.a).unwrap();
        assert_eq!(f.tokens.balance_of(&f.a), 50);

        assert_eq!(f.drip.releasable(&f.a, 20).unwrap(), 950);
        assert_eq!(f.drip.releasable(&f.b, 20).unwrap(), 600);
        assert_eq!(f.drip.releasable(&f.c, 20).unwrap(), 400);
        assert_eq!(f.drip.total_released(), 50);
    }

    #[test]
    fn over_release_rejected_without_effect() {
        let mut f = fixture(100_000);
        let err = f
            .drip
            .release_amount(&CallContext::new(f.a, 1), &f.a, &f.a, 51)
            .unwrap_err();
        assert!(matches!(
            err,
            DripError::Release(ReleaseError::InsufficientAllocation { requested: 51, releasable: 50, .. })
        ));
        assert_eq!(f.drip.released(&f.a), 0);
        assert_eq!(f.tokens.balance_of(&f.a), 0);
    }

    #[test]
    fn share_change_only_affects_future_blocks() {
        let mut f = fixture(100_000);
        let admin = CallContext::new(f.admin, 10);
        let before = [
            f.drip.releasable(&f.a, 10).unwrap(),
            f.drip.releasable(&f.b, 10).unwrap(),
            f.drip.releasable(&f.c, 10).unwrap(),
        ];
        f.drip.set_recipient_shares(&admin, &f.a, 0).unwrap();
        let after = [
            f.drip.releasable(&f.a, 10).unwrap(),
            f.drip.releasable(&f.b, 10).unwrap(),
            f.drip.releasable(&f.c, 10).unwrap(),
        ];
        assert_eq!(before, after);
        assert_eq!(f.drip.recipients(), &[f.c, f.b]);

        // Next 10 blocks split 3:2 between b and c; a is frozen.
        assert_eq!(f.drip.releasable(&f.a, 20).unwrap(), 500);
        assert_eq!(f.drip.releasable(&f.b, 20).unwrap(), 300 + 600);
        assert_eq!(f.drip.releasable(&f.c, 20).unwrap(), 200 + 400);
    }

    #[test]
    fn rate_change_keeps_accrued_allocation() {
        let mut f = fixture(100_000);
        f.drip
            .set_tokens_per_block(&CallContext::new(f.admin, 10), 1_000)
            .unwrap();
        assert_eq!(f.drip.allocated_of(&f.a, 10).unwrap(), 500);
        assert_eq!(f.drip.allocated_of(&f.a, 11).unwrap(), 1_000);
        assert_eq!(f.drip.total_allocated(11).unwrap(), 2_000);
    }

    #[test]
    fn future_start_block_pauses_accrual() {
        let mut f = fixture(100_000);
        f.drip
            .set_start_block(&CallContext::new(f.admin, 5), 50)
            .unwrap();
        assert_eq!(f.drip.last_update_block(), 50);
        assert_eq!(f.drip.total_allocated(30).unwrap(), 500);
        assert_eq!(f.drip.releasable(&f.a, 50).unwrap(), 250);
        assert_eq!(f.drip.releasable(&f.a, 51).unwrap(), 300);
    }

    #[test]
    fn past_start_block_does_not_allocate_retroactively() {
        let tokens = Arc::new(InMemoryTokenLedger::new());
        let admin = Address::from_label("admin");
        let address = Address::from_label("drip");
        tokens.mint(&address, 1_000_000).unwrap();
        let params = DripParams {
            tokens_per_block: 10,
            start_block: 1_000,
        };
        let mut drip = ShareDripDistributor::new(address, tokens, admin, params).unwrap();
        let a = Address::from_label("a");
        drip.set_recipients(&CallContext::new(admin, 100), &[a], &[1])
            .unwrap();

        drip.set_start_block(&CallContext::new(admin, 200), 0).unwrap();
        assert_eq!(drip.last_update_block(), 200);
        assert_eq!(drip.total_allocated(200).unwrap(), 0);
        assert_eq!(drip.allocated_of(&a, 210).unwrap(), 100);
    }

    #[test]
    fn allocation_clamped_to_funding() {
        let mut f = fixture(1_000);
        assert_eq!(f.drip.total_allocated(100).unwrap(), 1_000);
        assert_eq!(f.drip.releasable(&f.a, 100).unwrap(), 500);

        f.drip.release(&CallContext::new(f.a, 100), &f.a, &f.a).unwrap();
        // Releasing does not free room for more allocation.
        assert_eq!(f.drip.total_allocated(200).unwrap(), 1_000);

        f.tokens.mint(&f.drip.address(), 500).unwrap();
        assert_eq!(f.drip.total_allocated(200).unwrap(), 1_500);
    }

    #[test]
    fn set_recipients_validates_before_mutating() {
        let mut f = fixture(100_000);
        let ctx = CallContext::new(f.admin, 3);
        assert!(matches!(
            f.drip.set_recipients(&ctx, &[f.a, f.a], &[1, 1]),
            Err(DripError::DuplicateRecipient(_))
        ));
        assert!(matches!(
            f.drip.set_recipients(&ctx, &[f.a, f.b], &[1, 0]),
            Err(DripError::ZeroShares(_))
        ));
        assert!(matches!(
            f.drip.set_recipients(&ctx, &[f.a], &[1, 2]),
            Err(DripError::ShareListLengthMismatch { recipients: 1, shares: 2 })
        ));
        assert_eq!(f.drip.total_shares(), 10);
        assert_eq!(f.drip.recipient_count(), 3);
    }

    #[test]
    fn set_recipients_replaces_without_losing_accrual() {
        let mut f = fixture(100_000);
        let d = Address::from_label("d");
        f.drip
            .set_recipients(&CallContext::new(f.admin, 10), &[f.b, d], &[1, 1])
            .unwrap();
        assert_eq!(f.drip.total_shares(), 2);
        assert_eq!(f.drip.shares_of(&f.a), 0);
        assert_eq!(f.drip.allocated_of(&f.a, 20).unwrap(), 500);
        assert_eq!(f.drip.allocated_of(&f.b, 20).unwrap(), 300 + 500);
        assert_eq!(f.drip.allocated_of(&d, 20).unwrap(), 500);
    }

    #[test]
    fn zero_to_zero_share_change_is_safe() {
        let mut f = fixture(100_000);
        let stranger = Address::from_label("stranger");
        f.drip
            .set_recipient_shares(&CallContext::new(f.admin, 4), &stranger, 0)
            .unwrap();
        assert!(f.drip.recipient(&stranger).is_none());
        assert_eq!(f.drip.total_shares(), 10);
    }

    #[test]
    fn admin_operations_require_role() {
        let mut f = fixture(100_000);
        let ctx = CallContext::new(f.a, 1);
        assert!(matches!(
            f.drip.set_tokens_per_block(&ctx, 1),
            Err(DripError::Access(_))
        ));
        assert!(matches!(
            f.drip.set_recipient_shares(&ctx, &f.a, 100),
            Err(DripError::Access(_))
        ));
    }

    #[test]
    fn releaser_may_push_to_recipient_only() {
        let mut f = fixture(100_000);
        let bot = Address::from_label("bot");
        f.drip
            .grant_role(&CallContext::new(f.admin, 0), Role::Releaser, bot)
            .unwrap();

        let ctx = CallContext::new(bot, 2);
        assert!(matches!(
            f.drip.release(&ctx, &f.b, &bot),
            Err(DripError::Release(ReleaseError::Unauthorized { .. }))
        ));
        assert_eq!(f.drip.release(&ctx, &f.b, &f.b).unwrap(), 60);
        assert_eq!(f.tokens.balance_of(&f.b), 60);
    }

    #[test]
    fn snapshot_serialises() {
        let f = fixture(100_000);
        let json = serde_json::to_string(&f.drip.snapshot()).unwrap();
        let back: DistributorSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state, *f.drip.state());
        assert_eq!(back.recipients.active(), f.drip.recipients());
    }
}
