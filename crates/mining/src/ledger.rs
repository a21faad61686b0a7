//! Mining-power reward ledger
//!
//! Rewards are pulled from an upstream `RewardSource` into the ledger's own
//! custody account and split by mining power with a single accumulator:
//! `acc_reward_per_power` grows by `pulled * PRECISION / total_mining_power`
//! at every pull. An account's mined total is
//! `mining_power * acc_reward_per_power / PRECISION - reward_debt`, where the
//! signed `reward_debt` absorbs every power change so that changing one
//! mission's weight never touches any other account.
//!
//! Every mutating entry point pulls first. Rewards pulled while no mining
//! power exists are held unattributed and can only leave through
//! [`MiningPowerLedger::sweep_excess`].

use accrual_treasury::{
    ReleaseController, ReleaseError, ReleasePolicy, Role, RoleRegistry, Settlement, SharedRewardSource,
    SharedTokenLedger, SharedUnitLedger,
};
use accrual_types::{
    mul_div, mul_div_rem, to_signed, Address, Amount, AssetClass, BlockNumber, CallContext, FixedRatio, MathError, UnitId,
    PRECISION,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

use crate::checker::{CompletionQuery, SharedChecker};
use crate::errors::{MiningError, Result, UnitGroup};
use crate::mission::{AssetClasses, CandidateEvaluation, Mission, MissionBook, MissionCandidate, MissionId};
use crate::oracle::SharedOracle;
use crate::params::{completion_ratio, LedgerParams};

/// Global accounting state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Cumulative reward per unit of mining power, scaled by `PRECISION`.
    pub acc_reward_per_power: u128,
    pub total_mining_power: Amount,
    /// Rewards pulled while mining power was nonzero.
    pub total_mined: Amount,
    pub completion_multiplier: FixedRatio,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub mining_power: Amount,
    pub released: Amount,
    /// Whole units of reward debt.
    pub reward_debt: i128,
    /// Sub-unit part of the debt, scaled by `PRECISION` (always below it).
    pub debt_remainder: u128,
}

impl UserAccount {
    /// Rewards mined at accumulator value `acc`:
    /// `floor((mining_power * acc - debt * PRECISION) / PRECISION)`.
    pub fn mined_at(&self, acc: u128) -> Result<Amount> {
        let (gross, remainder) = mul_div_rem(self.mining_power, acc, PRECISION)?;
        let borrow = i128::from(remainder < self.debt_remainder);
        let net = to_signed(gross)?
            .checked_sub(self.reward_debt)
            .and_then(|net| net.checked_sub(borrow))
            .ok_or(MathError::Overflow)?;
        Ok(u128::try_from(net).unwrap_or(0))
    }

    /// Add `delta * acc / PRECISION` to the debt, exactly.
    fn add_debt(&mut self, delta: Amount, acc: u128) -> Result<()> {
        let (whole, part) = mul_div_rem(delta, acc, PRECISION)?;
        let mut remainder = self.debt_remainder + part;
        let mut carry = 0;
        if remainder >= PRECISION {
            remainder -= PRECISION;
            carry = 1;
        }
        self.reward_debt = self
            .reward_debt
            .checked_add(to_signed(whole)?)
            .and_then(|debt| debt.checked_add(carry))
            .ok_or(MathError::Overflow)?;
        self.debt_remainder = remainder;
        Ok(())
    }

    /// Subtract `delta * acc / PRECISION` from the debt, exactly.
    fn sub_debt(&mut self, delta: Amount, acc: u128) -> Result<()> {
        let (whole, part) = mul_div_rem(delta, acc, PRECISION)?;
        let (remainder, borrow) = if self.debt_remainder >= part {
            (self.debt_remainder - part, 0)
        } else {
            (self.debt_remainder + PRECISION - part, 1)
        };
        self.reward_debt = self
            .reward_debt
            .checked_sub(to_signed(whole)?)
            .and_then(|debt| debt.checked_sub(borrow))
            .ok_or(MathError::Overflow)?;
        self.debt_remainder = remainder;
        Ok(())
    }
}

/// Serializable view of a ledger's full state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub address: Address,
    pub state: LedgerState,
    pub paused: bool,
    pub max_payloads: usize,
    pub classes: AssetClasses,
    pub total_released: Amount,
    pub users: HashMap<Address, UserAccount>,
    pub missions: MissionBook,
    pub roles: RoleRegistry,
}

/// Power changes computed ahead of a commit.
struct PowerUpdate {
    users: HashMap<Address, UserAccount>,
    powers: Vec<(MissionId, Amount)>,
    total_mining_power: Amount,
}

pub struct MiningPowerLedger {
    address: Address,
    tokens: SharedTokenLedger,
    units: SharedUnitLedger,
    source: SharedRewardSource,
    oracle: Option<SharedOracle>,
    checker: Option<SharedChecker>,
    roles: RoleRegistry,
    max_payloads: usize,
    classes: AssetClasses,
    state: LedgerState,
    users: HashMap<Address, UserAccount>,
    missions: MissionBook,
    controller: ReleaseController,
    paused: bool,
}

impl MiningPowerLedger {
    /// Create a ledger whose custody account is `address`, pulling rewards
    /// from `source`. Asset classes, the oracle and the completion checker
    /// are configured afterwards by `admin`.
    pub fn new(
        address: Address,
        tokens: SharedTokenLedger,
        units: SharedUnitLedger,
        source: SharedRewardSource,
        admin: Address,
        params: LedgerParams,
    ) -> Result<Self> {
        let completion_multiplier = params.completion_multiplier()?;
        info!(
            target: "mining",
            "Mining ledger {} created: max {} payloads, completion multiplier {}",
            address, params.max_payloads, completion_multiplier
        );
        Ok(Self {
            address,
            tokens,
            units,
            source,
            oracle: None,
            checker: None,
            roles: RoleRegistry::with_admin(admin),
            max_payloads: params.max_payloads,
            classes: AssetClasses::default(),
            state: LedgerState {
                completion_multiplier,
                ..Default::default()
            },
            users: HashMap::new(),
            missions: MissionBook::default(),
            controller: ReleaseController::new(ReleasePolicy::SelfOnly),
            paused: false,
        })
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn max_payloads(&self) -> usize {
        self.max_payloads
    }

    pub fn asset_classes(&self) -> &AssetClasses {
        &self.classes
    }

    pub fn acc_reward_per_power(&self) -> u128 {
        self.state.acc_reward_per_power
    }

    pub fn total_mining_power(&self) -> Amount {
        self.state.total_mining_power
    }

    pub fn total_mined(&self) -> Amount {
        self.state.total_mined
    }

    pub fn completion_multiplier(&self) -> FixedRatio {
        self.state.completion_multiplier
    }

    pub fn total_released(&self) -> Amount {
        self.controller.total_released()
    }

    pub fn released(&self, account: &Address) -> Amount {
        self.users.get(account).map_or(0, |u| u.released)
    }

    pub fn user_account(&self, account: &Address) -> Option<&UserAccount> {
        self.users.get(account)
    }

    pub fn mining_power_of(&self, account: &Address) -> Amount {
        self.users.get(account).map_or(0, |u| u.mining_power)
    }

    pub fn mission(&self, id: MissionId) -> Option<&Mission> {
        self.missions.get(id)
    }

    /// Number of missions ever staked, including unstaked ones.
    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }

    /// Currently staked missions owned by `owner`.
    pub fn missions_of(&self, owner: &Address) -> &[MissionId] {
        self.missions.staked_by(owner)
    }

    pub fn active_missions(&self) -> &[MissionId] {
        self.missions.active()
    }

    /// What the next pull would fetch at block `now`.
    pub fn pending_pull(&self, now: BlockNumber) -> Result<Amount> {
        if self.paused {
            return Ok(0);
        }
        Ok(self.source.releasable(&self.address, now)?)
    }

    /// Total mined by `account` as of `now`, counting rewards the source
    /// holds for the ledger but that have not been pulled yet.
    pub fn mined_of(&self, account: &Address, now: BlockNumber) -> Result<Amount> {
        let Some(user) = self.users.get(account) else {
            return Ok(0);
        };
        user.mined_at(self.acc_at(now)?)
    }

    pub fn releasable(&self, account: &Address, now: BlockNumber) -> Result<Amount> {
        Ok(self
            .mined_of(account, now)?
            .saturating_sub(self.released(account)))
    }

    /// Custody balance not owed to any account.
    pub fn excess(&self) -> Amount {
        let owed = self
            .state
            .total_mined
            .saturating_sub(self.controller.total_released());
        self.tokens.balance_of(&self.address).saturating_sub(owed)
    }

    /// Validate and appraise a candidate mission without staking it.
    pub fn evaluate_candidate(&self, candidate: &MissionCandidate) -> Result<CandidateEvaluation> {
        if let Some(defect) = candidate.shape_defect(self.max_payloads) {
            return Ok(CandidateEvaluation::invalid(defect));
        }
        for (group, ids) in candidate.groups() {
            if !ids.is_empty() {
                if let Err(defect) = self.classes.require(group) {
                    return Ok(CandidateEvaluation::invalid(defect));
                }
            }
        }
        let oracle = self.oracle.as_ref().ok_or(MiningError::OracleNotConfigured)?;

        let mut power: Amount = 0;
        for (group, ids) in candidate.groups() {
            let Some(class) = self.classes.get(group).filter(|_| !ids.is_empty()) else {
                continue;
            };
            power = power
                .checked_add(oracle.total_value_of(class, ids)?)
                .ok_or(MathError::Overflow)?;
        }

        let completion_bonus = candidate.is_full() && self.is_complete(candidate);
        if completion_bonus {
            power = self.state.completion_multiplier.apply(power)?;
        }
        Ok(CandidateEvaluation {
            defect: None,
            mining_power: power,
            completion_bonus,
        })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            address: self.address,
            state: self.state.clone(),
            paused: self.paused,
            max_payloads: self.max_payloads,
            classes: self.classes.clone(),
            total_released: self.controller.total_released(),
            users: self.users.clone(),
            missions: self.missions.clone(),
            roles: self.roles.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Pull
    // -------------------------------------------------------------------------

    /// Pull everything the source holds for this ledger and attribute it.
    ///
    /// Permissionless and idempotent within a block. Does nothing while
    /// paused. Returns the amount pulled.
    pub fn update(&mut self, now: BlockNumber) -> Result<Amount> {
        if self.paused {
            return Ok(0);
        }
        let pulled = self.source.releasable(&self.address, now)?;
        if pulled > 0 {
            let (acc, total_mined) = self.accrue(pulled)?;
            let ctx = CallContext::new(self.address, now);
            self.source
                .release_amount(&ctx, &self.address, &self.address, pulled)?;
            self.state.acc_reward_per_power = acc;
            self.state.total_mined = total_mined;

            if self.state.total_mining_power == 0 {
                warn!(
                    target: "mining",
                    "Pulled {} at block {} with no mining power; held unattributed",
                    pulled, now
                );
            } else {
                debug!(
                    target: "mining",
                    "Pulled {} at block {} across {} mining power (total mined {})",
                    pulled, now, self.state.total_mining_power, total_mined
                );
            }
        }
        Ok(pulled)
    }

    // -------------------------------------------------------------------------
    // Staking
    // -------------------------------------------------------------------------

    /// Lock the caller's units as a new mission whose power accrues to
    /// `beneficiary`, who also becomes the mission's owner.
    pub fn stake(&mut self, ctx: &CallContext, candidate: MissionCandidate, beneficiary: Address) -> Result<MissionId> {
        if self.paused {
            return Err(MiningError::Paused);
        }
        self.update(ctx.block)?;
        let evaluation = self.evaluate_candidate(&candidate)?;
        if let Some(defect) = evaluation.defect {
            return Err(MiningError::InvalidMission(defect));
        }
        let power = evaluation.mining_power;

        let mut user = self.users.get(&beneficiary).cloned().unwrap_or_default();
        let mut total = self.state.total_mining_power;
        shift_power(&mut user, &mut total, 0, power, self.state.acc_reward_per_power)?;

        self.move_units(&candidate, &ctx.caller, &self.address)?;

        self.users.insert(beneficiary, user);
        self.state.total_mining_power = total;
        let id = self.missions.insert(beneficiary, power, candidate, ctx.block);
        info!(
            target: "mining",
            "Mission {} staked by {} for {} at block {}: power {}{} (total {})",
            id,
            ctx.caller,
            beneficiary,
            ctx.block,
            power,
            if evaluation.completion_bonus { " incl. completion bonus" } else { "" },
            total
        );
        Ok(id)
    }

    /// Retire a mission and return its units to `destination`.
    pub fn unstake(&mut self, ctx: &CallContext, id: MissionId, destination: &Address) -> Result<()> {
        let mission = self.staked_mission(id)?;
        if mission.owner != ctx.caller {
            return Err(MiningError::NotMissionOwner {
                mission: id,
                caller: ctx.caller,
            });
        }
        self.update(ctx.block)?;

        let mission = self.staked_mission(id)?;
        let (owner, power, units) = (mission.owner, mission.mining_power, mission.units.clone());
        let mut user = self.users.get(&owner).cloned().unwrap_or_default();
        let mut total = self.state.total_mining_power;
        shift_power(&mut user, &mut total, power, 0, self.state.acc_reward_per_power)?;

        self.move_units(&units, &self.address, destination)?;

        self.users.insert(owner, user);
        self.state.total_mining_power = total;
        self.missions.retire(id, ctx.block);
        info!(
            target: "mining",
            "Mission {} unstaked by {} at block {}: power {} removed (total {}), units sent to {}",
            id, owner, ctx.block, power, total, destination
        );
        Ok(())
    }

    /// Re-appraise one staked mission against the current oracle, checker
    /// and multiplier. Anyone may call this. Returns the new power.
    pub fn reappraise(&mut self, ctx: &CallContext, id: MissionId) -> Result<Amount> {
        let powers = self.reappraise_many(ctx, &[id])?;
        Ok(powers.first().copied().unwrap_or(0))
    }

    /// Re-appraise several staked missions in order. Either every mission is
    /// re-appraised or none is.
    pub fn reappraise_many(&mut self, ctx: &CallContext, ids: &[MissionId]) -> Result<Vec<Amount>> {
        for id in ids {
            self.staked_mission(*id)?;
        }
        self.update(ctx.block)?;

        let mut changes = Vec::with_capacity(ids.len());
        for id in ids {
            let mission = self.staked_mission(*id)?;
            let evaluation = self.evaluate_candidate(&mission.units)?;
            if let Some(defect) = evaluation.defect {
                return Err(MiningError::InvalidMission(defect));
            }
            changes.push((*id, evaluation.mining_power));
        }
        let update = self.stage_power_changes(&changes)?;

        for (id, power) in &update.powers {
            if let Some(mission) = self.missions.get_mut(*id) {
                if mission.mining_power != *power {
                    info!(
                        target: "mining",
                        "Mission {} re-appraised at block {}: power {} -> {}",
                        id, ctx.block, mission.mining_power, power
                    );
                }
                mission.mining_power = *power;
            }
        }
        self.users.extend(update.users);
        self.state.total_mining_power = update.total_mining_power;
        Ok(changes.into_iter().map(|(_, power)| power).collect())
    }

    // -------------------------------------------------------------------------
    // Release
    // -------------------------------------------------------------------------

    /// Release everything releasable for `from` to `to`. Only `from` may call.
    pub fn release(&mut self, ctx: &CallContext, from: &Address, to: &Address) -> Result<Amount> {
        self.release_inner(ctx, from, to, None)
    }

    /// Release exactly `amount` for `from` to `to`. Only `from` may call.
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

        // The view already counts the pending pull, so an oversized request
        // is rejected before anything is pulled.
        let expected = self.releasable(from, ctx.block)?;
        let requested = amount.unwrap_or(expected);
        if requested > expected {
            return Err(ReleaseError::InsufficientAllocation {
                account: *from,
                requested,
                releasable: expected,
            }
            .into());
        }

        self.update(ctx.block)?;
        let acc = self.state.acc_reward_per_power;
        let Some(user) = self.users.get_mut(from) else {
            return Ok(0);
        };
        let releasable = user.mined_at(acc)?.saturating_sub(user.released);

        self.controller.settle(
            self.tokens.as_ref(),
            Settlement {
                custody: &self.address,
                account: from,
                to,
                requested,
                releasable,
            },
            &mut user.released,
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

    /// Bank anything pending, then stop pulling and accepting stakes.
    pub fn pause(&mut self, ctx: &CallContext) -> Result<()> {
        self.roles.require(Role::Pauser, &ctx.caller)?;
        if self.paused {
            return Err(MiningError::AlreadyPaused);
        }
        self.update(ctx.block)?;
        self.paused = true;
        info!(target: "mining", "Ledger paused by {} at block {}", ctx.caller, ctx.block);
        Ok(())
    }

    /// Resume and immediately pull. Returns the amount pulled.
    pub fn unpause(&mut self, ctx: &CallContext) -> Result<Amount> {
        self.roles.require(Role::Pauser, &ctx.caller)?;
        if !self.paused {
            return Err(MiningError::NotPaused);
        }
        self.paused = false;
        match self.update(ctx.block) {
            Ok(pulled) => {
                info!(
                    target: "mining",
                    "Ledger unpaused by {} at block {}, pulled {}",
                    ctx.caller, ctx.block, pulled
                );
                Ok(pulled)
            }
            Err(err) => {
                self.paused = true;
                Err(err)
            }
        }
    }

    /// Configure the asset class of one unit group. Each group is set once.
    pub fn set_asset_class(&mut self, ctx: &CallContext, group: UnitGroup, class: AssetClass) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        let slot = self.classes.slot_mut(group);
        if let Some(current) = slot {
            return Err(MiningError::AssetClassAlreadySet {
                group,
                current: current.clone(),
            });
        }
        info!(target: "mining", "{:?} asset class set to {}", group, class);
        *slot = Some(class);
        Ok(())
    }

    /// Replace the appraisal oracle. Staked missions keep their power until
    /// re-appraised.
    pub fn set_oracle(&mut self, ctx: &CallContext, oracle: SharedOracle) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        self.oracle = Some(oracle);
        info!(target: "mining", "Appraisal oracle replaced at block {}", ctx.block);
        Ok(())
    }

    /// Install or remove the completion checker. Without one, every full
    /// mission earns the completion bonus.
    pub fn set_completion_checker(&mut self, ctx: &CallContext, checker: Option<SharedChecker>) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        info!(
            target: "mining",
            "Completion checker {} at block {}",
            if checker.is_some() { "installed" } else { "removed" },
            ctx.block
        );
        self.checker = checker;
        Ok(())
    }

    pub fn set_completion_multiplier(&mut self, ctx: &CallContext, numerator: u128, denominator: u128) -> Result<()> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        let multiplier = completion_ratio(numerator, denominator)?;
        let old = self.state.completion_multiplier;
        self.state.completion_multiplier = multiplier;
        info!(
            target: "mining",
            "Completion multiplier changed {} -> {} at block {}",
            old, multiplier, ctx.block
        );
        Ok(())
    }

    /// Pull, then send custody tokens not owed to any account to `to`.
    pub fn sweep_excess(&mut self, ctx: &CallContext, to: &Address) -> Result<Amount> {
        self.roles.require(Role::Admin, &ctx.caller)?;
        self.update(ctx.block)?;
        let excess = self.excess();
        if excess > 0 {
            self.tokens.transfer(&self.address, to, excess)?;
        }
        info!(
            target: "mining",
            "Swept {} excess to {} at block {}",
            excess, to, ctx.block
        );
        Ok(excess)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Accumulator and mined total after attributing `pulled`.
    fn accrue(&self, pulled: Amount) -> Result<(u128, Amount)> {
        let state = &self.state;
        if state.total_mining_power == 0 {
            return Ok((state.acc_reward_per_power, state.total_mined));
        }
        let step = mul_div(pulled, PRECISION, state.total_mining_power)?;
        let acc = state
            .acc_reward_per_power
            .checked_add(step)
            .ok_or(MathError::Overflow)?;
        let total_mined = state
            .total_mined
            .checked_add(pulled)
            .ok_or(MathError::Overflow)?;
        Ok((acc, total_mined))
    }

    /// Accumulator as it would be after a pull at `now`.
    fn acc_at(&self, now: BlockNumber) -> Result<u128> {
        if self.paused || self.state.total_mining_power == 0 {
            return Ok(self.state.acc_reward_per_power);
        }
        let pending = self.source.releasable(&self.address, now)?;
        Ok(self.accrue(pending)?.0)
    }

    fn is_complete(&self, candidate: &MissionCandidate) -> bool {
        let Some(checker) = &self.checker else {
            return true;
        };
        let (Some(lander_class), Some(site_class), Some(payload_class)) =
            (&self.classes.lander, &self.classes.site, &self.classes.payload)
        else {
            return false;
        };
        checker.check(&CompletionQuery {
            lander_class,
            landers: &candidate.landers,
            site_class,
            sites: &candidate.sites,
            payload_class,
            payloads: &candidate.payloads,
        })
    }

    fn staked_mission(&self, id: MissionId) -> Result<&Mission> {
        let mission = self
            .missions
            .get(id)
            .ok_or(MiningError::MissionNotFound(id))?;
        if !mission.staked {
            return Err(MiningError::MissionNotStaked(id));
        }
        Ok(mission)
    }

    fn stage_power_changes(&self, changes: &[(MissionId, Amount)]) -> Result<PowerUpdate> {
        let acc = self.state.acc_reward_per_power;
        let mut users: HashMap<Address, UserAccount> = HashMap::new();
        let mut current: HashMap<MissionId, Amount> = HashMap::new();
        let mut total = self.state.total_mining_power;
        let mut seen = HashSet::new();
        let mut powers = Vec::with_capacity(changes.len());

        for (id, new_power) in changes {
            let mission = self.staked_mission(*id)?;
            let old_power = current.get(id).copied().unwrap_or(mission.mining_power);
            let user = users
                .entry(mission.owner)
                .or_insert_with(|| self.users.get(&mission.owner).cloned().unwrap_or_default());
            shift_power(user, &mut total, old_power, *new_power, acc)?;
            current.insert(*id, *new_power);
            if seen.insert(*id) {
                powers.push((*id, *new_power));
            }
        }
        for (id, power) in &mut powers {
            if let Some(latest) = current.get(id) {
                *power = *latest;
            }
        }
        Ok(PowerUpdate {
            users,
            powers,
            total_mining_power: total,
        })
    }

    /// Transfer every unit of `units` from `from` to `to`, undoing the
    /// transfers already made if any one fails.
    fn move_units(&self, units: &MissionCandidate, from: &Address, to: &Address) -> Result<()> {
        let mut moves: Vec<(&AssetClass, UnitId)> = Vec::new();
        for (group, ids) in units.groups() {
            if ids.is_empty() {
                continue;
            }
            let class = self
                .classes
                .require(group)
                .map_err(MiningError::InvalidMission)?;
            moves.extend(ids.iter().map(|id| (class, *id)));
        }

        for (done, (class, id)) in moves.iter().enumerate() {
            if let Err(err) = self.units.transfer(class, from, to, *id) {
                for (class, id) in moves[..done].iter().rev() {
                    if let Err(undo) = self.units.transfer(class, to, from, *id) {
                        error!(
                            target: "mining",
                            "Failed to return unit {}#{} to {} during rollback: {}",
                            class, id, from, undo
                        );
                    }
                }
                return Err(err.into());
            }
        }
        Ok(())
    }
}

/// Move `user` and the ledger total from `old` to `new` power, adjusting the
/// reward debt by exactly `(new - old) * acc / PRECISION` so the user's mined
/// amount is unchanged at `acc`. Raising and then lowering power at the same
/// accumulator leaves the debt where it was.
fn shift_power(user: &mut UserAccount, total: &mut Amount, old: Amount, new: Amount, acc: u128) -> Result<()> {
    if new >= old {
        let delta = new - old;
        user.add_debt(delta, acc)?;
        user.mining_power = user
            .mining_power
            .checked_add(delta)
            .ok_or(MathError::Overflow)?;
        *total = total.checked_add(delta).ok_or(MathError::Overflow)?;
    } else {
        let delta = old - new;
        user.sub_debt(delta, acc)?;
        user.mining_power = user
            .mining_power
            .checked_sub(delta)
            .ok_or(MathError::Overflow)?;
        *total = total.checked_sub(delta).ok_or(MathError::Overflow)?;
    }
    Ok(())
}
