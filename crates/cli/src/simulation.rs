//! Scenario replay.
//!
//! Wires a funded distributor to a mining ledger (the ledger is always one of
//! the distributor's recipients), applies the scenario's events in block
//! order, and summarises every account at the final block. Blocks without
//! events are never visited; the engines interpolate across them. Failing events
//! are logged and recorded in the report; they do not stop the replay.

use accrual_drip::{ShareDripDistributor, SharedDistributor};
use accrual_mining::{
    checker_fn, InMemoryAppraisalOracle, MiningPowerLedger, MissionCandidate, SharedMiningLedger, UnitGroup,
};
use accrual_treasury::{InMemoryTokenLedger, InMemoryUnitLedger, TokenLedger, UnitLedger};
use accrual_types::{Address, Amount, AssetClass, BlockNumber, CallContext, UnitId};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::scenario::{Action, Scenario, ScheduledEvent};

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub block: BlockNumber,
    pub distributor: DistributorReport,
    pub ledger: LedgerReport,
    pub accounts: Vec<AccountReport>,
    pub events_applied: usize,
    pub failures: Vec<EventFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributorReport {
    pub address: Address,
    pub tokens_per_block: Amount,
    pub total_shares: u128,
    pub total_allocated: Amount,
    pub total_released: Amount,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerReport {
    pub address: Address,
    pub paused: bool,
    pub total_mining_power: Amount,
    pub total_mined: Amount,
    pub total_released: Amount,
    pub pending_pull: Amount,
    pub excess: Amount,
    pub missions: usize,
    pub active_missions: usize,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountReport {
    pub label: String,
    pub address: Address,
    pub balance: Amount,
    pub shares: u128,
    pub drip_released: Amount,
    pub drip_releasable: Amount,
    pub mining_power: Amount,
    pub released: Amount,
    pub releasable: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventFailure {
    pub at_block: BlockNumber,
    pub action: String,
    pub error: String,
}

pub struct Simulation {
    tokens: Arc<InMemoryTokenLedger>,
    units: Arc<InMemoryUnitLedger>,
    oracle: Arc<InMemoryAppraisalOracle>,
    drip: SharedDistributor,
    ledger: SharedMiningLedger,
    admin: Address,
    classes: BTreeMap<&'static str, AssetClass>,
    labels: BTreeMap<String, Address>,
    next_unit: UnitId,
}

impl Simulation {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let admin = Address::from_label("admin");
        let drip_address = Address::from_label("drip");
        let ledger_address = Address::from_label("ledger");
        let tokens = Arc::new(InMemoryTokenLedger::new());
        let units = Arc::new(InMemoryUnitLedger::new());

        tokens
            .mint(&drip_address, u128::from(scenario.drip.funding))
            .context("failed to fund distributor")?;
        let mut drip = ShareDripDistributor::new(drip_address, tokens.clone(), admin, scenario.drip.params())?;

        let mut labels = BTreeMap::new();
        let mut recipients = vec![ledger_address];
        let mut shares = vec![u128::from(scenario.drip.ledger_shares)];
        for spec in &scenario.recipients {
            let address = Address::from_label(&spec.label);
            labels.insert(spec.label.clone(), address);
            recipients.push(address);
            shares.push(u128::from(spec.shares));
        }
        drip.set_recipients(&CallContext::new(admin, 0), &recipients, &shares)
            .context("invalid recipient list")?;
        let drip = SharedDistributor::new(drip);

        let oracle = Arc::new(InMemoryAppraisalOracle::new(admin));
        let classes: BTreeMap<&'static str, AssetClass> = ["landers", "sites", "payloads"]
            .into_iter()
            .map(|name| (name, AssetClass::new(name)))
            .collect();
        for class in classes.values() {
            oracle.add_asset_class(&admin, class.clone())?;
        }

        let mut ledger = MiningPowerLedger::new(
            ledger_address,
            tokens.clone(),
            units.clone(),
            Arc::new(drip.clone()),
            admin,
            scenario.ledger.params()?,
        )?;
        let ctx = CallContext::new(admin, 0);
        for (group, name) in [
            (UnitGroup::Lander, "landers"),
            (UnitGroup::Site, "sites"),
            (UnitGroup::Payload, "payloads"),
        ] {
            ledger.set_asset_class(&ctx, group, AssetClass::new(name))?;
        }
        ledger.set_oracle(&ctx, oracle.clone())?;
        if let Some(min_payloads) = scenario.ledger.completion_min_payloads {
            let checker = checker_fn(move |query| query.payloads.len() as u64 >= min_payloads);
            ledger.set_completion_checker(&ctx, Some(checker))?;
        }

        info!(
            "Simulation wired: distributor {} ({} recipients) feeding ledger {}",
            drip_address,
            recipients.len(),
            ledger_address
        );
        Ok(Self {
            tokens,
            units,
            oracle,
            drip,
            ledger: SharedMiningLedger::new(ledger),
            admin,
            classes,
            labels,
            next_unit: 0,
        })
    }

    /// Replay `scenario` and report on the final block.
    pub fn run(scenario: &Scenario) -> Result<Report> {
        let mut simulation = Self::new(scenario)?;
        let mut events: Vec<&ScheduledEvent> = scenario.events.iter().collect();
        events.sort_by_key(|event| event.at_block);
        if let Some(late) = events.iter().find(|e| e.at_block > scenario.blocks) {
            warn!(
                "Event at block {} is past the last simulated block {} and will not run",
                late.at_block, scenario.blocks
            );
        }

        let mut failures = Vec::new();
        let mut applied = 0;
        for event in events.into_iter().take_while(|e| e.at_block <= scenario.blocks) {
            let block = event.at_block;
            match simulation.apply(block, &event.action) {
                Ok(()) => applied += 1,
                Err(err) => {
                    warn!("Event {:?} at block {} failed: {:#}", event.action, block, err);
                    failures.push(EventFailure {
                        at_block: block,
                        action: format!("{:?}", event.action),
                        error: format!("{:#}", err),
                    });
                }
            }
        }

        let mut report = simulation.report(scenario.blocks)?;
        report.events_applied = applied;
        report.failures = failures;
        Ok(report)
    }

    pub fn apply(&mut self, block: BlockNumber, action: &Action) -> Result<()> {
        let admin = CallContext::new(self.admin, block);
        match action {
            Action::Stake {
                miner,
                lander,
                site,
                payloads,
            } => {
                let owner = self.account(miner);
                let landers = vec![self.mint("landers", &owner, *lander)?];
                let sites = match site {
                    Some(value) => vec![self.mint("sites", &owner, *value)?],
                    None => Vec::new(),
                };
                let payloads = payloads
                    .iter()
                    .map(|value| self.mint("payloads", &owner, *value))
                    .collect::<Result<Vec<_>>>()?;
                let candidate = MissionCandidate::new(landers, sites, payloads);
                let id = self
                    .ledger
                    .write()
                    .stake(&CallContext::new(owner, block), candidate, owner)?;
                debug!("{} staked mission {} at block {}", miner, id, block);
            }
            Action::Unstake { mission } => {
                let owner = self
                    .ledger
                    .read()
                    .mission(*mission)
                    .map(|m| m.owner)
                    .with_context(|| format!("mission {} does not exist", mission))?;
                self.ledger
                    .write()
                    .unstake(&CallContext::new(owner, block), *mission, &owner)?;
            }
            Action::Reappraise { mission, lander } => {
                let unit = self
                    .ledger
                    .read()
                    .mission(*mission)
                    .and_then(|m| m.units.landers.first().copied())
                    .with_context(|| format!("mission {} does not exist", mission))?;
                let class = self.class("landers")?;
                self.oracle
                    .set_value(&self.admin, &class, unit, u128::from(*lander))?;
                self.ledger.write().reappraise(&admin, *mission)?;
            }
            Action::Release { miner } => {
                let owner = self.account(miner);
                let paid = self
                    .ledger
                    .write()
                    .release(&CallContext::new(owner, block), &owner, &owner)?;
                debug!("{} released {} from the ledger at block {}", miner, paid, block);
            }
            Action::Collect { recipient } => {
                let owner = self.account(recipient);
                let paid = self
                    .drip
                    .write()
                    .release(&CallContext::new(owner, block), &owner, &owner)?;
                debug!("{} collected {} from the distributor at block {}", recipient, paid, block);
            }
            Action::SetRate { tokens_per_block } => {
                self.drip
                    .write()
                    .set_tokens_per_block(&admin, u128::from(*tokens_per_block))?;
            }
            Action::Pause => self.ledger.write().pause(&admin)?,
            Action::Unpause => {
                self.ledger.write().unpause(&admin)?;
            }
            Action::Sweep { to } => {
                let to = self.account(to);
                self.ledger.write().sweep_excess(&admin, &to)?;
            }
        }
        Ok(())
    }

    pub fn report(&self, block: BlockNumber) -> Result<Report> {
        let (distributor, mut accounts) = {
            let drip = self.drip.read();
            let distributor = DistributorReport {
                address: drip.address(),
                tokens_per_block: drip.tokens_per_block(),
                total_shares: drip.total_shares(),
                total_allocated: drip.total_allocated(block)?,
                total_released: drip.total_released(),
                balance: self.tokens.balance_of(&drip.address()),
            };
            let mut accounts = Vec::with_capacity(self.labels.len());
            for (label, address) in &self.labels {
                accounts.push(AccountReport {
                    label: label.clone(),
                    address: *address,
                    balance: self.tokens.balance_of(address),
                    shares: drip.shares_of(address),
                    drip_released: drip.released(address),
                    drip_releasable: drip.releasable(address, block)?,
                    mining_power: 0,
                    released: 0,
                    releasable: 0,
                });
            }
            (distributor, accounts)
        };

        let ledger = self.ledger.read();
        for account in &mut accounts {
            account.mining_power = ledger.mining_power_of(&account.address);
            account.released = ledger.released(&account.address);
            account.releasable = ledger.releasable(&account.address, block)?;
        }
        Ok(Report {
            block,
            distributor,
            ledger: LedgerReport {
                address: ledger.address(),
                paused: ledger.is_paused(),
                total_mining_power: ledger.total_mining_power(),
                total_mined: ledger.total_mined(),
                total_released: ledger.total_released(),
                pending_pull: ledger.pending_pull(block)?,
                excess: ledger.excess(),
                missions: ledger.mission_count(),
                active_missions: ledger.active_missions().len(),
                balance: self.tokens.balance_of(&ledger.address()),
            },
            accounts,
            events_applied: 0,
            failures: Vec::new(),
        })
    }

    fn account(&mut self, label: &str) -> Address {
        *self
            .labels
            .entry(label.to_string())
            .or_insert_with(|| Address::from_label(label))
    }

    fn class(&self, name: &str) -> Result<AssetClass> {
        self.classes
            .get(name)
            .cloned()
            .with_context(|| format!("unknown asset class {}", name))
    }

    /// Mint a fresh unit of `class` to `owner` and appraise it at `value`.
    fn mint(&mut self, class: &str, owner: &Address, value: u64) -> Result<UnitId> {
        let class = self.class(class)?;
        let id = self.next_unit;
        self.next_unit += 1;
        self.units.mint(&class, owner, id)?;
        self.oracle
            .set_value(&self.admin, &class, id, u128::from(value))?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{RecipientSpec, ScheduledEvent};

    fn at(at_block: u64, action: Action) -> ScheduledEvent {
        ScheduledEvent { at_block, action }
    }

    fn stake(miner: &str, lander: u64) -> Action {
        Action::Stake {
            miner: miner.to_string(),
            lander,
            site: None,
            payloads: Vec::new(),
        }
    }

    fn account<'a>(report: &'a Report, label: &str) -> &'a AccountReport {
        report
            .accounts
            .iter()
            .find(|a| a.label == label)
            .unwrap()
    }

    #[test]
    fn drip_flows_through_ledger_to_miners() {
        let scenario = Scenario {
            blocks: 10,
            recipients: vec![RecipientSpec {
                label: "treasury".to_string(),
                shares: 1,
            }],
            events: vec![
                at(0, stake("alice", 100)),
                at(0, stake("bob", 300)),
                at(
                    10,
                    Action::Release {
                        miner: "alice".to_string(),
                    },
                ),
            ],
            ..Default::default()
        };
        let report = Simulation::run(&scenario).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.events_applied, 3);
        assert_eq!(report.distributor.total_allocated, 1_000);
        assert_eq!(report.ledger.total_mined, 500);
        let alice = account(&report, "alice");
        assert_eq!(alice.balance, 125);
        assert_eq!(alice.releasable, 0);
        assert_eq!(account(&report, "bob").releasable, 375);
        assert_eq!(account(&report, "treasury").drip_releasable, 500);
    }

    #[test]
    fn failing_events_are_recorded_not_fatal() {
        let scenario = Scenario {
            blocks: 5,
            events: vec![
                at(1, Action::Unstake { mission: 7 }),
                at(2, stake("alice", 100)),
            ],
            ..Default::default()
        };
        let report = Simulation::run(&scenario).unwrap();
        assert_eq!(report.events_applied, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].at_block, 1);
        assert!(report.failures[0].error.contains("mission 7"));
        assert_eq!(report.ledger.active_missions, 1);
    }

    #[test]
    fn events_apply_in_block_order_and_late_ones_are_skipped() {
        let scenario = Scenario {
            blocks: 1_000_000,
            events: vec![
                at(1_000_001, stake("carol", 100)),
                at(
                    500_000,
                    Action::Release {
                        miner: "alice".to_string(),
                    },
                ),
                at(0, stake("alice", 100)),
            ],
            ..Default::default()
        };
        let report = Simulation::run(&scenario).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.events_applied, 2);
        // Funding of 1_000_000 at 100 per block runs dry long before the release.
        assert_eq!(report.distributor.total_allocated, 1_000_000);
        assert_eq!(account(&report, "alice").balance, 1_000_000);
        assert!(report.accounts.iter().all(|a| a.label != "carol"));
        assert_eq!(report.ledger.active_missions, 1);
        assert_eq!(report.block, 1_000_000);
    }

    #[test]
    fn completion_bonus_follows_settings() {
        let mut scenario = Scenario {
            blocks: 1,
            events: vec![at(
                0,
                Action::Stake {
                    miner: "alice".to_string(),
                    lander: 100,
                    site: Some(50),
                    payloads: vec![25, 25],
                },
            )],
            ..Default::default()
        };
        scenario.ledger.completion_numerator = 2;
        scenario.ledger.completion_denominator = 1;
        let report = Simulation::run(&scenario).unwrap();
        assert_eq!(account(&report, "alice").mining_power, 400);

        scenario.ledger.completion_min_payloads = Some(3);
        let report = Simulation::run(&scenario).unwrap();
        assert_eq!(account(&report, "alice").mining_power, 200);
    }
}
