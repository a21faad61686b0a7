//! End-to-end flows: a reward source feeding a mining ledger.

use accrual_drip::{DripParams, ShareDripDistributor, SharedDistributor};
use accrual_mining::{
    InMemoryAppraisalOracle, LedgerParams, MiningError, MiningPowerLedger, MissionCandidate, SharedMiningLedger,
    UnitGroup,
};
use accrual_treasury::{
    AccessError, InMemoryTokenLedger, InMemoryUnitLedger, ManualRewardSource, RewardSource, SharedRewardSource,
    TokenLedger, UnitLedger,
};
use accrual_types::{Address, Amount, AssetClass, CallContext, UnitId};
use std::sync::Arc;

struct Env {
    tokens: Arc<InMemoryTokenLedger>,
    units: Arc<InMemoryUnitLedger>,
    oracle: Arc<InMemoryAppraisalOracle>,
    admin: Address,
    lander: AssetClass,
}

impl Env {
    fn new() -> Self {
        let admin = Address::from_label("admin");
        let oracle = Arc::new(InMemoryAppraisalOracle::new(admin));
        let lander = AssetClass::new("landers");
        oracle.add_asset_class(&admin, lander.clone()).unwrap();
        Self {
            tokens: Arc::new(InMemoryTokenLedger::new()),
            units: Arc::new(InMemoryUnitLedger::new()),
            oracle,
            admin,
            lander,
        }
    }

    fn ledger(&self, label: &str, source: SharedRewardSource) -> MiningPowerLedger {
        let mut ledger = MiningPowerLedger::new(
            Address::from_label(label),
            self.tokens.clone(),
            self.units.clone(),
            source,
            self.admin,
            LedgerParams::default(),
        )
        .unwrap();
        let ctx = CallContext::new(self.admin, 0);
        ledger
            .set_asset_class(&ctx, UnitGroup::Lander, self.lander.clone())
            .unwrap();
        ledger.set_oracle(&ctx, self.oracle.clone()).unwrap();
        ledger
    }

    /// Mint a lander worth `power` to `owner`.
    fn lander(&self, owner: &Address, id: UnitId, power: Amount) -> MissionCandidate {
        self.units.mint(&self.lander, owner, id).unwrap();
        self.oracle
            .set_value(&self.admin, &self.lander, id, power)
            .unwrap();
        MissionCandidate::new(vec![id], vec![], vec![])
    }
}

fn faucet(env: &Env) -> Arc<ManualRewardSource> {
    Arc::new(ManualRewardSource::new(Address::from_label("faucet"), env.tokens.clone()))
}

#[test]
fn single_miner_pulls_and_releases() {
    let env = Env::new();
    let faucet = faucet(&env);
    let mut ledger = env.ledger("ledger", faucet.clone());
    let miner = Address::from_label("miner");

    let mission = env.lander(&miner, 1, 100);
    ledger
        .stake(&CallContext::new(miner, 1), mission, miner)
        .unwrap();
    faucet.credit(&ledger.address(), 100).unwrap();

    assert_eq!(ledger.update(2).unwrap(), 100);
    assert_eq!(ledger.total_mined(), 100);
    assert_eq!(ledger.releasable(&miner, 2).unwrap(), 100);

    let paid = ledger
        .release(&CallContext::new(miner, 2), &miner, &miner)
        .unwrap();
    assert_eq!(paid, 100);
    assert_eq!(ledger.released(&miner), 100);
    assert_eq!(ledger.releasable(&miner, 2).unwrap(), 0);
    assert_eq!(ledger.total_released(), 100);
    assert_eq!(env.tokens.balance_of(&miner), 100);
}

#[test]
fn unstaked_miner_keeps_pending_and_misses_later_rewards() {
    let env = Env::new();
    let faucet = faucet(&env);
    let mut ledger = env.ledger("ledger", faucet.clone());
    let (x, y) = (Address::from_label("x"), Address::from_label("y"));

    let x_mission = ledger
        .stake(&CallContext::new(x, 1), env.lander(&x, 1, 200), x)
        .unwrap();
    ledger
        .stake(&CallContext::new(y, 1), env.lander(&y, 2, 300), y)
        .unwrap();
    faucet.credit(&ledger.address(), 1_000).unwrap();
    assert_eq!(ledger.releasable(&x, 2).unwrap(), 400);
    assert_eq!(ledger.releasable(&y, 2).unwrap(), 600);

    ledger
        .unstake(&CallContext::new(x, 2), x_mission, &x)
        .unwrap();
    assert_eq!(ledger.total_mining_power(), 300);
    assert_eq!(env.units.owner_of(&env.lander, 1), Some(x));

    faucet.credit(&ledger.address(), 1_000).unwrap();
    assert_eq!(ledger.releasable(&x, 3).unwrap(), 400);
    // 600 + 1000, less one unit lost to the accumulator's rounding.
    assert_eq!(ledger.releasable(&y, 3).unwrap(), 1_599);

    ledger
        .release(&CallContext::new(x, 3), &x, &x)
        .unwrap();
    assert_eq!(env.tokens.balance_of(&x), 400);
    assert_eq!(ledger.releasable(&y, 3).unwrap(), 1_599);
}

#[test]
fn rewards_pulled_without_miners_are_only_sweepable() {
    let env = Env::new();
    let faucet = faucet(&env);
    let mut ledger = env.ledger("ledger", faucet.clone());
    let treasury = Address::from_label("treasury");
    let miner = Address::from_label("miner");

    faucet.credit(&ledger.address(), 1_000).unwrap();
    assert_eq!(ledger.update(1).unwrap(), 1_000);
    assert_eq!(ledger.total_mined(), 0);
    assert_eq!(env.tokens.balance_of(&ledger.address()), 1_000);

    ledger
        .stake(&CallContext::new(miner, 2), env.lander(&miner, 1, 100), miner)
        .unwrap();
    assert_eq!(ledger.releasable(&miner, 2).unwrap(), 0);
    assert_eq!(ledger.excess(), 1_000);

    assert!(matches!(
        ledger.sweep_excess(&CallContext::new(miner, 3), &miner),
        Err(MiningError::Access(AccessError::MissingRole { .. }))
    ));
    let swept = ledger
        .sweep_excess(&CallContext::new(env.admin, 3), &treasury)
        .unwrap();
    assert_eq!(swept, 1_000);
    assert_eq!(env.tokens.balance_of(&treasury), 1_000);
    assert_eq!(ledger.excess(), 0);
}

#[test]
fn sweep_leaves_owed_rewards_in_custody() {
    let env = Env::new();
    let faucet = faucet(&env);
    let mut ledger = env.ledger("ledger", faucet.clone());
    let miner = Address::from_label("miner");
    ledger
        .stake(&CallContext::new(miner, 1), env.lander(&miner, 1, 100), miner)
        .unwrap();
    faucet.credit(&ledger.address(), 300).unwrap();
    env.tokens.mint(&ledger.address(), 50).unwrap();

    let swept = ledger
        .sweep_excess(&CallContext::new(env.admin, 2), &env.admin)
        .unwrap();
    assert_eq!(swept, 50);
    assert_eq!(
        ledger
            .release(&CallContext::new(miner, 2), &miner, &miner)
            .unwrap(),
        300
    );
}

#[test]
fn distributor_feeds_mining_ledger() {
    let env = Env::new();
    let ledger_address = Address::from_label("ledger");
    let other = Address::from_label("other");
    let drip_address = Address::from_label("drip");
    env.tokens.mint(&drip_address, 1_000_000).unwrap();

    let mut drip =
        ShareDripDistributor::new(drip_address, env.tokens.clone(), env.admin, DripParams::default()).unwrap();
    drip.set_recipients(&CallContext::new(env.admin, 0), &[ledger_address, other], &[1, 1])
        .unwrap();
    let drip = SharedDistributor::new(drip);

    let mut ledger = env.ledger("ledger", Arc::new(drip.clone()));
    let (a, b) = (Address::from_label("a"), Address::from_label("b"));
    ledger
        .stake(&CallContext::new(a, 0), env.lander(&a, 1, 100), a)
        .unwrap();
    ledger
        .stake(&CallContext::new(b, 0), env.lander(&b, 2, 300), b)
        .unwrap();

    // 100 tokens per block, half of them to the ledger, split 1:3.
    assert_eq!(ledger.releasable(&a, 10).unwrap(), 125);
    assert_eq!(ledger.releasable(&b, 10).unwrap(), 375);

    ledger
        .release(&CallContext::new(a, 10), &a, &a)
        .unwrap();
    assert_eq!(env.tokens.balance_of(&a), 125);
    assert_eq!(drip.released(&ledger_address), 500);
    assert_eq!(drip.releasable(&ledger_address, 10).unwrap(), 0);
    assert_eq!(ledger.total_mined(), 500);

    assert_eq!(ledger.releasable(&a, 20).unwrap(), 125);
    assert_eq!(ledger.releasable(&b, 20).unwrap(), 750);
}

#[test]
fn mining_ledger_feeds_another_layer() {
    let env = Env::new();
    let faucet = faucet(&env);
    let upper = SharedMiningLedger::new(env.ledger("upper", faucet.clone()));
    let mut lower = env.ledger("lower", Arc::new(upper.clone()));
    let sponsor = Address::from_label("sponsor");
    let miner = Address::from_label("miner");

    // The lower ledger's own account holds the only mission upstream.
    upper
        .write()
        .stake(&CallContext::new(sponsor, 1), env.lander(&sponsor, 1, 100), lower.address())
        .unwrap();
    lower
        .stake(&CallContext::new(miner, 1), env.lander(&miner, 2, 10), miner)
        .unwrap();

    faucet.credit(&upper.read().address(), 1_000).unwrap();
    assert_eq!(upper.releasable(&lower.address(), 2).unwrap(), 1_000);
    assert_eq!(lower.releasable(&miner, 2).unwrap(), 1_000);

    lower
        .release(&CallContext::new(miner, 2), &miner, &miner)
        .unwrap();
    assert_eq!(env.tokens.balance_of(&miner), 1_000);
    assert_eq!(upper.released(&lower.address()), 1_000);
    assert_eq!(upper.total_released(), 1_000);
}
