//! Scenario files.
//!
//! A scenario configures one distributor feeding one mining ledger and lists
//! the actions to replay, each pinned to a block. Amounts are `u64` in the
//! file and widened when the engines are built.

use accrual_drip::DripParams;
use accrual_mining::LedgerParams;
use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub log_level: String,
    /// `pretty` or `compact`.
    pub log_format: String,
    /// Last block simulated; the report is taken at this block.
    pub blocks: u64,
    pub drip: DripSettings,
    pub ledger: LedgerSettings,
    /// Distributor recipients besides the mining ledger.
    pub recipients: Vec<RecipientSpec>,
    pub events: Vec<ScheduledEvent>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            blocks: 100,
            drip: DripSettings::default(),
            ledger: LedgerSettings::default(),
            recipients: Vec::new(),
            events: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DripSettings {
    pub tokens_per_block: u64,
    pub start_block: u64,
    /// Tokens minted into the distributor's custody before block 0.
    pub funding: u64,
    /// Shares held by the mining ledger.
    pub ledger_shares: u64,
}

impl Default for DripSettings {
    fn default() -> Self {
        let params = DripParams::default();
        Self {
            tokens_per_block: u64::try_from(params.tokens_per_block).unwrap_or(u64::MAX),
            start_block: params.start_block,
            funding: 1_000_000,
            ledger_shares: 1,
        }
    }
}

impl DripSettings {
    pub fn params(&self) -> DripParams {
        DripParams {
            tokens_per_block: u128::from(self.tokens_per_block),
            start_block: self.start_block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub max_payloads: u64,
    pub completion_numerator: u64,
    pub completion_denominator: u64,
    /// Only missions with at least this many payloads earn the completion
    /// bonus. Unset means every full mission does.
    pub completion_min_payloads: Option<u64>,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let params = LedgerParams::default();
        Self {
            max_payloads: params.max_payloads as u64,
            completion_numerator: 1,
            completion_denominator: 1,
            completion_min_payloads: None,
        }
    }
}

impl LedgerSettings {
    pub fn params(&self) -> Result<LedgerParams> {
        Ok(LedgerParams {
            max_payloads: usize::try_from(self.max_payloads).context("max_payloads does not fit in usize")?,
            completion_numerator: u128::from(self.completion_numerator),
            completion_denominator: u128::from(self.completion_denominator),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSpec {
    pub label: String,
    pub shares: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub at_block: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// Something that happens during a scenario. Accounts are named by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Mint and appraise fresh units for `miner`, then stake them.
    Stake {
        miner: String,
        lander: u64,
        #[serde(default)]
        site: Option<u64>,
        #[serde(default)]
        payloads: Vec<u64>,
    },
    /// Unstake a mission on behalf of its owner.
    Unstake { mission: u64 },
    /// Re-appraise a mission's lander at `lander` and re-weigh the mission.
    Reappraise { mission: u64, lander: u64 },
    /// Release everything releasable for a miner.
    Release { miner: String },
    /// Release everything releasable for a distributor recipient.
    Collect { recipient: String },
    SetRate { tokens_per_block: u64 },
    Pause,
    Unpause,
    Sweep { to: String },
}

impl Scenario {
    /// Load a scenario file, layered under `ACCRUAL_*` environment overrides
    /// (`ACCRUAL_BLOCKS`, `ACCRUAL_DRIP__TOKENS_PER_BLOCK`, ...).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Scenario file {} not found", path.display());
        }
        let builder = Config::builder().add_source(File::from(path)).add_source(
            Environment::with_prefix("ACCRUAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder).with_context(|| format!("failed to load scenario {}", path.display()))
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let scenario: Scenario = builder.build()?.try_deserialize()?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        self.drip.params().validate().context("invalid [drip] settings")?;
        self.ledger
            .params()?
            .validate()
            .context("invalid [ledger] settings")?;
        if self.drip.ledger_shares == 0 {
            bail!("drip.ledger_shares must be greater than 0");
        }
        Ok(())
    }
}
