//! Mining-power reward ledger
//!
//! Stake positions ("missions") are built from three typed groups of
//! non-fungible units, weighed by an appraisal oracle, and share a reward
//! stream pulled from an upstream reward source in proportion to their
//! mining power.

pub mod checker;
pub mod errors;
pub mod ledger;
pub mod mission;
pub mod oracle;
pub mod params;
pub mod shared;

pub use checker::{checker_fn, CompletionChecker, CompletionQuery, SharedChecker};
pub use errors::{MiningError, MissionDefect, OracleError, Result, UnitGroup};
pub use ledger::{LedgerSnapshot, LedgerState, MiningPowerLedger, UserAccount};
pub use mission::{AssetClasses, CandidateEvaluation, Mission, MissionBook, MissionCandidate, MissionId};
pub use oracle::{AppraisalOracle, InMemoryAppraisalOracle, SharedOracle};
pub use params::{LedgerParams, MAX_PAYLOADS};
pub use shared::SharedMiningLedger;
