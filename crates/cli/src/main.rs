//! Accrual ledger command line interface
//!
//! Replays scenario files against a share drip distributor feeding a
//! mining-power ledger and prints a JSON report of every account.

mod scenario;
mod simulation;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::scenario::Scenario;
use crate::simulation::Simulation;

#[derive(Parser)]
#[command(name = "accrual")]
#[command(about = "Reward accrual ledger simulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file and print a JSON report
    Simulate(SimulateCommand),
    /// Print the default scenario as TOML
    Defaults,
}

#[derive(Args)]
struct SimulateCommand {
    /// Path to the scenario file (TOML)
    #[arg(long, value_name = "PATH")]
    scenario: PathBuf,
    /// Print the report on a single line
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(cmd) => handle_simulate(cmd),
        Commands::Defaults => {
            let rendered =
                toml::to_string_pretty(&Scenario::default()).context("failed to render default scenario")?;
            print!("{}", rendered);
            Ok(())
        }
    }
}

fn handle_simulate(cmd: SimulateCommand) -> Result<()> {
    let scenario = Scenario::load(&cmd.scenario)?;
    init_logging(&scenario)?;

    let report = Simulation::run(&scenario)?;
    let json = if cmd.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", json);
    Ok(())
}

fn init_logging(scenario: &Scenario) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&scenario.log_level));

    // Logs go to stderr so the report on stdout stays machine-readable.
    if scenario.log_format == "compact" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
