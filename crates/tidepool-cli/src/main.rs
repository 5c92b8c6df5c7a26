use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod config;
mod scenario;

use cli::{Cli, Commands};
use config::{generate_sample_config, ScenarioConfig};
use scenario::Simulation;

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output } => {
            init_config(output)?;
        }
        Commands::Simulate { config } => {
            simulate(&config)?;
        }
        Commands::Quote {
            config,
            path,
            amount,
            exact_out,
        } => {
            quote(&config, &path, amount, exact_out)?;
        }
        Commands::Pairs { config } => {
            show_pairs(&config)?;
        }
    }

    Ok(())
}

/// Write a sample scenario file
fn init_config(output: PathBuf) -> Result<()> {
    info!("Generating sample scenario");

    let config = generate_sample_config();
    config.save(&output)?;

    info!("Scenario saved to {:?}", output);
    println!("\nScenario file created: {}", output.display());
    println!("Edit the file to customize tokens, accounts and actions.");
    println!("\nTo run it:");
    println!("  tidepool simulate --config {}", output.display());

    Ok(())
}

fn load_and_run(path: &Path) -> Result<(Simulation, Vec<scenario::ActionReport>)> {
    info!("Loading scenario from {:?}", path);

    if !path.exists() {
        error!(
            "Scenario file not found: {:?}. Run 'tidepool init' to create one.",
            path
        );
        return Err(anyhow::anyhow!("Scenario file not found"));
    }

    let config = ScenarioConfig::load(path)?;
    let mut simulation = Simulation::new(config)?;
    let reports = simulation.run();

    let failed = reports.iter().filter(|r| !r.ok).count();
    info!("Ran {} actions ({} rejected)", reports.len(), failed);
    Ok((simulation, reports))
}

/// Run every action and print the full report
fn simulate(path: &Path) -> Result<()> {
    let (simulation, reports) = load_and_run(path)?;
    print_json(&simulation.report(reports)?)
}

/// Price an amount along a path after running the scenario
fn quote(path: &Path, route: &[String], amount: u128, exact_out: bool) -> Result<()> {
    let (simulation, _) = load_and_run(path)?;
    let amounts = simulation.quote(route, amount, exact_out)?;

    #[derive(Serialize)]
    struct Quote<'a> {
        path: &'a [String],
        exact_out: bool,
        amounts: Vec<u128>,
    }

    print_json(&Quote {
        path: route,
        exact_out,
        amounts,
    })
}

/// List pairs after running the scenario
fn show_pairs(path: &Path) -> Result<()> {
    let (simulation, _) = load_and_run(path)?;
    print_json(&simulation.pairs()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
