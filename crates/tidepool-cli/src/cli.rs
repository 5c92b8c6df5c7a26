use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tidepool - A constant-product exchange simulator
#[derive(Parser)]
#[command(name = "tidepool")]
#[command(about = "Tidepool scenario runner and quoting utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a sample scenario file
    Init {
        /// Output path for the scenario file
        #[arg(short, long, default_value = "scenario.json")]
        output: PathBuf,
    },

    /// Run every action of a scenario and print a JSON report
    Simulate {
        /// Path to scenario file
        #[arg(short, long, default_value = "scenario.json")]
        config: PathBuf,
    },

    /// Run a scenario, then price an amount along a path
    Quote {
        /// Path to scenario file
        #[arg(short, long, default_value = "scenario.json")]
        config: PathBuf,

        /// Token symbols along the route (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        path: Vec<String>,

        /// Amount to sell, or to buy with --exact-out
        #[arg(short, long)]
        amount: u128,

        /// Treat the amount as the desired output
        #[arg(long, default_value = "false")]
        exact_out: bool,
    },

    /// Run a scenario, then list every pair with its reserves
    Pairs {
        /// Path to scenario file
        #[arg(short, long, default_value = "scenario.json")]
        config: PathBuf,
    },
}
