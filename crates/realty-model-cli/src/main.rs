mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::amortize::AmortizeArgs;
use commands::model::ModelArgs;
use commands::monte_carlo::MonteCarloArgs;
use commands::scenarios::ScenarioArgs;
use commands::sensitivity::SensitivityArgs;

/// Real-estate investment modelling
#[derive(Parser)]
#[command(
    name = "realty",
    version,
    about = "Real-estate investment modelling",
    long_about = "A CLI for modelling levered rental property investments with decimal \
                  precision. Supports the full metric and DCF pipeline, loan amortization, \
                  sensitivity analysis, Monte Carlo NPV simulation and scenario analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full property model (metrics, cash flows, NPV/IRR/MIRR, exit value)
    Model(ModelArgs),
    /// Build a monthly loan amortization schedule
    Amortize(AmortizeArgs),
    /// One-at-a-time NPV sensitivity with tornado and spider data
    Sensitivity(SensitivityArgs),
    /// Monte Carlo simulation of the NPV distribution
    MonteCarlo(MonteCarloArgs),
    /// Probability-weighted scenario analysis
    Scenarios(ScenarioArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Model(args) => commands::model::run_model(args),
        Commands::Amortize(args) => commands::amortize::run_amortize(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::MonteCarlo(args) => commands::monte_carlo::run_monte_carlo(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args),
        Commands::Version => {
            println!("realty {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            debug!(error = ?e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
