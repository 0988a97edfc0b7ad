use clap::Args;
use serde_json::Value;

use realty_model_core::monte_carlo::simulation::{self, MonteCarloInput};

use crate::input;

/// Arguments for an NPV Monte Carlo simulation
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the iteration count from the input file
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Override the RNG seed from the input file
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_monte_carlo(args: MonteCarloArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input: MonteCarloInput =
        input::read_input(args.input.as_deref(), "Monte Carlo simulation")?;
    if let Some(iterations) = args.iterations {
        mc_input.iterations = iterations;
    }
    if args.seed.is_some() {
        mc_input.seed = args.seed;
    }
    let result = simulation::perform_monte_carlo_simulation(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}
