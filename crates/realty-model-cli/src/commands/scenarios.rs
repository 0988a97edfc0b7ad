use clap::Args;
use serde_json::Value;

use realty_model_core::scenarios::scenario::{self, ScenarioInput};

use crate::input;

/// Arguments for probability-weighted scenario analysis
#[derive(Args)]
pub struct ScenarioArgs {
    /// Path to JSON input file with base inputs, assumptions and scenarios
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_scenarios(args: ScenarioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario_input: ScenarioInput =
        input::read_input(args.input.as_deref(), "scenario analysis")?;
    let result = scenario::perform_scenario_analysis(&scenario_input)?;
    Ok(serde_json::to_value(result)?)
}
