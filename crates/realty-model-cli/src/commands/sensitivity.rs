use clap::Args;
use serde_json::Value;

use realty_model_core::model::PropertyModelInput;
use realty_model_core::scenarios::sensitivity::{self, SensitivityInput};
use realty_model_core::variables::{ModelVariable, SensitivityVariable};

use crate::input;

/// Arguments for sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to a full sensitivity JSON input (inputs, assumptions, variables)
    #[arg(long, conflicts_with_all = ["base_inputs", "var"])]
    pub input: Option<String>,

    /// Path to a property JSON file (inputs, assumptions) to sweep
    #[arg(long, requires = "var")]
    pub base_inputs: Option<String>,

    /// Variable sweep in format name:min:max:step, repeatable
    /// (e.g. "monthly_rent:2500:3500:250")
    #[arg(long)]
    pub var: Vec<String>,

    /// Iterations for the bundled Monte Carlo run
    #[arg(long)]
    pub iterations: Option<u32>,

    /// RNG seed for the bundled Monte Carlo run
    #[arg(long)]
    pub seed: Option<u64>,
}

fn parse_sens_var(spec: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Sensitivity variable must be name:min:max:step, got '{}'",
            spec
        )
        .into());
    }
    Ok(SensitivityVariable {
        variable: parts[0].parse::<ModelVariable>()?,
        base_value: None,
        min_value: parts[1].parse()?,
        max_value: parts[2].parse()?,
        step: parts[3].parse()?,
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut sens_input: SensitivityInput = if let Some(ref path) = args.base_inputs {
        let base: PropertyModelInput = input::file::read_json(path)?;
        let variables = args
            .var
            .iter()
            .map(|s| parse_sens_var(s))
            .collect::<Result<Vec<_>, _>>()?;
        SensitivityInput {
            inputs: base.inputs,
            assumptions: base.assumptions,
            variables,
            monte_carlo_iterations: 10_000,
            seed: None,
        }
    } else {
        input::read_input(args.input.as_deref(), "sensitivity analysis")?
    };

    if let Some(iterations) = args.iterations {
        sens_input.monte_carlo_iterations = iterations;
    }
    if args.seed.is_some() {
        sens_input.seed = args.seed;
    }

    let result = sensitivity::perform_sensitivity_analysis(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}
