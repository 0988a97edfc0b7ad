use clap::Args;
use serde_json::Value;

use realty_model_core::model::{self, PropertyModelInput};

use crate::input;

/// Arguments for a full property model run
#[derive(Args)]
pub struct ModelArgs {
    /// Path to JSON input file with `inputs` and `assumptions`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_model(args: ModelArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let property: PropertyModelInput = input::read_input(args.input.as_deref(), "property model")?;
    let result = model::analyze_property(&property)?;
    Ok(serde_json::to_value(result)?)
}
