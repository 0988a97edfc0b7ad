use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use realty_model_core::amortization::{self, AmortizationInput};

use crate::input;

/// Arguments for a loan amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long, requires_all = ["rate", "term"])]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent (e.g. 6.5)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Loan term in years
    #[arg(long)]
    pub term: Option<u32>,

    /// Print only the payment totals, without the monthly rows
    #[arg(long)]
    pub summary: bool,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan: AmortizationInput = match (args.principal, args.rate, args.term) {
        (Some(principal), Some(annual_rate), Some(term_years)) => AmortizationInput {
            principal,
            annual_rate,
            term_years,
        },
        _ => input::read_input(args.input.as_deref(), "amortization")?,
    };

    let mut result = amortization::amortization_schedule(&loan)?;
    if args.summary {
        result.schedule.clear();
    }
    Ok(serde_json::to_value(result)?)
}
