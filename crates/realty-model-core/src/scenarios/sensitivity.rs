use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::RealtyModelError;
use crate::model::{calculate_model_outputs, ModelAssumptions, ModelInputs};
use crate::monte_carlo::simulation::{default_iterations, simulate_npv, MonteCarloResults};
use crate::types::*;
use crate::variables::{ModelVariable, SensitivityVariable};
use crate::RealtyModelResult;

/// Upper bound on points in a single variable's sweep.
pub const MAX_SWEEP_POINTS: u32 = 1_000;

/// Input for one-at-a-time NPV sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub inputs: ModelInputs,
    pub assumptions: ModelAssumptions,
    /// Variables swept one at a time, all others held at base
    pub variables: Vec<SensitivityVariable>,
    /// Iterations for the bundled Monte Carlo run
    #[serde(default = "default_iterations")]
    pub monte_carlo_iterations: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A swept variable enriched with its NPV impact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityVariableResult {
    pub variable: ModelVariable,
    pub base_value: Decimal,
    pub min_value: Decimal,
    pub max_value: Decimal,
    pub step: Decimal,
    /// max(NPV delta) - min(NPV delta) across the sweep
    pub impact: Money,
    /// impact / (max_value - min_value); 0 for a single-point range
    pub sensitivity: Decimal,
}

/// One bar of a tornado chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoChartData {
    pub variable: ModelVariable,
    /// Largest NPV gain over base (>= 0)
    pub positive_impact: Money,
    /// Largest NPV loss versus base, as a magnitude (>= 0)
    pub negative_impact: Money,
    pub range: Money,
}

/// NPV response curve for one variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiderChartData {
    pub variable: ModelVariable,
    pub values: Vec<Decimal>,
    pub npv_impact: Vec<Money>,
}

/// Output of sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityAnalysis {
    pub base_npv: Money,
    pub variables: Vec<SensitivityVariableResult>,
    /// Sorted by range, widest first
    pub tornado_chart: Vec<TornadoChartData>,
    pub spider_chart: Vec<SpiderChartData>,
    pub monte_carlo_results: MonteCarloResults,
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
///
/// Both ends are always included: if the last step falls short of max, max is
/// appended. Sweeps longer than `MAX_SWEEP_POINTS` are rejected.
pub fn generate_sweep_values(var: &SensitivityVariable) -> RealtyModelResult<Vec<Decimal>> {
    var.validate()?;

    let steps = (var.max_value - var.min_value)
        .checked_div(var.step)
        .map(|n| n.floor());
    match steps {
        Some(n) if n < Decimal::from(MAX_SWEEP_POINTS) => {}
        _ => {
            return Err(RealtyModelError::invalid(
                format!("variable:{}", var.variable),
                format!("step is too small: the sweep would exceed {MAX_SWEEP_POINTS} points"),
            ))
        }
    }

    let mut values = Vec::new();
    let mut current = var.min_value;
    while current <= var.max_value {
        values.push(current);
        match current.checked_add(var.step) {
            Some(next) => current = next,
            None => break,
        }
    }
    // Ensure max is included if step doesn't land exactly on it
    if let Some(&last) = values.last() {
        if last < var.max_value {
            values.push(var.max_value);
        }
    }

    Ok(values)
}

fn npv_with(
    inputs: &ModelInputs,
    assumptions: &ModelAssumptions,
    variable: ModelVariable,
    value: Decimal,
) -> RealtyModelResult<Money> {
    let mut trial_inputs = inputs.clone();
    let mut trial_assumptions = assumptions.clone();
    variable.apply(&mut trial_inputs, &mut trial_assumptions, value);
    Ok(calculate_model_outputs(&trial_inputs, &trial_assumptions)?.net_present_value)
}

/// Sweep each variable across its range, recomputing NPV, and build tornado
/// and spider chart data plus a Monte Carlo run over the same variables.
pub fn perform_sensitivity_analysis(
    input: &SensitivityInput,
) -> RealtyModelResult<ComputationOutput<SensitivityAnalysis>> {
    let start = Instant::now();

    if input.variables.is_empty() {
        return Err(RealtyModelError::InsufficientData(
            "At least one sensitivity variable required".into(),
        ));
    }
    if input.monte_carlo_iterations == 0 {
        return Err(RealtyModelError::invalid(
            "monte_carlo_iterations",
            "Must be at least 1",
        ));
    }
    for var in &input.variables {
        var.validate()?;
    }

    let base_npv = calculate_model_outputs(&input.inputs, &input.assumptions)?.net_present_value;

    let mut variables = Vec::with_capacity(input.variables.len());
    let mut tornado_chart = Vec::with_capacity(input.variables.len());
    let mut spider_chart = Vec::with_capacity(input.variables.len());

    for var in &input.variables {
        let values = generate_sweep_values(var)?;

        let mut npv_impact = Vec::with_capacity(values.len());
        for &value in &values {
            npv_impact.push(npv_with(&input.inputs, &input.assumptions, var.variable, value)?);
        }

        let deltas: Vec<Money> = npv_impact.iter().map(|npv| *npv - base_npv).collect();
        let max_delta = deltas.iter().copied().max().unwrap_or(Decimal::ZERO);
        let min_delta = deltas.iter().copied().min().unwrap_or(Decimal::ZERO);
        let impact = max_delta - min_delta;

        let span = var.max_value - var.min_value;
        let sensitivity = if span.is_zero() {
            Decimal::ZERO
        } else {
            impact / span
        };

        debug!(variable = %var.variable, %impact, points = values.len(), "sensitivity sweep");

        variables.push(SensitivityVariableResult {
            variable: var.variable,
            base_value: var.resolved_base(&input.inputs, &input.assumptions),
            min_value: var.min_value,
            max_value: var.max_value,
            step: var.step,
            impact,
            sensitivity,
        });

        tornado_chart.push(TornadoChartData {
            variable: var.variable,
            positive_impact: max_delta.max(Decimal::ZERO),
            negative_impact: (-min_delta).max(Decimal::ZERO),
            range: impact.abs(),
        });

        spider_chart.push(SpiderChartData {
            variable: var.variable,
            values,
            npv_impact,
        });
    }

    tornado_chart.sort_by(|a, b| b.range.cmp(&a.range));

    let (monte_carlo_results, warnings) = simulate_npv(
        &input.inputs,
        &input.assumptions,
        &input.variables,
        input.monte_carlo_iterations,
        input.seed,
    )?;

    let output = SensitivityAnalysis {
        base_npv,
        variables,
        tornado_chart,
        spider_chart,
        monte_carlo_results,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-at-a-time NPV Sensitivity Analysis",
        &serde_json::json!({
            "variables": input.variables.iter().map(|v| v.variable.as_str()).collect::<Vec<_>>(),
            "monte_carlo_iterations": input.monte_carlo_iterations,
            "seed": input.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}
