use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::f64::consts::PI;
use std::time::Instant;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::RealtyModelError;
use crate::model::{calculate_model_outputs, ModelAssumptions, ModelInputs};
use crate::types::{ComputationMetadata, ComputationOutput};
use crate::variables::SensitivityVariable;
use crate::RealtyModelResult;

/// Attempts at drawing inside [min, max] before clamping.
const MAX_REJECTION_ATTEMPTS: u32 = 1_000;

// ---------------------------------------------------------------------------
// Helper: build ComputationOutput without requiring Decimal
// ---------------------------------------------------------------------------

fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for an NPV Monte Carlo simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub inputs: ModelInputs,
    pub assumptions: ModelAssumptions,
    /// Variables drawn on every iteration
    pub variables: Vec<SensitivityVariable>,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Optional seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
}

pub(crate) fn default_iterations() -> u32 {
    10_000
}

/// Percentiles of the simulated NPV distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceIntervals {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Summary of the simulated NPV distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResults {
    pub iterations: u32,
    pub mean_npv: f64,
    pub median_npv: f64,
    pub standard_deviation: f64,
    pub confidence_intervals: ConfidenceIntervals,
    /// Share of iterations with NPV > 0, in [0, 1]
    pub probability_of_positive_return: f64,
    /// 5th percentile NPV
    pub value_at_risk: f64,
    /// Mean of the worst 5% of outcomes
    pub expected_shortfall: f64,
    /// Every simulated NPV, sorted ascending
    pub distribution: Vec<f64>,
    /// Draws that exhausted rejection sampling and were clamped to a bound
    pub clamped_draws: u64,
}

struct Draw {
    value: f64,
    clamped: bool,
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Standard normal variate by the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let mut u1: f64 = rng.gen();
    while u1 <= f64::MIN_POSITIVE {
        u1 = rng.gen();
    }
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Normal draw centred on `base` with std = (max - min) / 6, rejection
/// sampled into [min, max].
fn draw_in_range<R: Rng + ?Sized>(rng: &mut R, base: f64, min: f64, max: f64) -> Draw {
    if max <= min {
        return Draw {
            value: min,
            clamped: false,
        };
    }

    let std_dev = (max - min) / 6.0;
    let mut last = base;
    for _ in 0..MAX_REJECTION_ATTEMPTS {
        last = base + std_dev * standard_normal(rng);
        if (min..=max).contains(&last) {
            return Draw {
                value: last,
                clamped: false,
            };
        }
    }

    Draw {
        value: last.clamp(min, max),
        clamped: true,
    }
}

fn to_f64(value: Decimal, field: &str) -> RealtyModelResult<f64> {
    value.to_f64().ok_or_else(|| {
        RealtyModelError::invalid(field, format!("{value} cannot be represented as f64"))
    })
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Value at index floor(n * p) of a **sorted** slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn summarize(mut npvs: Vec<f64>, clamped_draws: u64) -> MonteCarloResults {
    let n = npvs.len();
    let mean_npv = npvs.iter().mean();
    let standard_deviation = npvs.iter().population_std_dev();

    npvs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let confidence_intervals = ConfidenceIntervals {
        p5: percentile_sorted(&npvs, 0.05),
        p10: percentile_sorted(&npvs, 0.10),
        p25: percentile_sorted(&npvs, 0.25),
        p75: percentile_sorted(&npvs, 0.75),
        p90: percentile_sorted(&npvs, 0.90),
        p95: percentile_sorted(&npvs, 0.95),
    };

    let positive = npvs.iter().filter(|&&v| v > 0.0).count();
    // Small runs have fewer than one outcome in the 5% tail; use the worst one.
    let tail = ((n as f64 * 0.05).floor() as usize).max(1);
    let expected_shortfall = npvs[..tail].iter().sum::<f64>() / tail as f64;

    MonteCarloResults {
        iterations: n as u32,
        mean_npv,
        median_npv: npvs[n / 2],
        standard_deviation,
        value_at_risk: confidence_intervals.p5,
        confidence_intervals,
        probability_of_positive_return: positive as f64 / n as f64,
        expected_shortfall,
        distribution: npvs,
        clamped_draws,
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Simulate the NPV distribution and return results plus any warnings.
///
/// Draws are generated sequentially from one RNG so a seeded run is
/// reproducible; evaluation of the draws fans out with the `parallel` feature.
pub fn simulate_npv(
    inputs: &ModelInputs,
    assumptions: &ModelAssumptions,
    variables: &[SensitivityVariable],
    iterations: u32,
    seed: Option<u64>,
) -> RealtyModelResult<(MonteCarloResults, Vec<String>)> {
    let mut warnings: Vec<String> = Vec::new();

    if iterations == 0 {
        return Err(RealtyModelError::invalid(
            "iterations",
            "Must be at least 1",
        ));
    }
    if variables.is_empty() {
        return Err(RealtyModelError::InsufficientData(
            "At least one variable is required".into(),
        ));
    }

    let mut bounds = Vec::with_capacity(variables.len());
    for var in variables {
        var.validate()?;
        let field = var.variable.as_str();
        let base = to_f64(var.resolved_base(inputs, assumptions), field)?;
        let min = to_f64(var.min_value, field)?;
        let max = to_f64(var.max_value, field)?;
        if base < min || base > max {
            warnings.push(format!(
                "Base value {base} for {field} lies outside [{min}, {max}]; draws will cluster at the nearest bound"
            ));
        }
        bounds.push((base, min, max));
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut clamped_draws: u64 = 0;
    let mut draws: Vec<Vec<Decimal>> = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        let mut row = Vec::with_capacity(bounds.len());
        for (var, &(base, min, max)) in variables.iter().zip(&bounds) {
            let draw = draw_in_range(&mut rng, base, min, max);
            if draw.clamped {
                clamped_draws += 1;
            }
            let value = Decimal::from_f64(draw.value).ok_or_else(|| {
                RealtyModelError::invalid(
                    var.variable.as_str(),
                    format!("draw {} is not a finite decimal", draw.value),
                )
            })?;
            row.push(value);
        }
        draws.push(row);
    }

    let evaluate = |row: Vec<Decimal>| -> RealtyModelResult<f64> {
        let mut trial_inputs = inputs.clone();
        let mut trial_assumptions = assumptions.clone();
        for (var, value) in variables.iter().zip(row) {
            var.variable
                .apply(&mut trial_inputs, &mut trial_assumptions, value);
        }
        let outputs = calculate_model_outputs(&trial_inputs, &trial_assumptions)?;
        to_f64(outputs.net_present_value, "net_present_value")
    };

    #[cfg(feature = "parallel")]
    let npvs = draws
        .into_par_iter()
        .map(evaluate)
        .collect::<RealtyModelResult<Vec<f64>>>()?;
    #[cfg(not(feature = "parallel"))]
    let npvs = draws
        .into_iter()
        .map(evaluate)
        .collect::<RealtyModelResult<Vec<f64>>>()?;

    if clamped_draws > 0 {
        warn!(clamped_draws, "rejection sampling exhausted; draws clamped to range");
        warnings.push(format!(
            "{clamped_draws} draws exceeded {MAX_REJECTION_ATTEMPTS} rejection attempts and were clamped to the nearest bound"
        ));
    }

    let results = summarize(npvs, clamped_draws);
    debug!(
        iterations,
        mean_npv = results.mean_npv,
        p5 = results.value_at_risk,
        "monte carlo simulation complete"
    );

    Ok((results, warnings))
}

/// Run an NPV Monte Carlo simulation over the given variables.
pub fn perform_monte_carlo_simulation(
    input: &MonteCarloInput,
) -> RealtyModelResult<ComputationOutput<MonteCarloResults>> {
    let start = Instant::now();

    let (results, warnings) = simulate_npv(
        &input.inputs,
        &input.assumptions,
        &input.variables,
        input.iterations,
        input.seed,
    )?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo NPV Simulation (truncated normal draws)",
        &serde_json::json!({
            "iterations": input.iterations,
            "seed": input.seed,
            "variables": input.variables.iter().map(|v| v.variable.as_str()).collect::<Vec<_>>(),
        }),
        warnings,
        elapsed,
        results,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::ModelVariable;
    use rust_decimal_macros::dec;

    const SEED: u64 = 42;

    fn base_inputs() -> ModelInputs {
        ModelInputs {
            property_value: dec!(500000),
            purchase_price: dec!(500000),
            down_payment: dec!(100000),
            loan_amount: dec!(400000),
            interest_rate: dec!(6.5),
            loan_term: 30,
            monthly_rent: dec!(3000),
            vacancy_rate: dec!(5),
            operating_expenses: dec!(12000),
            capital_expenditures: Decimal::ZERO,
            appreciation_rate: dec!(3),
            tax_rate: Decimal::ZERO,
            depreciation_rate: Decimal::ZERO,
            metadata: None,
        }
    }

    fn base_assumptions() -> ModelAssumptions {
        ModelAssumptions {
            holding_period: 10,
            exit_cap_rate: dec!(5.5),
            rent_growth_rate: dec!(2),
            expense_growth_rate: dec!(2),
            market_growth_rate: dec!(3),
            risk_free_rate: dec!(3),
            market_risk_premium: dec!(4),
            beta: dec!(1),
        }
    }

    fn rent_variable() -> SensitivityVariable {
        SensitivityVariable {
            variable: ModelVariable::MonthlyRent,
            base_value: None,
            min_value: dec!(2500),
            max_value: dec!(5500),
            step: dec!(500),
        }
    }

    fn basic_input() -> MonteCarloInput {
        MonteCarloInput {
            inputs: base_inputs(),
            assumptions: base_assumptions(),
            variables: vec![rent_variable()],
            iterations: 500,
            seed: Some(SEED),
        }
    }

    #[test]
    fn test_basic_simulation_runs() {
        let result = perform_monte_carlo_simulation(&basic_input()).unwrap();
        assert_eq!(result.result.iterations, 500);
        assert_eq!(result.result.distribution.len(), 500);
        assert_eq!(result.metadata.precision, "ieee754_f64");
    }

    #[test]
    fn test_seeded_reproducibility() {
        let input = basic_input();
        let r1 = perform_monte_carlo_simulation(&input).unwrap();
        let r2 = perform_monte_carlo_simulation(&input).unwrap();
        assert_eq!(r1.result.distribution, r2.result.distribution);
        assert_eq!(r1.result.mean_npv, r2.result.mean_npv);
    }

    #[test]
    fn test_percentile_ordering() {
        let result = perform_monte_carlo_simulation(&basic_input()).unwrap();
        let r = &result.result;
        let p = &r.confidence_intervals;
        assert!(p.p5 <= p.p10);
        assert!(p.p10 <= p.p25);
        assert!(p.p25 <= p.p75);
        assert!(p.p75 <= p.p90);
        assert!(p.p90 <= p.p95);
        assert_eq!(r.value_at_risk, p.p5);
        assert!(r.expected_shortfall <= r.value_at_risk);
    }

    #[test]
    fn test_distribution_sorted() {
        let result = perform_monte_carlo_simulation(&basic_input()).unwrap();
        for pair in result.result.distribution.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_probability_bounds() {
        let result = perform_monte_carlo_simulation(&basic_input()).unwrap();
        let p = result.result.probability_of_positive_return;
        assert!((0.0..=1.0).contains(&p));
        // Rent range straddles break-even, so both signs appear
        assert!(p > 0.0 && p < 1.0, "p={p}");
    }

    #[test]
    fn test_draws_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(SEED);
        for _ in 0..2_000 {
            let d = draw_in_range(&mut rng, 100.0, 90.0, 110.0);
            assert!((90.0..=110.0).contains(&d.value));
        }
    }

    #[test]
    fn test_pathological_base_is_clamped() {
        // Base far above max: every attempt rejects, value clamps to max
        let mut rng = StdRng::seed_from_u64(SEED);
        let d = draw_in_range(&mut rng, 1_000.0, 0.0, 1.0);
        assert!(d.clamped);
        assert_eq!(d.value, 1.0);
    }

    #[test]
    fn test_degenerate_range_returns_min() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let d = draw_in_range(&mut rng, 5.0, 5.0, 5.0);
        assert_eq!(d.value, 5.0);
        assert!(!d.clamped);
    }

    #[test]
    fn test_single_iteration_statistics() {
        let mut input = basic_input();
        input.iterations = 1;
        let r = perform_monte_carlo_simulation(&input).unwrap().result;
        assert_eq!(r.distribution.len(), 1);
        assert_eq!(r.median_npv, r.distribution[0]);
        assert_eq!(r.expected_shortfall, r.distribution[0]);
        assert_eq!(r.standard_deviation, 0.0);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut input = basic_input();
        input.iterations = 0;
        assert!(perform_monte_carlo_simulation(&input).is_err());
    }

    #[test]
    fn test_empty_variables_rejected() {
        let mut input = basic_input();
        input.variables.clear();
        assert!(matches!(
            perform_monte_carlo_simulation(&input),
            Err(RealtyModelError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_default_iterations() {
        let mut json = serde_json::to_value(basic_input()).unwrap();
        json.as_object_mut().unwrap().remove("iterations");
        let input: MonteCarloInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.iterations, 10_000);
    }

    #[test]
    fn test_summary_tail_mean() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let r = summarize(values, 0);
        // floor(100 * 0.05) = 5 worst: 1..=5
        assert_eq!(r.expected_shortfall, 3.0);
        assert_eq!(r.confidence_intervals.p5, 6.0);
        assert_eq!(r.median_npv, 51.0);
        assert_eq!(r.mean_npv, 50.5);
    }
}
