use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::RealtyModelError;
use crate::model::{calculate_model_outputs, ModelAssumptions, ModelInputs, ModelOutputs, PropertyMetadata};
use crate::types::*;
use crate::RealtyModelResult;

/// Partial override of `ModelInputs`. Present fields replace the base value;
/// `metadata` replaces the whole block rather than merging into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_term: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacancy_rate: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_expenses: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_expenditures: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appreciation_rate: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depreciation_rate: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PropertyMetadata>,
}

impl InputOverrides {
    /// Shallow merge onto `base`.
    pub fn apply_to(&self, base: &ModelInputs) -> ModelInputs {
        ModelInputs {
            property_value: self.property_value.unwrap_or(base.property_value),
            purchase_price: self.purchase_price.unwrap_or(base.purchase_price),
            down_payment: self.down_payment.unwrap_or(base.down_payment),
            loan_amount: self.loan_amount.unwrap_or(base.loan_amount),
            interest_rate: self.interest_rate.unwrap_or(base.interest_rate),
            loan_term: self.loan_term.unwrap_or(base.loan_term),
            monthly_rent: self.monthly_rent.unwrap_or(base.monthly_rent),
            vacancy_rate: self.vacancy_rate.unwrap_or(base.vacancy_rate),
            operating_expenses: self.operating_expenses.unwrap_or(base.operating_expenses),
            capital_expenditures: self.capital_expenditures.unwrap_or(base.capital_expenditures),
            appreciation_rate: self.appreciation_rate.unwrap_or(base.appreciation_rate),
            tax_rate: self.tax_rate.unwrap_or(base.tax_rate),
            depreciation_rate: self.depreciation_rate.unwrap_or(base.depreciation_rate),
            metadata: self.metadata.clone().or_else(|| base.metadata.clone()),
        }
    }
}

/// Scenario definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub overrides: InputOverrides,
    pub probability: Rate,
}

/// Input for scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub inputs: ModelInputs,
    pub assumptions: ModelAssumptions,
    pub scenarios: Vec<Scenario>,
}

/// Headline numbers for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub npv: Money,
    pub irr: Percent,
    pub cash_flow: Money,
    /// Composite 0-1 score: (leverage + negative cash flow + cap rate < 5%) / 3
    pub risk: Decimal,
}

/// Result for a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub description: String,
    pub probability: Rate,
    pub inputs: ModelInputs,
    pub outputs: ModelOutputs,
    pub key_metrics: KeyMetrics,
    pub deviation_from_base: Money,
    pub deviation_pct: Rate,
}

/// A scenario picked out by the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCase {
    pub name: String,
    pub npv: Money,
    pub probability: Rate,
}

/// Probability-weighted view across the scenario set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub expected_npv: Money,
    pub expected_irr: Percent,
    pub expected_cash_flow: Money,
    pub expected_risk: Decimal,
    pub best_case: ScenarioCase,
    pub worst_case: ScenarioCase,
    pub most_likely: ScenarioCase,
}

/// Output of scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAnalysis {
    pub base_npv: Money,
    pub scenarios: Vec<ScenarioResult>,
    pub summary: ScenarioSummary,
}

/// Composite risk score in [0, 1] for typical inputs.
pub fn risk_score(inputs: &ModelInputs, outputs: &ModelOutputs) -> Decimal {
    let leverage = inputs.loan_amount / inputs.property_value;
    let cash_flow_risk = if outputs.annual_cash_flow < Decimal::ZERO {
        Decimal::ONE
    } else {
        Decimal::ZERO
    };
    let cap_rate_risk = if outputs.cap_rate < dec!(5) {
        Decimal::ONE
    } else {
        Decimal::ZERO
    };
    (leverage + cash_flow_risk + cap_rate_risk) / dec!(3)
}

fn validate_probabilities(
    scenarios: &[Scenario],
    warnings: &mut Vec<String>,
) -> RealtyModelResult<()> {
    for s in scenarios {
        if s.probability < Decimal::ZERO || s.probability > Decimal::ONE {
            return Err(RealtyModelError::InvalidInput {
                field: format!("scenario:{} probability", s.name),
                reason: "Probability must be between 0 and 1".into(),
            });
        }
    }

    let total_prob: Decimal = scenarios.iter().map(|s| s.probability).sum();
    let prob_tolerance = dec!(0.001);
    let gap = (total_prob - Decimal::ONE).abs();
    if gap > prob_tolerance {
        return Err(RealtyModelError::InvalidInput {
            field: "probabilities".into(),
            reason: format!("Probabilities must sum to 1.0 (got {total_prob})"),
        });
    }
    if !gap.is_zero() {
        warnings.push(format!(
            "Probabilities sum to {total_prob}; treated as approximately 1.0"
        ));
    }
    Ok(())
}

fn case(result: &ScenarioResult) -> ScenarioCase {
    ScenarioCase {
        name: result.name.clone(),
        npv: result.key_metrics.npv,
        probability: result.probability,
    }
}

/// Evaluate each scenario's merged inputs through the full model and
/// aggregate probability-weighted expectations.
///
/// Probabilities must each lie in [0, 1] and sum to 1.0 within 0.001.
pub fn perform_scenario_analysis(
    input: &ScenarioInput,
) -> RealtyModelResult<ComputationOutput<ScenarioAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.scenarios.is_empty() {
        return Err(RealtyModelError::InsufficientData(
            "At least one scenario required".into(),
        ));
    }

    validate_probabilities(&input.scenarios, &mut warnings)?;

    let base_npv = calculate_model_outputs(&input.inputs, &input.assumptions)?.net_present_value;

    let mut results = Vec::with_capacity(input.scenarios.len());
    for scenario in &input.scenarios {
        let inputs = scenario.overrides.apply_to(&input.inputs);
        let outputs = calculate_model_outputs(&inputs, &input.assumptions)?;

        if !outputs.internal_rate_of_return.converged {
            warnings.push(format!(
                "IRR did not converge for scenario '{}'; expected IRR uses the last estimate",
                scenario.name
            ));
        }

        let key_metrics = KeyMetrics {
            npv: outputs.net_present_value,
            irr: outputs.internal_rate_of_return.value,
            cash_flow: outputs.annual_cash_flow,
            risk: risk_score(&inputs, &outputs),
        };

        let deviation = key_metrics.npv - base_npv;
        let deviation_pct = if base_npv.is_zero() {
            if !deviation.is_zero() {
                warnings.push(format!(
                    "Base case is zero; cannot compute deviation_pct for scenario '{}'",
                    scenario.name
                ));
            }
            Decimal::ZERO
        } else {
            deviation / base_npv.abs()
        };

        results.push(ScenarioResult {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            probability: scenario.probability,
            inputs,
            outputs,
            key_metrics,
            deviation_from_base: deviation,
            deviation_pct,
        });
    }

    let mut expected_npv = Decimal::ZERO;
    let mut expected_irr = Decimal::ZERO;
    let mut expected_cash_flow = Decimal::ZERO;
    let mut expected_risk = Decimal::ZERO;
    let mut best = &results[0];
    let mut worst = &results[0];
    let mut likely = &results[0];

    for r in &results {
        expected_npv += r.key_metrics.npv * r.probability;
        expected_irr += r.key_metrics.irr * r.probability;
        expected_cash_flow += r.key_metrics.cash_flow * r.probability;
        expected_risk += r.key_metrics.risk * r.probability;

        if r.key_metrics.npv > best.key_metrics.npv {
            best = r;
        }
        if r.key_metrics.npv < worst.key_metrics.npv {
            worst = r;
        }
        if r.probability > likely.probability {
            likely = r;
        }
    }

    let summary = ScenarioSummary {
        expected_npv,
        expected_irr,
        expected_cash_flow,
        expected_risk,
        best_case: case(best),
        worst_case: case(worst),
        most_likely: case(likely),
    };

    debug!(
        scenarios = results.len(),
        expected_npv = %summary.expected_npv,
        "scenario analysis complete"
    );

    let output = ScenarioAnalysis {
        base_npv,
        scenarios: results,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Probability-Weighted Scenario Analysis",
        &serde_json::json!({
            "num_scenarios": input.scenarios.len(),
            "base_case_npv": base_npv.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

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

    fn scenario(name: &str, probability: Decimal, rent: Option<Decimal>) -> Scenario {
        Scenario {
            name: name.into(),
            description: format!("{name} case"),
            overrides: InputOverrides {
                monthly_rent: rent,
                ..Default::default()
            },
            probability,
        }
    }

    fn bear_base_bull() -> ScenarioInput {
        ScenarioInput {
            inputs: base_inputs(),
            assumptions: base_assumptions(),
            scenarios: vec![
                scenario("Bear", dec!(0.25), Some(dec!(2600))),
                scenario("Base", dec!(0.50), None),
                scenario("Bull", dec!(0.25), Some(dec!(4200))),
            ],
        }
    }

    #[test]
    fn test_basic_scenario_analysis() {
        let result = perform_scenario_analysis(&bear_base_bull()).unwrap();
        let out = &result.result;

        assert_eq!(out.scenarios.len(), 3);
        assert_eq!(out.summary.best_case.name, "Bull");
        assert_eq!(out.summary.worst_case.name, "Bear");
        assert_eq!(out.summary.most_likely.name, "Base");

        let expected: Decimal = out
            .scenarios
            .iter()
            .map(|s| s.outputs.net_present_value * s.probability)
            .sum();
        assert_eq!(out.summary.expected_npv, expected);
    }

    #[test]
    fn test_single_certain_scenario_matches_outputs() {
        let input = ScenarioInput {
            inputs: base_inputs(),
            assumptions: base_assumptions(),
            scenarios: vec![scenario("Only", Decimal::ONE, Some(dec!(3800)))],
        };
        let out = perform_scenario_analysis(&input).unwrap().result;
        assert_eq!(
            out.summary.expected_npv,
            out.scenarios[0].outputs.net_present_value
        );
    }

    #[test]
    fn test_deviations() {
        let out = perform_scenario_analysis(&bear_base_bull()).unwrap().result;
        assert_eq!(out.scenarios[1].deviation_from_base, Decimal::ZERO);
        assert!(out.scenarios[0].deviation_from_base < Decimal::ZERO);
        assert!(out.scenarios[2].deviation_from_base > Decimal::ZERO);
    }

    #[test]
    fn test_shallow_merge() {
        let overrides = InputOverrides {
            monthly_rent: Some(dec!(4000)),
            metadata: Some(PropertyMetadata {
                units: Some(4),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut base = base_inputs();
        base.metadata = Some(PropertyMetadata {
            square_footage: Some(dec!(2000)),
            ..Default::default()
        });
        let merged = overrides.apply_to(&base);

        assert_eq!(merged.monthly_rent, dec!(4000));
        assert_eq!(merged.loan_amount, base.loan_amount);
        // metadata replaced wholesale, not deep-merged
        assert_eq!(merged.square_footage(), None);
        assert_eq!(merged.metadata.unwrap().units, Some(4));
    }

    #[test]
    fn test_unknown_override_field_rejected() {
        let parsed: Result<InputOverrides, _> =
            serde_json::from_value(serde_json::json!({"montly_rent": "4000"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_risk_score() {
        let out = perform_scenario_analysis(&bear_base_bull()).unwrap().result;
        let base = &out.scenarios[1];
        // LTV 0.8, negative cash flow, cap rate 4.44% < 5%
        assert_eq!(base.key_metrics.risk, (dec!(0.8) + dec!(1) + dec!(1)) / dec!(3));

        let bull = &out.scenarios[2];
        // 4200 rent: NOI 35880, cap rate 7.18%, positive cash flow
        assert_eq!(bull.key_metrics.risk, dec!(0.8) / dec!(3));
    }

    #[test]
    fn test_probabilities_must_sum_to_one() {
        let mut input = bear_base_bull();
        input.scenarios[0].probability = dec!(0.10);
        assert!(perform_scenario_analysis(&input).is_err());
    }

    #[test]
    fn test_near_one_sum_warns() {
        let mut input = bear_base_bull();
        input.scenarios[1].probability = dec!(0.5005);
        let result = perform_scenario_analysis(&input).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("approximately 1.0")));
    }

    #[test]
    fn test_negative_probability_error() {
        let input = ScenarioInput {
            inputs: base_inputs(),
            assumptions: base_assumptions(),
            scenarios: vec![
                scenario("Bad", dec!(-0.5), None),
                scenario("Good", dec!(1.5), None),
            ],
        };
        assert!(perform_scenario_analysis(&input).is_err());
    }

    #[test]
    fn test_empty_scenarios() {
        let input = ScenarioInput {
            inputs: base_inputs(),
            assumptions: base_assumptions(),
            scenarios: vec![],
        };
        assert!(matches!(
            perform_scenario_analysis(&input),
            Err(RealtyModelError::InsufficientData(_))
        ));
    }
}
