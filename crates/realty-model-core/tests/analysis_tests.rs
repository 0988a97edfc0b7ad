#![cfg(feature = "scenarios")]

use pretty_assertions::assert_eq;
use realty_model_core::model::{calculate_model_outputs, ModelAssumptions, ModelInputs};
use realty_model_core::monte_carlo::simulation::{perform_monte_carlo_simulation, MonteCarloInput};
use realty_model_core::scenarios::scenario::{
    perform_scenario_analysis, InputOverrides, Scenario, ScenarioInput,
};
use realty_model_core::scenarios::sensitivity::{perform_sensitivity_analysis, SensitivityInput};
use realty_model_core::variables::{ModelVariable, SensitivityVariable};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn inputs() -> ModelInputs {
    ModelInputs {
        property_value: dec!(650000),
        purchase_price: dec!(640000),
        down_payment: dec!(160000),
        loan_amount: dec!(480000),
        interest_rate: dec!(6),
        loan_term: 30,
        monthly_rent: dec!(5200),
        vacancy_rate: dec!(6),
        operating_expenses: dec!(18000),
        capital_expenditures: dec!(2500),
        appreciation_rate: dec!(3),
        tax_rate: Decimal::ZERO,
        depreciation_rate: Decimal::ZERO,
        metadata: None,
    }
}

fn assumptions() -> ModelAssumptions {
    ModelAssumptions {
        holding_period: 7,
        exit_cap_rate: dec!(6),
        rent_growth_rate: dec!(2.5),
        expense_growth_rate: dec!(2),
        market_growth_rate: dec!(3),
        risk_free_rate: dec!(4),
        market_risk_premium: dec!(4.5),
        beta: dec!(1.1),
    }
}

fn rent_and_vacancy() -> Vec<SensitivityVariable> {
    vec![
        SensitivityVariable {
            variable: ModelVariable::MonthlyRent,
            base_value: None,
            min_value: dec!(4500),
            max_value: dec!(6000),
            step: dec!(250),
        },
        SensitivityVariable {
            variable: ModelVariable::VacancyRate,
            base_value: None,
            min_value: dec!(2),
            max_value: dec!(12),
            step: dec!(2),
        },
    ]
}

// ===========================================================================
// Monte Carlo
// ===========================================================================

#[test]
fn test_seeded_monte_carlo_is_reproducible() {
    let input = MonteCarloInput {
        inputs: inputs(),
        assumptions: assumptions(),
        variables: rent_and_vacancy(),
        iterations: 500,
        seed: Some(2024),
    };
    let a = perform_monte_carlo_simulation(&input).unwrap().result;
    let b = perform_monte_carlo_simulation(&input).unwrap().result;

    assert_eq!(a.distribution, b.distribution);
    assert_eq!(a.mean_npv, b.mean_npv);
    assert_eq!(a.confidence_intervals.p95, b.confidence_intervals.p95);
}

#[test]
fn test_monte_carlo_statistics_are_ordered() {
    let input = MonteCarloInput {
        inputs: inputs(),
        assumptions: assumptions(),
        variables: rent_and_vacancy(),
        iterations: 1_000,
        seed: Some(11),
    };
    let result = perform_monte_carlo_simulation(&input).unwrap();
    let r = &result.result;
    let ci = &r.confidence_intervals;

    assert!(ci.p5 <= ci.p10);
    assert!(ci.p10 <= ci.p25);
    assert!(ci.p25 <= r.median_npv);
    assert!(r.median_npv <= ci.p75);
    assert!(ci.p75 <= ci.p90);
    assert!(ci.p90 <= ci.p95);
    assert_eq!(r.value_at_risk, ci.p5);
    assert!(r.expected_shortfall <= r.value_at_risk);
    assert!((0.0..=1.0).contains(&r.probability_of_positive_return));
    assert!(r.standard_deviation > 0.0);
    assert_eq!(result.metadata.precision, "ieee754_f64");
}

#[test]
fn test_monte_carlo_from_json_uses_default_iterations() {
    let json = serde_json::json!({
        "inputs": serde_json::to_value(inputs()).unwrap(),
        "assumptions": serde_json::to_value(assumptions()).unwrap(),
        "variables": [
            { "variable": "exit_cap_rate", "min_value": "5", "max_value": "7", "step": "0.5" }
        ]
    });
    let input: MonteCarloInput = serde_json::from_value(json).unwrap();
    assert_eq!(input.iterations, 10_000);
    assert_eq!(input.seed, None);
}

#[test]
fn test_unknown_variable_name_rejected() {
    let json = serde_json::json!({
        "inputs": serde_json::to_value(inputs()).unwrap(),
        "assumptions": serde_json::to_value(assumptions()).unwrap(),
        "variables": [
            { "variable": "rent", "min_value": "1", "max_value": "2", "step": "1" }
        ]
    });
    assert!(serde_json::from_value::<MonteCarloInput>(json).is_err());
}

// ===========================================================================
// Sensitivity
// ===========================================================================

#[test]
fn test_sensitivity_rent_moves_npv_up_vacancy_down() {
    let input = SensitivityInput {
        inputs: inputs(),
        assumptions: assumptions(),
        variables: rent_and_vacancy(),
        monte_carlo_iterations: 100,
        seed: Some(3),
    };
    let out = perform_sensitivity_analysis(&input).unwrap().result;

    let base = calculate_model_outputs(&inputs(), &assumptions()).unwrap();
    assert_eq!(out.base_npv, base.net_present_value);

    for curve in &out.spider_chart {
        let first = curve.npv_impact[0];
        let last = *curve.npv_impact.last().unwrap();
        match curve.variable {
            ModelVariable::MonthlyRent => assert!(last > first),
            ModelVariable::VacancyRate => assert!(last < first),
            other => panic!("unexpected variable {other}"),
        }
    }
    for pair in out.tornado_chart.windows(2) {
        assert!(pair[0].range >= pair[1].range);
    }
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn test_certain_scenario_expectation_is_exact() {
    let input = ScenarioInput {
        inputs: inputs(),
        assumptions: assumptions(),
        scenarios: vec![Scenario {
            name: "Renovated".into(),
            description: "Post-renovation rents".into(),
            overrides: InputOverrides {
                monthly_rent: Some(dec!(5900)),
                capital_expenditures: Some(dec!(6000)),
                ..Default::default()
            },
            probability: Decimal::ONE,
        }],
    };
    let out = perform_scenario_analysis(&input).unwrap().result;
    let only = &out.scenarios[0];

    assert_eq!(out.summary.expected_npv, only.outputs.net_present_value);
    assert_eq!(out.summary.expected_cash_flow, only.outputs.annual_cash_flow);
    assert_eq!(out.summary.best_case.name, "Renovated");
    assert_eq!(out.summary.worst_case.name, "Renovated");
    assert_eq!(only.inputs.monthly_rent, dec!(5900));
    assert_eq!(only.inputs.loan_amount, dec!(480000));
}

#[test]
fn test_scenario_expectations_are_weighted() {
    let make = |name: &str, rent: Decimal, p: Decimal| Scenario {
        name: name.into(),
        description: String::new(),
        overrides: InputOverrides {
            monthly_rent: Some(rent),
            ..Default::default()
        },
        probability: p,
    };
    let input = ScenarioInput {
        inputs: inputs(),
        assumptions: assumptions(),
        scenarios: vec![
            make("Downside", dec!(4600), dec!(0.3)),
            make("Expected", dec!(5200), dec!(0.5)),
            make("Upside", dec!(5800), dec!(0.2)),
        ],
    };
    let out = perform_scenario_analysis(&input).unwrap().result;

    let weighted: Decimal = out
        .scenarios
        .iter()
        .map(|s| s.key_metrics.risk * s.probability)
        .sum();
    assert_eq!(out.summary.expected_risk, weighted);
    assert_eq!(out.summary.most_likely.name, "Expected");
    assert_eq!(out.summary.best_case.name, "Upside");
    assert_eq!(out.summary.worst_case.name, "Downside");
    assert!(out.summary.expected_npv > out.summary.worst_case.npv);
    assert!(out.summary.expected_npv < out.summary.best_case.npv);
}
